//! Threat score computation using a 4-factor weighted model.
//!
//! Factors and fixed weights:
//! - Severity Weight (Sw): 40% — lookup table keyed by normalized event type
//! - Frequency Weight (Fw): 20% — decayed prior-event count per source IP
//! - Reputation Weight (Rw): 10% — threat intelligence for the source IP
//! - AI Confidence (Aic): 30% — phishing likelihood from the AI adapter
//!
//! The combination is a pure function of the four components; severity tier
//! follows fixed thresholds (Low 0–40, Medium 41–70, High 71–100).

use std::time::Duration;

use serde::Serialize;
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::event::{RawSeverity, SecurityEvent};
use crate::models::score::{SeverityTier, ThreatScore};
use crate::services::ai::AiAssessor;
use crate::services::reputation;

/// `ai_context` value recorded when the AI adapter failed or timed out.
pub const AI_UNAVAILABLE: &str = "unavailable";

const W_SEVERITY: f64 = 0.4;
const W_FREQUENCY: f64 = 0.2;
const W_REPUTATION: f64 = 0.1;
const W_AI: f64 = 0.3;

/// The four component values, each already normalized to 0–100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreComponents {
    pub severity_weight: u8,
    pub frequency_weight: u8,
    pub reputation_weight: u8,
    pub ai_confidence: u8,
}

/// Combine the four components into the final score and tier.
///
/// Deterministic and side-effect-free: identical components always yield an
/// identical result.
pub fn combine(components: &ScoreComponents) -> (u8, SeverityTier) {
    let raw = f64::from(components.severity_weight) * W_SEVERITY
        + f64::from(components.frequency_weight) * W_FREQUENCY
        + f64::from(components.reputation_weight) * W_REPUTATION
        + f64::from(components.ai_confidence) * W_AI;

    let score = raw.round().clamp(0.0, 100.0) as u8;
    (score, SeverityTier::from_score(score))
}

/// Map a normalized event type to its severity weight.
///
/// Fixed, source-independent table; unknown types fall back to a bucket
/// derived from the source's own severity rating.
pub fn severity_weight(event_type: &str, raw_severity: RawSeverity) -> u8 {
    match event_type {
        "phishing-signature" | "phishing" => 90,
        "malware" | "trojan-activity" | "ransomware" => 85,
        "sql-injection" | "web-application-attack" => 80,
        "dos" | "denial-of-service" | "ddos" => 70,
        "brute-force" | "credential-stuffing" => 60,
        "lateral-movement" => 75,
        "port-scan" | "recon" | "attempted-recon" => 30,
        _ => match raw_severity {
            RawSeverity::Critical => 95,
            RawSeverity::High => 80,
            RawSeverity::Medium => 50,
            RawSeverity::Low => 20,
            RawSeverity::Info => 5,
        },
    }
}

/// Resolve the AI confidence component, degrading on timeout or error.
///
/// A failed AI call never propagates: the component is 0 and the context
/// records "unavailable" explicitly.
pub async fn resolve_ai_component<A: AiAssessor>(
    ai: &A,
    text: &str,
    timeout: Duration,
) -> (u8, String) {
    match tokio::time::timeout(timeout, ai.assess(text)).await {
        Ok(Ok(assessment)) => {
            let confidence = (assessment.confidence.clamp(0.0, 1.0) * 100.0).round() as u8;
            let context = if assessment.action_hint.is_empty() {
                assessment.summary
            } else {
                format!("{} (suggested: {})", assessment.summary, assessment.action_hint)
            };
            (confidence, context)
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "AI assessment failed, degrading to neutral");
            (0, AI_UNAVAILABLE.to_string())
        }
        Err(_) => {
            tracing::warn!(timeout_secs = timeout.as_secs(), "AI assessment timed out");
            (0, AI_UNAVAILABLE.to_string())
        }
    }
}

/// Short event description handed to the AI adapter.
fn assessment_text(event: &SecurityEvent) -> String {
    format!(
        "{} event '{}' from {} to {} (severity {:?})",
        event.source, event.event_type, event.src_ip, event.dest_ip, event.raw_severity
    )
}

/// Score a persisted event: gather the remaining components, combine, and
/// append the score to the audit trail.
///
/// The frequency weight is passed in by the caller, which records the event
/// against the sliding window at intake so same-IP weights follow arrival
/// order regardless of how scoring is scheduled.
pub async fn score_event<A: AiAssessor>(
    pool: &PgPool,
    event: &SecurityEvent,
    frequency_weight: u8,
    ai: &A,
    ai_timeout: Duration,
) -> Result<ThreatScore, AppError> {
    let sw = severity_weight(&event.event_type, event.raw_severity);

    // A lookup miss is neutral: absent intelligence must not move the score.
    let rw = match reputation::lookup(pool, &event.src_ip).await {
        Ok(Some(reputation)) => reputation.clamp(0, 100) as u8,
        Ok(None) => 0,
        Err(e) => {
            tracing::warn!(error = %e, src_ip = %event.src_ip, "reputation lookup failed, degrading to neutral");
            0
        }
    };

    let (aic, ai_context) = resolve_ai_component(ai, &assessment_text(event), ai_timeout).await;

    let components = ScoreComponents {
        severity_weight: sw,
        frequency_weight,
        reputation_weight: rw,
        ai_confidence: aic,
    };
    let (score, severity) = combine(&components);

    let stored = sqlx::query_as::<_, ThreatScore>(
        r#"
        INSERT INTO threat_scores (
            event_id, score, severity,
            severity_weight, frequency_weight, reputation_weight, ai_confidence,
            ai_context
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(event.id)
    .bind(i32::from(score))
    .bind(severity)
    .bind(i32::from(components.severity_weight))
    .bind(i32::from(components.frequency_weight))
    .bind(i32::from(components.reputation_weight))
    .bind(i32::from(components.ai_confidence))
    .bind(&ai_context)
    .fetch_one(pool)
    .await?;

    tracing::info!(
        event_id = %event.id,
        src_ip = %event.src_ip,
        score = score,
        severity = %severity,
        "scored event"
    );

    Ok(stored)
}
