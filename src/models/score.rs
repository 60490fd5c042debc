//! Threat score model: the append-only audit trail of scoring decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Severity tier derived from the numeric threat score via fixed thresholds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "severity_tier")]
pub enum SeverityTier {
    Low,
    Medium,
    High,
}

impl SeverityTier {
    /// Classify a score into its tier: Low 0–40, Medium 41–70, High 71–100.
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=40 => Self::Low,
            41..=70 => Self::Medium,
            _ => Self::High,
        }
    }
}

impl std::fmt::Display for SeverityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
        }
    }
}

/// Persisted threat score. Created exactly once per scored event, never
/// mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ThreatScore {
    pub id: Uuid,
    pub event_id: Uuid,
    pub score: i32,
    pub severity: SeverityTier,
    pub severity_weight: i32,
    pub frequency_weight: i32,
    pub reputation_weight: i32,
    pub ai_confidence: i32,
    pub ai_context: String,
    pub created_at: DateTime<Utc>,
}

/// Scored event joined with its originating event, for the read surface.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ScoredEvent {
    pub id: Uuid,
    pub event_id: Uuid,
    pub source: super::event::EventSource,
    pub src_ip: String,
    pub dest_ip: String,
    pub event_type: String,
    pub score: i32,
    pub severity: SeverityTier,
    pub ai_context: String,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_thresholds() {
        assert_eq!(SeverityTier::from_score(0), SeverityTier::Low);
        assert_eq!(SeverityTier::from_score(40), SeverityTier::Low);
        assert_eq!(SeverityTier::from_score(41), SeverityTier::Medium);
        assert_eq!(SeverityTier::from_score(70), SeverityTier::Medium);
        assert_eq!(SeverityTier::from_score(71), SeverityTier::High);
        assert_eq!(SeverityTier::from_score(100), SeverityTier::High);
    }

    #[test]
    fn tier_serialization() {
        let json = serde_json::to_string(&SeverityTier::High).unwrap();
        assert_eq!(json, "\"High\"");
        let tier: SeverityTier = serde_json::from_str("\"Medium\"").unwrap();
        assert_eq!(tier, SeverityTier::Medium);
    }

    #[test]
    fn tier_display() {
        assert_eq!(SeverityTier::Low.to_string(), "Low");
        assert_eq!(SeverityTier::High.to_string(), "High");
    }
}
