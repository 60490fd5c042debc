//! SIEM event normalizer for Splunk-style aggregated JSON events.

use serde::Deserialize;

use crate::models::event::{EventSource, NewSecurityEvent, RawRecord, RawSeverity};
use crate::normalizers::{parse_ip, parse_timestamp, NormalizationError, Normalizer};

#[derive(Default)]
pub struct SiemNormalizer;

impl SiemNormalizer {
    pub fn new() -> Self {
        Self
    }
}

/// Deserialized Splunk-style notable event.
#[derive(Debug, Deserialize)]
struct SiemEvent {
    #[serde(alias = "_time")]
    timestamp: String,
    #[serde(alias = "src")]
    src_ip: String,
    #[serde(alias = "dest")]
    dest_ip: String,
    event_type: String,
    /// Splunk ES urgency vocabulary.
    #[serde(alias = "urgency")]
    severity: Option<String>,
    protocol: Option<String>,
    rule_id: Option<String>,
}

impl Normalizer for SiemNormalizer {
    fn normalize(&self, record: &RawRecord) -> Result<NewSecurityEvent, NormalizationError> {
        let event: SiemEvent = serde_json::from_str(&record.payload)
            .map_err(|e| NormalizationError::new(format!("malformed SIEM event: {e}")))?;

        let occurred_at = parse_timestamp(&event.timestamp)?;
        let src_ip = parse_ip("src_ip", &event.src_ip)?;
        let dest_ip = parse_ip("dest_ip", &event.dest_ip)?;

        if event.event_type.trim().is_empty() {
            return Err(NormalizationError::new("SIEM event is missing event_type"));
        }

        let raw_severity = event
            .severity
            .as_deref()
            .map(|s| self.map_severity(s))
            .unwrap_or(RawSeverity::Medium);

        Ok(NewSecurityEvent {
            source: EventSource::Siem,
            src_ip,
            dest_ip,
            event_type: event.event_type.trim().to_lowercase(),
            raw_severity,
            protocol: event.protocol.map(|p| p.to_lowercase()),
            rule_id: event.rule_id,
            occurred_at,
        })
    }

    fn source(&self) -> EventSource {
        EventSource::Siem
    }

    fn map_severity(&self, vendor_severity: &str) -> RawSeverity {
        match vendor_severity.trim().to_lowercase().as_str() {
            "critical" => RawSeverity::Critical,
            "high" => RawSeverity::High,
            "medium" => RawSeverity::Medium,
            "low" => RawSeverity::Low,
            "informational" | "info" => RawSeverity::Info,
            _ => RawSeverity::Medium,
        }
    }
}
