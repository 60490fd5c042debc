//! IDS alert normalizer for Snort-style JSON alerts.

use serde::Deserialize;

use crate::models::event::{EventSource, NewSecurityEvent, RawRecord, RawSeverity};
use crate::normalizers::{parse_ip, parse_timestamp, NormalizationError, Normalizer};

#[derive(Default)]
pub struct IdsNormalizer;

impl IdsNormalizer {
    pub fn new() -> Self {
        Self
    }
}

/// Deserialized Snort-style alert.
#[derive(Debug, Deserialize)]
struct IdsAlert {
    timestamp: String,
    src_ip: String,
    dest_ip: String,
    /// Signature class, e.g. "phishing-signature", "brute-force".
    signature: String,
    severity: Option<String>,
    /// Snort priority: 1 is most severe.
    priority: Option<u8>,
    proto: Option<String>,
    sid: Option<String>,
}

impl Normalizer for IdsNormalizer {
    fn normalize(&self, record: &RawRecord) -> Result<NewSecurityEvent, NormalizationError> {
        let alert: IdsAlert = serde_json::from_str(&record.payload)
            .map_err(|e| NormalizationError::new(format!("malformed IDS alert: {e}")))?;

        let occurred_at = parse_timestamp(&alert.timestamp)?;
        let src_ip = parse_ip("src_ip", &alert.src_ip)?;
        let dest_ip = parse_ip("dest_ip", &alert.dest_ip)?;

        if alert.signature.trim().is_empty() {
            return Err(NormalizationError::new("IDS alert is missing a signature"));
        }

        let raw_severity = match &alert.severity {
            Some(s) => self.map_severity(s),
            None => priority_severity(alert.priority),
        };

        Ok(NewSecurityEvent {
            source: EventSource::Ids,
            src_ip,
            dest_ip,
            event_type: alert.signature.trim().to_lowercase(),
            raw_severity,
            protocol: alert.proto.map(|p| p.to_lowercase()),
            rule_id: alert.sid,
            occurred_at,
        })
    }

    fn source(&self) -> EventSource {
        EventSource::Ids
    }

    fn map_severity(&self, vendor_severity: &str) -> RawSeverity {
        match vendor_severity.trim().to_lowercase().as_str() {
            "critical" => RawSeverity::Critical,
            "high" => RawSeverity::High,
            "medium" => RawSeverity::Medium,
            "low" => RawSeverity::Low,
            "info" | "informational" => RawSeverity::Info,
            _ => RawSeverity::Medium,
        }
    }
}

/// Map Snort priority (1 = most severe) to the bounded vocabulary.
fn priority_severity(priority: Option<u8>) -> RawSeverity {
    match priority {
        Some(1) => RawSeverity::Critical,
        Some(2) => RawSeverity::High,
        Some(3) => RawSeverity::Medium,
        Some(_) => RawSeverity::Low,
        None => RawSeverity::Medium,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(payload: &str) -> RawRecord {
        RawRecord {
            source: EventSource::Ids,
            payload: payload.to_string(),
        }
    }

    #[test]
    fn normalizes_alert() {
        let n = IdsNormalizer::new();
        let event = n
            .normalize(&raw(
                r#"{"timestamp": "2025-10-28T10:00:00Z", "src_ip": "10.0.0.5",
                    "dest_ip": "192.168.1.20", "signature": "Phishing-Signature",
                    "severity": "high", "proto": "TCP", "sid": "2100498"}"#,
            ))
            .unwrap();
        assert_eq!(event.source, EventSource::Ids);
        assert_eq!(event.event_type, "phishing-signature");
        assert_eq!(event.raw_severity, RawSeverity::High);
        assert_eq!(event.protocol.as_deref(), Some("tcp"));
        assert_eq!(event.rule_id.as_deref(), Some("2100498"));
    }

    #[test]
    fn priority_used_when_severity_missing() {
        let n = IdsNormalizer::new();
        let event = n
            .normalize(&raw(
                r#"{"timestamp": "2025-10-28T10:00:00Z", "src_ip": "10.0.0.5",
                    "dest_ip": "192.168.1.20", "signature": "brute-force", "priority": 1}"#,
            ))
            .unwrap();
        assert_eq!(event.raw_severity, RawSeverity::Critical);
    }

    #[test]
    fn missing_signature_is_rejected() {
        let n = IdsNormalizer::new();
        let err = n
            .normalize(&raw(
                r#"{"timestamp": "2025-10-28T10:00:00Z", "src_ip": "10.0.0.5",
                    "dest_ip": "192.168.1.20", "signature": "  "}"#,
            ))
            .unwrap_err();
        assert!(err.reason.contains("signature"));
    }

    #[test]
    fn non_json_is_rejected() {
        let n = IdsNormalizer::new();
        assert!(n.normalize(&raw("not json at all")).is_err());
    }

    #[test]
    fn ipv6_addresses_accepted() {
        let n = IdsNormalizer::new();
        let event = n
            .normalize(&raw(
                r#"{"timestamp": "1761645600", "src_ip": "2001:db8::7",
                    "dest_ip": "2001:db8::20", "signature": "recon", "severity": "low"}"#,
            ))
            .unwrap();
        assert_eq!(event.src_ip.to_string(), "2001:db8::7");
        assert_eq!(event.raw_severity, RawSeverity::Low);
    }
}
