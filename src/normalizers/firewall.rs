//! Firewall log normalizer for pfSense-style CSV filter log exports.
//!
//! Expected column order (no header row):
//! `timestamp,action,protocol,src_ip,dest_ip,event_type,rule_id,severity`.

use serde::Deserialize;

use crate::models::event::{EventSource, NewSecurityEvent, RawRecord, RawSeverity};
use crate::normalizers::{parse_ip, parse_timestamp, NormalizationError, Normalizer};

#[derive(Default)]
pub struct FirewallNormalizer;

impl FirewallNormalizer {
    pub fn new() -> Self {
        Self
    }
}

/// Positionally deserialized firewall log row.
#[derive(Debug, Deserialize)]
struct FirewallRow {
    timestamp: String,
    action: String,
    protocol: String,
    src_ip: String,
    dest_ip: String,
    event_type: String,
    rule_id: String,
    severity: String,
}

impl Normalizer for FirewallNormalizer {
    fn normalize(&self, record: &RawRecord) -> Result<NewSecurityEvent, NormalizationError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(false)
            .from_reader(record.payload.as_bytes());

        let row: FirewallRow = reader
            .deserialize()
            .next()
            .ok_or_else(|| NormalizationError::new("empty firewall record"))?
            .map_err(|e| NormalizationError::new(format!("malformed firewall record: {e}")))?;

        let occurred_at = parse_timestamp(&row.timestamp)?;
        let src_ip = parse_ip("src_ip", &row.src_ip)?;
        let dest_ip = parse_ip("dest_ip", &row.dest_ip)?;

        let event_type = if row.event_type.trim().is_empty() {
            // Fall back to the filter action when no classification is present.
            format!("firewall-{}", row.action.trim().to_lowercase())
        } else {
            row.event_type.trim().to_lowercase()
        };

        Ok(NewSecurityEvent {
            source: EventSource::Firewall,
            src_ip,
            dest_ip,
            event_type,
            raw_severity: self.map_severity(&row.severity),
            protocol: Some(row.protocol.trim().to_lowercase()),
            rule_id: Some(row.rule_id.trim().to_string()).filter(|r| !r.is_empty()),
            occurred_at,
        })
    }

    fn source(&self) -> EventSource {
        EventSource::Firewall
    }

    fn map_severity(&self, vendor_severity: &str) -> RawSeverity {
        // Syslog severity keywords as emitted by the filter log.
        match vendor_severity.trim().to_lowercase().as_str() {
            "emerg" | "alert" | "crit" | "critical" => RawSeverity::Critical,
            "err" | "error" | "high" => RawSeverity::High,
            "warning" | "warn" | "medium" => RawSeverity::Medium,
            "notice" | "low" => RawSeverity::Low,
            "info" | "debug" => RawSeverity::Info,
            _ => RawSeverity::Low,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(payload: &str) -> RawRecord {
        RawRecord {
            source: EventSource::Firewall,
            payload: payload.to_string(),
        }
    }

    #[test]
    fn normalizes_block_record() {
        let n = FirewallNormalizer::new();
        let event = n
            .normalize(&raw(
                "2025-10-28T10:00:00Z,block,tcp,203.0.113.7,10.0.0.5,port-scan,1001,warning",
            ))
            .unwrap();
        assert_eq!(event.source, EventSource::Firewall);
        assert_eq!(event.src_ip.to_string(), "203.0.113.7");
        assert_eq!(event.event_type, "port-scan");
        assert_eq!(event.raw_severity, RawSeverity::Medium);
        assert_eq!(event.rule_id.as_deref(), Some("1001"));
        assert_eq!(event.protocol.as_deref(), Some("tcp"));
    }

    #[test]
    fn empty_event_type_falls_back_to_action() {
        let n = FirewallNormalizer::new();
        let event = n
            .normalize(&raw(
                "2025-10-28T10:00:00Z,block,udp,203.0.113.7,10.0.0.5,,1001,notice",
            ))
            .unwrap();
        assert_eq!(event.event_type, "firewall-block");
        assert_eq!(event.raw_severity, RawSeverity::Low);
    }

    #[test]
    fn invalid_src_ip_is_rejected() {
        let n = FirewallNormalizer::new();
        let err = n
            .normalize(&raw(
                "2025-10-28T10:00:00Z,block,tcp,999.1.2.3,10.0.0.5,port-scan,1001,warning",
            ))
            .unwrap_err();
        assert!(err.reason.contains("src_ip"));
    }

    #[test]
    fn invalid_timestamp_is_rejected() {
        let n = FirewallNormalizer::new();
        let err = n
            .normalize(&raw(
                "last tuesday,block,tcp,203.0.113.7,10.0.0.5,port-scan,1001,warning",
            ))
            .unwrap_err();
        assert!(err.reason.contains("timestamp"));
    }

    #[test]
    fn short_row_is_rejected() {
        let n = FirewallNormalizer::new();
        assert!(n.normalize(&raw("2025-10-28T10:00:00Z,block,tcp")).is_err());
    }

    #[test]
    fn severity_vocabulary() {
        let n = FirewallNormalizer::new();
        assert_eq!(n.map_severity("crit"), RawSeverity::Critical);
        assert_eq!(n.map_severity("err"), RawSeverity::High);
        assert_eq!(n.map_severity("WARNING"), RawSeverity::Medium);
        assert_eq!(n.map_severity("info"), RawSeverity::Info);
        assert_eq!(n.map_severity("unknown-word"), RawSeverity::Low);
    }
}
