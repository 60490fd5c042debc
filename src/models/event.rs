//! Canonical security event model shared by all telemetry sources.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// -- Enums matching PostgreSQL --

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "event_source", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    Firewall,
    Ids,
    Siem,
}

impl std::fmt::Display for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Firewall => write!(f, "firewall"),
            Self::Ids => write!(f, "ids"),
            Self::Siem => write!(f, "siem"),
        }
    }
}

impl std::str::FromStr for EventSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "firewall" => Ok(Self::Firewall),
            "ids" => Ok(Self::Ids),
            "siem" => Ok(Self::Siem),
            other => Err(format!("unknown event source: {other}")),
        }
    }
}

/// Bounded severity vocabulary all source-specific severities map onto.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, PartialOrd, Ord)]
#[sqlx(type_name = "raw_severity")]
pub enum RawSeverity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

// -- Core event --

/// Normalized security event. Immutable once created; append-only table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SecurityEvent {
    pub id: Uuid,
    pub source: EventSource,
    pub src_ip: String,
    pub dest_ip: String,
    pub event_type: String,
    pub raw_severity: RawSeverity,
    pub protocol: Option<String>,
    pub rule_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Output of a normalizer, ready for insertion.
///
/// IPs are held as parsed addresses so an invalid address can never reach
/// the store.
#[derive(Debug, Clone)]
pub struct NewSecurityEvent {
    pub source: EventSource,
    pub src_ip: IpAddr,
    pub dest_ip: IpAddr,
    pub event_type: String,
    pub raw_severity: RawSeverity,
    pub protocol: Option<String>,
    pub rule_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// A raw record pulled or pushed from a source adapter, not yet normalized.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub source: EventSource,
    pub payload: String,
}

/// Malformed raw record preserved for forensic review.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct QuarantinedRecord {
    pub id: Uuid,
    pub source: EventSource,
    pub payload: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_source_serialization() {
        let json = serde_json::to_string(&EventSource::Firewall).unwrap();
        assert_eq!(json, "\"firewall\"");
        let source: EventSource = serde_json::from_str("\"siem\"").unwrap();
        assert_eq!(source, EventSource::Siem);
    }

    #[test]
    fn event_source_from_str() {
        assert_eq!("ids".parse::<EventSource>().unwrap(), EventSource::Ids);
        assert!("syslog".parse::<EventSource>().is_err());
    }

    #[test]
    fn raw_severity_ordering() {
        assert!(RawSeverity::Critical > RawSeverity::High);
        assert!(RawSeverity::High > RawSeverity::Medium);
        assert!(RawSeverity::Medium > RawSeverity::Low);
        assert!(RawSeverity::Low > RawSeverity::Info);
    }

    #[test]
    fn new_event_requires_parsed_ips() {
        let event = NewSecurityEvent {
            source: EventSource::Ids,
            src_ip: "10.0.0.5".parse().unwrap(),
            dest_ip: "192.168.1.1".parse().unwrap(),
            event_type: "phishing-signature".to_string(),
            raw_severity: RawSeverity::High,
            protocol: Some("tcp".to_string()),
            rule_id: Some("sid:2100498".to_string()),
            occurred_at: Utc::now(),
        };
        assert_eq!(event.src_ip.to_string(), "10.0.0.5");
    }
}
