//! Per-source normalizers converting raw telemetry into canonical events.
//!
//! Each normalizer implements the `Normalizer` trait, validating IP and
//! timestamp fields and mapping the vendor's severity vocabulary onto the
//! bounded `RawSeverity` enum. Malformed records fail with a
//! `NormalizationError` and are quarantined by the pipeline, never dropped
//! silently.

pub mod firewall;
pub mod ids;
pub mod siem;

use std::net::IpAddr;

use chrono::{DateTime, TimeZone, Utc};

use crate::models::event::{EventSource, NewSecurityEvent, RawRecord, RawSeverity};

/// Failure to normalize a single raw record.
#[derive(Debug, thiserror::Error)]
#[error("{reason}")]
pub struct NormalizationError {
    pub reason: String,
}

impl NormalizationError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Trait for pluggable per-source normalizers.
pub trait Normalizer: Send + Sync {
    /// Convert a raw record into a canonical event.
    fn normalize(&self, record: &RawRecord) -> Result<NewSecurityEvent, NormalizationError>;

    /// The telemetry source this normalizer handles.
    fn source(&self) -> EventSource;

    /// Map a vendor-specific severity string to the bounded vocabulary.
    fn map_severity(&self, vendor_severity: &str) -> RawSeverity;
}

/// Select the normalizer for a source.
pub fn for_source(source: EventSource) -> Box<dyn Normalizer> {
    match source {
        EventSource::Firewall => Box::new(firewall::FirewallNormalizer::new()),
        EventSource::Ids => Box::new(ids::IdsNormalizer::new()),
        EventSource::Siem => Box::new(siem::SiemNormalizer::new()),
    }
}

/// Parse an IP field, naming the field in the error.
pub(crate) fn parse_ip(field: &str, value: &str) -> Result<IpAddr, NormalizationError> {
    value.trim().parse::<IpAddr>().map_err(|_| {
        NormalizationError::new(format!("{field} is not a valid IP address: {value:?}"))
    })
}

/// Parse a timestamp field: RFC 3339 first, then epoch seconds.
pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, NormalizationError> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(epoch) = trimmed.parse::<i64>() {
        if let Some(dt) = Utc.timestamp_opt(epoch, 0).single() {
            return Ok(dt);
        }
    }
    Err(NormalizationError::new(format!(
        "timestamp is not RFC 3339 or epoch seconds: {value:?}"
    )))
}
