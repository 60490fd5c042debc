//! Threat intelligence reference data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "indicator_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum IndicatorType {
    Ip,
    Domain,
    Url,
}

/// Reputation record for a single indicator. Upserted on each feed refresh;
/// lifetime independent of events.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReputationRecord {
    pub indicator: String,
    pub indicator_type: IndicatorType,
    pub reputation: i32,
    pub last_seen: DateTime<Utc>,
}

/// Feed entry for an intel refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct ReputationEntry {
    pub indicator: String,
    pub indicator_type: IndicatorType,
    pub reputation: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_type_serialization() {
        let json = serde_json::to_string(&IndicatorType::Domain).unwrap();
        assert_eq!(json, "\"domain\"");
        let t: IndicatorType = serde_json::from_str("\"url\"").unwrap();
        assert_eq!(t, IndicatorType::Url);
    }

    #[test]
    fn feed_entry_deserialization() {
        let entry: ReputationEntry = serde_json::from_str(
            r#"{"indicator": "203.0.113.7", "indicator_type": "ip", "reputation": 80}"#,
        )
        .unwrap();
        assert_eq!(entry.indicator, "203.0.113.7");
        assert_eq!(entry.indicator_type, IndicatorType::Ip);
        assert_eq!(entry.reputation, 80);
    }
}
