//! Response action model: the per-IP blocking lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle state of an automated response action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "response_state")]
pub enum ResponseState {
    Pending,
    Blocked,
    #[sqlx(rename = "Rollback_Requested")]
    #[serde(rename = "Rollback_Requested")]
    RollbackRequested,
    #[sqlx(rename = "Rolled_Back")]
    #[serde(rename = "Rolled_Back")]
    RolledBack,
    Failed,
}

impl ResponseState {
    /// Terminal states require no further enforcement activity.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::RolledBack | Self::Failed)
    }

    /// Active states suppress further blocks for the same source IP.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

/// Persisted response action, one per enforced High-tier score.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResponseAction {
    pub id: Uuid,
    pub event_id: Uuid,
    pub src_ip: String,
    pub state: ResponseState,
    pub failure_reason: Option<String>,
    pub marked_benign: bool,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(ResponseState::RolledBack.is_terminal());
        assert!(ResponseState::Failed.is_terminal());
        assert!(!ResponseState::Pending.is_terminal());
        assert!(!ResponseState::Blocked.is_terminal());
        assert!(!ResponseState::RollbackRequested.is_terminal());
    }

    #[test]
    fn active_states_suppress_duplicates() {
        assert!(ResponseState::Pending.is_active());
        assert!(ResponseState::Blocked.is_active());
        assert!(ResponseState::RollbackRequested.is_active());
        assert!(!ResponseState::RolledBack.is_active());
    }

    #[test]
    fn state_serialization() {
        let json = serde_json::to_string(&ResponseState::RollbackRequested).unwrap();
        assert_eq!(json, "\"Rollback_Requested\"");
        let state: ResponseState = serde_json::from_str("\"Rolled_Back\"").unwrap();
        assert_eq!(state, ResponseState::RolledBack);
    }
}
