//! Auto-response controller: the per-IP blocking state machine.
//!
//! One response action per enforced High-tier score. Transitions follow the
//! allowed graph; per-IP serialization prevents duplicate blocks while
//! unrelated IPs proceed concurrently. External enforcement calls happen
//! outside the per-IP critical section.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use sqlx::PgPool;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::pagination::{PagedResult, Pagination};
use crate::models::response::{ResponseAction, ResponseState};
use crate::services::enforcement::{with_retry, EnforcementAdapter, RetryPolicy};

/// Check whether a state transition is valid per the state machine graph.
pub fn is_valid_transition(from: ResponseState, to: ResponseState) -> bool {
    matches!(
        (from, to),
        (ResponseState::Pending, ResponseState::Blocked)
            | (ResponseState::Pending, ResponseState::Failed)
            | (ResponseState::Blocked, ResponseState::RollbackRequested)
            | (ResponseState::RollbackRequested, ResponseState::RolledBack)
            | (ResponseState::RollbackRequested, ResponseState::Failed)
    )
}

/// Keyed mutex map serializing response activity per source IP.
#[derive(Clone, Default)]
pub struct IpLocks {
    inner: Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl IpLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for one IP. Unrelated IPs are unaffected.
    pub async fn acquire(&self, src_ip: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(src_ip.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// Outcome of a block attempt for a High-tier score.
#[derive(Debug, PartialEq, Eq)]
pub enum BlockOutcome {
    /// A new action was created and the enforcement point acknowledged it.
    Blocked(Uuid),
    /// An active action already covers this IP; scored but not re-enforced.
    Suppressed,
    /// The enforcement call failed after bounded retry; manual follow-up.
    Failed(Uuid),
}

#[derive(Clone)]
pub struct ResponseController<E: EnforcementAdapter> {
    pool: PgPool,
    adapter: E,
    locks: IpLocks,
    retry: RetryPolicy,
}

impl<E: EnforcementAdapter> ResponseController<E> {
    pub fn new(pool: PgPool, adapter: E, locks: IpLocks, retry: RetryPolicy) -> Self {
        Self {
            pool,
            adapter,
            locks,
            retry,
        }
    }

    /// Issue a block for `src_ip` unless an active action already covers it.
    ///
    /// The active-action check and the `Pending` insert happen under the
    /// per-IP lock; the enforcement call itself does not hold the lock.
    pub async fn maybe_block(&self, event_id: Uuid, src_ip: &str) -> Result<BlockOutcome, AppError> {
        let action_id = {
            let _guard = self.locks.acquire(src_ip).await;

            if active_action(&self.pool, src_ip).await?.is_some() {
                tracing::info!(src_ip, "active response action exists, suppressing duplicate block");
                return Ok(BlockOutcome::Suppressed);
            }

            match insert_pending(&self.pool, event_id, src_ip).await {
                Ok(id) => id,
                // The partial unique index is the backstop against a racing
                // insert from another process.
                Err(AppError::Database(e)) if is_active_ip_conflict(&e) => {
                    tracing::info!(src_ip, "concurrent block already in flight, suppressing");
                    return Ok(BlockOutcome::Suppressed);
                }
                Err(e) => return Err(e),
            }
        };

        match with_retry(&self.retry, "block", || self.adapter.block(src_ip)).await {
            Ok(()) => {
                self.transition(action_id, ResponseState::Pending, ResponseState::Blocked, None)
                    .await?;
                tracing::info!(src_ip, action_id = %action_id, "blocked source IP");
                Ok(BlockOutcome::Blocked(action_id))
            }
            Err(e) => {
                self.transition(
                    action_id,
                    ResponseState::Pending,
                    ResponseState::Failed,
                    Some(&e.to_string()),
                )
                .await?;
                tracing::error!(src_ip, action_id = %action_id, error = %e, "block failed, manual follow-up required");
                Ok(BlockOutcome::Failed(action_id))
            }
        }
    }

    /// Operator-triggered rollback of a blocked action.
    pub async fn request_rollback(&self, action_id: Uuid) -> Result<ResponseAction, AppError> {
        let action = get(&self.pool, action_id).await?;
        if action.state != ResponseState::Blocked {
            return Err(AppError::InvalidTransition(format!(
                "cannot roll back an action in state {:?}",
                action.state
            )));
        }

        {
            let _guard = self.locks.acquire(&action.src_ip).await;
            self.transition(
                action_id,
                ResponseState::Blocked,
                ResponseState::RollbackRequested,
                None,
            )
            .await?;
        }

        match with_retry(&self.retry, "rollback", || {
            self.adapter.rollback(&action.src_ip)
        })
        .await
        {
            Ok(()) => {
                self.transition(
                    action_id,
                    ResponseState::RollbackRequested,
                    ResponseState::RolledBack,
                    None,
                )
                .await?;
                tracing::info!(src_ip = %action.src_ip, action_id = %action_id, "rolled back block");
            }
            Err(e) => {
                self.transition(
                    action_id,
                    ResponseState::RollbackRequested,
                    ResponseState::Failed,
                    Some(&e.to_string()),
                )
                .await?;
                tracing::error!(src_ip = %action.src_ip, action_id = %action_id, error = %e, "rollback failed, manual follow-up required");
            }
        }

        get(&self.pool, action_id).await
    }

    /// Apply a single validated transition.
    ///
    /// Optimistic: the update is conditional on the expected current state,
    /// so a concurrent shutdown finalization wins cleanly.
    async fn transition(
        &self,
        action_id: Uuid,
        from: ResponseState,
        to: ResponseState,
        failure_reason: Option<&str>,
    ) -> Result<bool, AppError> {
        if !is_valid_transition(from, to) {
            return Err(AppError::InvalidTransition(format!(
                "cannot transition from {from:?} to {to:?}"
            )));
        }

        let result = sqlx::query(
            r#"
            UPDATE response_actions
            SET state = $1,
                failure_reason = $2,
                resolved_at = CASE WHEN $3 THEN NOW() ELSE resolved_at END
            WHERE id = $4 AND state = $5
            "#,
        )
        .bind(to)
        .bind(failure_reason)
        .bind(to.is_terminal())
        .bind(action_id)
        .bind(from)
        .execute(&self.pool)
        .await?;

        let applied = result.rows_affected() > 0;
        if !applied {
            tracing::warn!(
                action_id = %action_id,
                expected = ?from,
                target = ?to,
                "transition skipped: action no longer in expected state"
            );
        }
        Ok(applied)
    }

    /// Mark any action still awaiting an external call as failed.
    ///
    /// Called on shutdown so no action is left in `Pending` or
    /// `Rollback_Requested` indefinitely.
    pub async fn finalize_unresolved(&self, reason: &str) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE response_actions
            SET state = 'Failed', failure_reason = $1, resolved_at = NOW()
            WHERE state IN ('Pending', 'Rollback_Requested')
            "#,
        )
        .bind(reason)
        .execute(&self.pool)
        .await?;

        let count = result.rows_affected();
        if count > 0 {
            tracing::warn!(count, reason, "finalized unresolved response actions");
        }
        Ok(count)
    }
}

/// The active (non-terminal) action for an IP, if any.
pub async fn active_action(pool: &PgPool, src_ip: &str) -> Result<Option<ResponseAction>, AppError> {
    let action = sqlx::query_as::<_, ResponseAction>(
        r#"
        SELECT * FROM response_actions
        WHERE src_ip = $1 AND state IN ('Pending', 'Blocked', 'Rollback_Requested')
        "#,
    )
    .bind(src_ip)
    .fetch_optional(pool)
    .await?;
    Ok(action)
}

/// Get an action by ID.
pub async fn get(pool: &PgPool, id: Uuid) -> Result<ResponseAction, AppError> {
    sqlx::query_as::<_, ResponseAction>("SELECT * FROM response_actions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Response action not found".to_string()))
}

/// List actions, most recent first.
pub async fn list(
    pool: &PgPool,
    pagination: &Pagination,
) -> Result<PagedResult<ResponseAction>, AppError> {
    let (items, total) = tokio::try_join!(
        async {
            sqlx::query_as::<_, ResponseAction>(
                "SELECT * FROM response_actions ORDER BY created_at DESC LIMIT $1 OFFSET $2",
            )
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(pool)
            .await
            .map_err(AppError::from)
        },
        async {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM response_actions")
                .fetch_one(pool)
                .await
                .map_err(AppError::from)
        }
    )?;
    Ok(PagedResult::new(items, total, pagination))
}

/// Operator marks a block as a false positive; feeds the FPR metric.
pub async fn mark_benign(pool: &PgPool, id: Uuid) -> Result<ResponseAction, AppError> {
    let action = sqlx::query_as::<_, ResponseAction>(
        r#"
        UPDATE response_actions
        SET marked_benign = TRUE
        WHERE id = $1 AND state IN ('Blocked', 'Rolled_Back')
        RETURNING *
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match action {
        Some(action) => Ok(action),
        None => {
            // Distinguish missing from wrong-state for a useful error.
            let existing = get(pool, id).await?;
            Err(AppError::InvalidTransition(format!(
                "cannot mark an action in state {:?} as benign",
                existing.state
            )))
        }
    }
}

fn is_active_ip_conflict(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|db| db.constraint())
        .is_some_and(|c| c == "idx_response_actions_active_ip")
}

async fn insert_pending(pool: &PgPool, event_id: Uuid, src_ip: &str) -> Result<Uuid, AppError> {
    let id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO response_actions (event_id, src_ip, state)
        VALUES ($1, $2, 'Pending')
        RETURNING id
        "#,
    )
    .bind(event_id)
    .bind(src_ip)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;

    // -- Transition graph --

    #[test]
    fn pending_to_blocked() {
        assert!(is_valid_transition(
            ResponseState::Pending,
            ResponseState::Blocked
        ));
    }

    #[test]
    fn pending_to_failed() {
        assert!(is_valid_transition(
            ResponseState::Pending,
            ResponseState::Failed
        ));
    }

    #[test]
    fn blocked_to_rollback_requested() {
        assert!(is_valid_transition(
            ResponseState::Blocked,
            ResponseState::RollbackRequested
        ));
    }

    #[test]
    fn rollback_requested_to_rolled_back() {
        assert!(is_valid_transition(
            ResponseState::RollbackRequested,
            ResponseState::RolledBack
        ));
    }

    #[test]
    fn rollback_requested_to_failed() {
        assert!(is_valid_transition(
            ResponseState::RollbackRequested,
            ResponseState::Failed
        ));
    }

    #[test]
    fn blocked_to_rolled_back_invalid() {
        assert!(!is_valid_transition(
            ResponseState::Blocked,
            ResponseState::RolledBack
        ));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for from in [ResponseState::RolledBack, ResponseState::Failed] {
            for to in [
                ResponseState::Pending,
                ResponseState::Blocked,
                ResponseState::RollbackRequested,
                ResponseState::RolledBack,
                ResponseState::Failed,
            ] {
                assert!(
                    !is_valid_transition(from, to),
                    "expected {from:?} → {to:?} to be invalid"
                );
            }
        }
    }

    #[test]
    fn pending_cannot_skip_to_rollback() {
        assert!(!is_valid_transition(
            ResponseState::Pending,
            ResponseState::RollbackRequested
        ));
        assert!(!is_valid_transition(
            ResponseState::Pending,
            ResponseState::RolledBack
        ));
    }

    // -- Per-IP locking --

    #[tokio::test]
    async fn same_ip_operations_are_serialized() {
        let locks = IpLocks::new();
        let concurrent = Arc::new(AtomicU32::new(0));
        let max_seen = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let concurrent = concurrent.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("10.0.0.5").await;
                let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                concurrent.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_ips_do_not_contend() {
        let locks = IpLocks::new();
        let _a = locks.acquire("10.0.0.5").await;
        // Acquiring a different IP must not deadlock while `_a` is held.
        let acquired = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire("203.0.113.7"),
        )
        .await;
        assert!(acquired.is_ok());
    }
}
