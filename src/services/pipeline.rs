//! The real-time processing pipeline: normalize → score → respond.
//!
//! Source adapters feed a shared, ordered-by-arrival channel. The intake
//! task normalizes each record and records its frequency weight in arrival
//! order, then hands the slow half of the pass (persistence, reputation and
//! AI lookups, enforcement) to a spawned worker. A slow AI answer for one
//! source IP never stalls scoring for unrelated IPs; same-IP responses stay
//! strictly ordered behind the controller's per-IP locks.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

use crate::errors::AppError;
use crate::models::event::RawRecord;
use crate::models::score::SeverityTier;
use crate::normalizers;
use crate::services::ai::AiAssessor;
use crate::services::enforcement::EnforcementAdapter;
use crate::services::frequency::FrequencyIndex;
use crate::services::response::ResponseController;
use crate::services::{events, scoring};

/// Cloneable intake handle for source adapters and the push route.
#[derive(Clone)]
pub struct PipelineHandle {
    tx: mpsc::Sender<RawRecord>,
}

impl PipelineHandle {
    /// Submit a raw record for processing.
    pub async fn submit(&self, record: RawRecord) -> Result<(), AppError> {
        self.tx
            .send(record)
            .await
            .map_err(|_| AppError::DependencyUnavailable("pipeline is shut down".to_string()))
    }
}

/// Create the intake channel.
pub fn channel(buffer: usize) -> (PipelineHandle, mpsc::Receiver<RawRecord>) {
    let (tx, rx) = mpsc::channel(buffer);
    (PipelineHandle { tx }, rx)
}

pub struct Pipeline<A, E>
where
    A: AiAssessor + 'static,
    E: EnforcementAdapter + 'static,
{
    pool: PgPool,
    frequency: Arc<FrequencyIndex>,
    ai: Arc<A>,
    ai_timeout: Duration,
    controller: Arc<ResponseController<E>>,
    redelivery: PipelineHandle,
    redelivery_delay: Duration,
    workers: JoinSet<()>,
}

impl<A, E> Pipeline<A, E>
where
    A: AiAssessor + 'static,
    E: EnforcementAdapter + 'static,
{
    pub fn new(
        pool: PgPool,
        frequency: Arc<FrequencyIndex>,
        ai: A,
        ai_timeout: Duration,
        controller: Arc<ResponseController<E>>,
        redelivery: PipelineHandle,
        redelivery_delay: Duration,
    ) -> Self {
        Self {
            pool,
            frequency,
            ai: Arc::new(ai),
            ai_timeout,
            controller,
            redelivery,
            redelivery_delay,
            workers: JoinSet::new(),
        }
    }

    /// Consume records until shutdown, then drain whatever intake already
    /// accepted, wait for in-flight workers, and finalize anything left
    /// unresolved.
    pub async fn run(mut self, mut rx: mpsc::Receiver<RawRecord>, mut shutdown: watch::Receiver<bool>) {
        loop {
            let record = tokio::select! {
                _ = shutdown.changed() => break,
                maybe = rx.recv() => match maybe {
                    Some(record) => record,
                    None => break,
                },
            };
            self.process(record).await;
        }

        tracing::info!("pipeline stopping: no longer accepting raw records");
        rx.close();

        // Accepted records are a promise: everything still buffered gets a
        // full pass before the pipeline exits.
        while let Some(record) = rx.recv().await {
            self.process(record).await;
        }

        while self.workers.join_next().await.is_some() {}
        if let Err(e) = self.controller.finalize_unresolved("shutdown").await {
            tracing::error!(error = %e, "failed to finalize unresolved actions on shutdown");
        }
    }

    /// One intake pass: normalize (arrival-ordered), record frequency, then
    /// spawn the rest so the next record is picked up immediately.
    async fn process(&mut self, record: RawRecord) {
        let normalizer = normalizers::for_source(record.source);
        let new_event = match normalizer.normalize(&record) {
            Ok(event) => event,
            Err(e) => {
                match events::quarantine(&self.pool, &record, &e.reason).await {
                    Ok(id) => tracing::warn!(
                        source = %record.source,
                        quarantine_id = %id,
                        reason = %e.reason,
                        "quarantined malformed record"
                    ),
                    Err(err) => self.handle_pass_error(record, err),
                }
                return;
            }
        };

        // Recorded on the intake task so same-IP weights follow arrival
        // order even though scoring itself runs concurrently.
        let frequency_weight = self
            .frequency
            .record(&new_event.src_ip.to_string(), new_event.occurred_at);

        let pool = self.pool.clone();
        let ai = self.ai.clone();
        let ai_timeout = self.ai_timeout;
        let controller = self.controller.clone();
        let redelivery = self.redelivery.clone();
        let redelivery_delay = self.redelivery_delay;
        self.workers.spawn(async move {
            let result = async {
                let event = events::insert(&pool, &new_event).await?;
                let score =
                    scoring::score_event(&pool, &event, frequency_weight, ai.as_ref(), ai_timeout)
                        .await?;
                if score.severity == SeverityTier::High {
                    if let Err(e) = controller.maybe_block(event.id, &event.src_ip).await {
                        tracing::error!(error = %e, src_ip = %event.src_ip, "auto-response failed");
                    }
                }
                Ok::<(), AppError>(())
            }
            .await;

            match result {
                Ok(()) => {}
                Err(e) if e.is_fatal_for_pass() => {
                    // The store is unreachable: redeliver rather than drop.
                    tracing::error!(error = %e, source = %record.source, "pipeline pass failed, redelivering record");
                    tokio::time::sleep(redelivery_delay).await;
                    if let Err(e) = redelivery.submit(record).await {
                        tracing::error!(error = %e, "redelivery failed: pipeline already shut down");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, source = %record.source, "unrecoverable record error");
                }
            }
        });

        // Opportunistically reap finished workers.
        while self.workers.try_join_next().is_some() {}
    }

    /// Quarantine could not be written either; redeliver fatal failures.
    fn handle_pass_error(&self, record: RawRecord, err: AppError) {
        if err.is_fatal_for_pass() {
            tracing::error!(error = %err, source = %record.source, "pipeline pass failed, redelivering record");
            let handle = self.redelivery.clone();
            let delay = self.redelivery_delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Err(e) = handle.submit(record).await {
                    tracing::error!(error = %e, "redelivery failed: pipeline already shut down");
                }
            });
        } else {
            tracing::error!(error = %err, source = %record.source, "unrecoverable record error");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::models::event::EventSource;

    use super::*;

    #[tokio::test]
    async fn submit_fails_after_receiver_drops() {
        let (handle, rx) = channel(4);
        drop(rx);
        let err = handle
            .submit(RawRecord {
                source: EventSource::Siem,
                payload: "{}".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DependencyUnavailable(_)));
    }

    #[tokio::test]
    async fn channel_preserves_arrival_order() {
        let (handle, mut rx) = channel(8);
        for i in 0..5 {
            handle
                .submit(RawRecord {
                    source: EventSource::Ids,
                    payload: i.to_string(),
                })
                .await
                .unwrap();
        }
        for i in 0..5 {
            assert_eq!(rx.recv().await.unwrap().payload, i.to_string());
        }
    }

    #[tokio::test]
    async fn closed_channel_still_yields_buffered_records() {
        let (handle, mut rx) = channel(8);
        for i in 0..3 {
            handle
                .submit(RawRecord {
                    source: EventSource::Firewall,
                    payload: i.to_string(),
                })
                .await
                .unwrap();
        }

        rx.close();
        assert!(handle
            .submit(RawRecord {
                source: EventSource::Firewall,
                payload: "late".to_string(),
            })
            .await
            .is_err());

        // The drain after close sees everything accepted before it.
        let mut drained = Vec::new();
        while let Some(record) = rx.recv().await {
            drained.push(record.payload);
        }
        assert_eq!(drained, ["0", "1", "2"]);
    }
}
