use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::TRIGGER_ID_PREFIX;
use crate::error::{PollError, Result};
use crate::types::{ScheduledTrigger, TriggerPayload};

/// One-shot future-callback boundary (a cron-rule + target equivalent).
///
/// `create` must fail fast when `fires_at` is not strictly in the future —
/// silently scheduling for "never" would strand the poll without a
/// resolution path. `delete` is the cleanup half of the contract: the
/// lifecycle calls it exactly once per resolution, and an entry that is
/// already gone is how a duplicate fire recognizes an already-resolved poll.
#[async_trait]
pub trait TriggerScheduler: Send + Sync {
    /// Registers a one-shot callback carrying the poll's payload.
    async fn create(&self, trigger: ScheduledTrigger) -> Result<()>;

    /// Removes a registered trigger. Deleting an unknown id is an error the
    /// caller logs but never escalates.
    async fn delete(&self, trigger_id: &str) -> Result<()>;

    /// Whether the trigger is still registered. Presence persists through
    /// the fire itself and ends only at `delete`, so absence means the
    /// owning poll already completed its cleanup.
    async fn is_registered(&self, trigger_id: &str) -> bool;
}

pub fn new_trigger_id() -> String {
    format!("{TRIGGER_ID_PREFIX}-{}", Uuid::new_v4())
}

// ---------------------------------------------------------------------------
// In-process scheduler
// ---------------------------------------------------------------------------

/// Tokio-backed scheduler: each trigger is a spawned task sleeping until
/// `fires_at`, then sending its payload over the fire channel. Fires are
/// at-most-once by construction; `delete` aborts the task (harmless after
/// the fire) and drops the registry entry.
///
/// Durable backends (a cron-rule service, a delayed queue) implement the
/// same trait; this one covers single-process deployments and tests.
#[derive(Clone)]
pub struct InProcessScheduler {
    fire_tx: mpsc::Sender<TriggerPayload>,
    tasks: Arc<DashMap<String, JoinHandle<()>>>,
}

impl InProcessScheduler {
    /// The receiving half is where fires arrive — the caller drains it and
    /// feeds each payload to `PollLifecycleManager::resolve`.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<TriggerPayload>) {
        let (fire_tx, fire_rx) = mpsc::channel(capacity);
        (
            Self {
                fire_tx,
                tasks: Arc::new(DashMap::new()),
            },
            fire_rx,
        )
    }

    pub fn registered_count(&self) -> usize {
        self.tasks.len()
    }
}

#[async_trait]
impl TriggerScheduler for InProcessScheduler {
    async fn create(&self, trigger: ScheduledTrigger) -> Result<()> {
        let now = Utc::now();
        if trigger.fires_at <= now {
            return Err(PollError::Scheduling(format!(
                "trigger {} fires_at {} is not in the future",
                trigger.trigger_id, trigger.fires_at
            )));
        }
        let delay = (trigger.fires_at - now)
            .to_std()
            .map_err(|e| PollError::Scheduling(format!("unrepresentable delay: {e}")))?;

        let trigger_id = trigger.trigger_id.clone();
        let fires_at = trigger.fires_at;
        let fire_tx = self.fire_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = fire_tx.send(trigger.payload).await {
                warn!(trigger_id = %trigger.trigger_id, "trigger fire dropped, receiver gone: {e}");
            }
        });

        info!(trigger_id = %trigger_id, fires_at = %fires_at, "trigger registered");
        self.tasks.insert(trigger_id, handle);
        Ok(())
    }

    async fn delete(&self, trigger_id: &str) -> Result<()> {
        match self.tasks.remove(trigger_id) {
            Some((_, handle)) => {
                handle.abort();
                info!(trigger_id, "trigger deleted");
                Ok(())
            }
            None => Err(PollError::Scheduling(format!(
                "trigger {trigger_id} is not registered"
            ))),
        }
    }

    async fn is_registered(&self, trigger_id: &str) -> bool {
        self.tasks.contains_key(trigger_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PollDefinition, PollKind, PollMessageRef};
    use chrono::Duration;

    fn payload(poll_id: &str, trigger_id: &str) -> TriggerPayload {
        let now = Utc::now();
        TriggerPayload {
            poll_id: poll_id.to_string(),
            trigger_id: trigger_id.to_string(),
            message: PollMessageRef {
                channel_id: "chan".to_string(),
                message_id: "msg".to_string(),
            },
            definition: PollDefinition {
                poll_id: poll_id.to_string(),
                kind: PollKind::YesNo,
                sell_ticker: "WETH".to_string(),
                sell_amount: "1".to_string(),
                duration_minutes: 1,
                vote_options: vec![],
                created_at: now,
                expires_at: now + Duration::minutes(1),
            },
        }
    }

    fn trigger(id: &str, in_secs: i64) -> ScheduledTrigger {
        ScheduledTrigger {
            trigger_id: id.to_string(),
            fires_at: Utc::now() + Duration::seconds(in_secs),
            payload: payload("poll-1", id),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_payload_once_at_fire_time() {
        let (scheduler, mut fire_rx) = InProcessScheduler::new(8);
        scheduler.create(trigger("t1", 60)).await.unwrap();
        assert!(scheduler.is_registered("t1").await);

        tokio::time::advance(std::time::Duration::from_secs(61)).await;
        let fired = fire_rx.recv().await.expect("trigger should fire");
        assert_eq!(fired.trigger_id, "t1");

        // Still registered after the fire — only delete removes it.
        assert!(scheduler.is_registered("t1").await);

        // And it never fires a second time.
        tokio::time::advance(std::time::Duration::from_secs(120)).await;
        assert!(fire_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn deleted_trigger_never_fires() {
        let (scheduler, mut fire_rx) = InProcessScheduler::new(8);
        scheduler.create(trigger("t1", 60)).await.unwrap();
        scheduler.delete("t1").await.unwrap();
        assert!(!scheduler.is_registered("t1").await);

        tokio::time::advance(std::time::Duration::from_secs(120)).await;
        assert!(fire_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn past_fire_time_fails_fast() {
        let (scheduler, _fire_rx) = InProcessScheduler::new(8);
        let result = scheduler.create(trigger("t1", -5)).await;
        assert!(matches!(result, Err(PollError::Scheduling(_))));
        assert!(!scheduler.is_registered("t1").await);
    }

    #[tokio::test]
    async fn deleting_unknown_trigger_is_an_error() {
        let (scheduler, _fire_rx) = InProcessScheduler::new(8);
        assert!(matches!(
            scheduler.delete("missing").await,
            Err(PollError::Scheduling(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn independent_triggers_fire_independently() {
        let (scheduler, mut fire_rx) = InProcessScheduler::new(8);
        scheduler
            .create(ScheduledTrigger {
                trigger_id: "early".to_string(),
                fires_at: Utc::now() + Duration::seconds(30),
                payload: payload("poll-early", "early"),
            })
            .await
            .unwrap();
        scheduler
            .create(ScheduledTrigger {
                trigger_id: "late".to_string(),
                fires_at: Utc::now() + Duration::seconds(90),
                payload: payload("poll-late", "late"),
            })
            .await
            .unwrap();
        assert_eq!(scheduler.registered_count(), 2);

        tokio::time::advance(std::time::Duration::from_secs(31)).await;
        assert_eq!(fire_rx.recv().await.unwrap().poll_id, "poll-early");
        assert!(fire_rx.try_recv().is_err());

        tokio::time::advance(std::time::Duration::from_secs(60)).await;
        assert_eq!(fire_rx.recv().await.unwrap().poll_id, "poll-late");
    }
}
