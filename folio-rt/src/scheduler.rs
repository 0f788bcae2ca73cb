//! Sync scheduling
//!
//! Decides when the sampled state is worth sending and reconciles the local
//! counters with the outcome. Delivery is at-least-once: a failed sync leaves
//! every counter as it was, and the next sync resends the same seconds.
//!
//! The state mutex is never held across an `.await`. The `in_flight` flag
//! keeps at most one request outstanding per session.

use std::sync::{Arc, Mutex, MutexGuard};

use folio_common::{ProgressRecord, ProgressUpdate};
use tracing::{debug, warn};

use crate::sampler::ClientSampleState;
use crate::transport::ProgressTransport;

/// Why a sync was not attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another sync has not finished yet
    InFlight,
    /// Unforced and progress moved less than the threshold
    BelowThreshold,
    /// No progress and no pending time
    NothingToSend,
    /// Periodic sync while the page is hidden
    Hidden,
}

/// Result of one sync decision
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Skipped(SkipReason),
    /// Server accepted the update; carries its merged record
    Synced(ProgressRecord),
    /// Request failed; counters were kept for the next attempt
    Failed,
}

impl SyncOutcome {
    pub fn is_synced(&self) -> bool {
        matches!(self, SyncOutcome::Synced(_))
    }
}

/// Sends sampled progress for one article
pub struct SyncScheduler {
    article_id: String,
    threshold: f64,
    transport: Arc<dyn ProgressTransport>,
    state: Arc<Mutex<ClientSampleState>>,
}

impl SyncScheduler {
    pub fn new(
        article_id: impl Into<String>,
        threshold: f64,
        transport: Arc<dyn ProgressTransport>,
        state: Arc<Mutex<ClientSampleState>>,
    ) -> Self {
        Self {
            article_id: article_id.into(),
            threshold,
            transport,
            state,
        }
    }

    pub fn article_id(&self) -> &str {
        &self.article_id
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> ClientSampleState {
        self.lock().clone()
    }

    /// Attempt a sync; `force` bypasses the progress threshold
    ///
    /// On success `last_synced_progress` becomes the rounded value actually
    /// sent, so the threshold is measured against what the server received.
    pub async fn sync(&self, force: bool) -> SyncOutcome {
        let update = {
            let mut state = self.lock();

            if state.in_flight {
                return SyncOutcome::Skipped(SkipReason::InFlight);
            }
            if !force && (state.current_progress - state.last_synced_progress).abs() < self.threshold {
                return SyncOutcome::Skipped(SkipReason::BelowThreshold);
            }
            if state.current_progress == 0.0 && state.pending_time_spent == 0 {
                return SyncOutcome::Skipped(SkipReason::NothingToSend);
            }

            state.in_flight = true;
            ProgressUpdate {
                article_id: self.article_id.clone(),
                progress: state.current_progress.round() as i64,
                time_spent: i64::try_from(state.pending_time_spent).unwrap_or(i64::MAX),
            }
        };

        let result = self.transport.send(&update).await;

        let mut state = self.lock();
        state.in_flight = false;

        match result {
            Ok(record) => {
                state.last_synced_progress = update.progress as f64;
                // Seconds ticked during the request stay pending
                state.pending_time_spent = state
                    .pending_time_spent
                    .saturating_sub(update.time_spent as u64);
                debug!(
                    article_id = %self.article_id,
                    progress = update.progress,
                    time_spent = update.time_spent,
                    server_progress = record.progress,
                    completed = record.completed,
                    "Progress synced"
                );
                SyncOutcome::Synced(record)
            }
            Err(e) => {
                warn!(
                    article_id = %self.article_id,
                    pending_time_spent = state.pending_time_spent,
                    "Progress sync failed, will retry on next trigger: {}",
                    e
                );
                SyncOutcome::Failed
            }
        }
    }

    /// Timer-driven sync: forced, but only while visible with time pending
    pub async fn periodic_sync(&self) -> SyncOutcome {
        {
            let state = self.lock();
            if !state.is_visible {
                return SyncOutcome::Skipped(SkipReason::Hidden);
            }
            if state.pending_time_spent == 0 {
                return SyncOutcome::Skipped(SkipReason::NothingToSend);
            }
        }
        self.sync(true).await
    }

    /// Forced sync on a task nobody waits for
    ///
    /// Used at teardown: the request is not cancelled with the session, and
    /// the caller may drop the handle.
    pub fn dispatch_detached(self: &Arc<Self>) -> tokio::task::JoinHandle<SyncOutcome> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move { scheduler.sync(true).await })
    }

    fn lock(&self) -> MutexGuard<'_, ClientSampleState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use async_trait::async_trait;
    use chrono::Utc;
    use folio_common::{ProgressDelta, ProgressRecord};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Records every update; fails while `failing` is set
    #[derive(Default)]
    struct ScriptedTransport {
        sent: Mutex<Vec<ProgressUpdate>>,
        failing: AtomicBool,
    }

    impl ScriptedTransport {
        fn sent(&self) -> Vec<ProgressUpdate> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProgressTransport for ScriptedTransport {
        async fn send(&self, update: &ProgressUpdate) -> Result<ProgressRecord, TransportError> {
            self.sent.lock().unwrap().push(update.clone());
            if self.failing.load(Ordering::SeqCst) {
                return Err(TransportError::Status {
                    status: 500,
                    code: "RETRIES_EXHAUSTED".to_string(),
                    message: "conflict".to_string(),
                });
            }
            let delta = ProgressDelta {
                article_id: update.article_id.clone(),
                progress: update.progress as u8,
                time_spent: update.time_spent as u64,
            };
            Ok(ProgressRecord::first_visit("m1", &delta, Utc::now()))
        }
    }

    fn scheduler(state: ClientSampleState) -> (SyncScheduler, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::default());
        let scheduler = SyncScheduler::new(
            "a1",
            10.0,
            transport.clone(),
            Arc::new(Mutex::new(state)),
        );
        (scheduler, transport)
    }

    fn state(current: f64, last: f64, pending: u64) -> ClientSampleState {
        ClientSampleState {
            current_progress: current,
            last_synced_progress: last,
            pending_time_spent: pending,
            is_visible: true,
            in_flight: false,
        }
    }

    #[tokio::test]
    async fn test_below_threshold_is_noop() {
        let (scheduler, transport) = scheduler(state(45.0, 40.0, 3));

        assert_eq!(scheduler.sync(false).await, SyncOutcome::Skipped(SkipReason::BelowThreshold));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_threshold_is_inclusive() {
        let (scheduler, transport) = scheduler(state(50.0, 40.0, 0));

        assert!(scheduler.sync(false).await.is_synced());
        assert_eq!(transport.sent()[0].progress, 50);
    }

    #[tokio::test]
    async fn test_nothing_to_send_even_when_forced() {
        let (scheduler, transport) = scheduler(state(0.0, 0.0, 0));

        assert_eq!(scheduler.sync(true).await, SyncOutcome::Skipped(SkipReason::NothingToSend));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_in_flight_is_noop() {
        let mut busy = state(90.0, 0.0, 5);
        busy.in_flight = true;
        let (scheduler, transport) = scheduler(busy);

        assert_eq!(scheduler.sync(true).await, SyncOutcome::Skipped(SkipReason::InFlight));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_success_resets_counters() {
        let (scheduler, transport) = scheduler(state(62.4, 40.0, 12));

        assert!(scheduler.sync(true).await.is_synced());

        let sent = transport.sent();
        assert_eq!(sent[0].article_id, "a1");
        assert_eq!(sent[0].progress, 62);
        assert_eq!(sent[0].time_spent, 12);

        let after = scheduler.snapshot();
        assert_eq!(after.last_synced_progress, 62.0);
        assert_eq!(after.pending_time_spent, 0);
        assert!(!after.in_flight);
    }

    #[tokio::test]
    async fn test_failure_keeps_counters_and_resends() {
        let (scheduler, transport) = scheduler(state(70.0, 40.0, 8));
        transport.failing.store(true, Ordering::SeqCst);

        assert_eq!(scheduler.sync(true).await, SyncOutcome::Failed);
        let after = scheduler.snapshot();
        assert_eq!(after.pending_time_spent, 8);
        assert_eq!(after.last_synced_progress, 40.0);
        assert!(!after.in_flight);

        // Time accrued since is added on top; nothing is lost
        scheduler.state.lock().unwrap().pending_time_spent += 2;
        transport.failing.store(false, Ordering::SeqCst);

        assert!(scheduler.sync(true).await.is_synced());
        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].time_spent, 10);
        assert_eq!(scheduler.snapshot().pending_time_spent, 0);
    }

    /// Applies every update to a running server total; the first response
    /// is lost after the write committed
    #[derive(Default)]
    struct LostResponseTransport {
        sent: Mutex<Vec<ProgressUpdate>>,
        server_total: Mutex<u64>,
        responded_once: AtomicBool,
    }

    #[async_trait]
    impl ProgressTransport for LostResponseTransport {
        async fn send(&self, update: &ProgressUpdate) -> Result<ProgressRecord, TransportError> {
            self.sent.lock().unwrap().push(update.clone());
            let total = {
                let mut total = self.server_total.lock().unwrap();
                *total += update.time_spent as u64;
                *total
            };
            if !self.responded_once.swap(true, Ordering::SeqCst) {
                return Err(TransportError::Status {
                    status: 504,
                    code: "GATEWAY_TIMEOUT".to_string(),
                    message: "response lost".to_string(),
                });
            }
            let delta = ProgressDelta {
                article_id: update.article_id.clone(),
                progress: update.progress as u8,
                time_spent: total,
            };
            Ok(ProgressRecord::first_visit("m1", &delta, Utc::now()))
        }
    }

    #[tokio::test]
    async fn test_resend_after_committed_failure_uses_local_pending() {
        let transport = Arc::new(LostResponseTransport::default());
        let shared = Arc::new(Mutex::new(state(50.0, 0.0, 8)));
        let scheduler = SyncScheduler::new("a1", 10.0, transport.clone(), shared.clone());

        // Server applied the 8 seconds but the client saw an error
        assert_eq!(scheduler.sync(true).await, SyncOutcome::Failed);
        assert_eq!(*transport.server_total.lock().unwrap(), 8);
        assert_eq!(scheduler.snapshot().pending_time_spent, 8);

        shared.lock().unwrap().pending_time_spent += 2;

        let outcome = scheduler.sync(true).await;
        let SyncOutcome::Synced(record) = outcome else {
            panic!("expected sync, got {:?}", outcome);
        };

        // Resend carries local pending only, not the server's cumulative value
        let sent = transport.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].time_spent, 8);
        assert_eq!(sent[1].time_spent, 10);
        assert_eq!(record.time_spent, 18);
        assert_eq!(scheduler.snapshot().pending_time_spent, 0);

        // At-least-once: the 8 seconds of the lost response are counted twice
        assert_eq!(*transport.server_total.lock().unwrap(), 18);
    }

    #[tokio::test]
    async fn test_periodic_sync_requires_visible_and_pending() {
        let mut hidden = state(30.0, 0.0, 4);
        hidden.is_visible = false;
        let (hidden_scheduler, transport) = scheduler(hidden);
        assert_eq!(
            hidden_scheduler.periodic_sync().await,
            SyncOutcome::Skipped(SkipReason::Hidden)
        );

        let (idle, _) = scheduler(state(30.0, 30.0, 0));
        assert_eq!(idle.periodic_sync().await, SyncOutcome::Skipped(SkipReason::NothingToSend));

        // Forced: progress unchanged but time pending
        let (busy, busy_transport) = scheduler(state(30.0, 30.0, 4));
        assert!(busy.periodic_sync().await.is_synced());
        assert_eq!(busy_transport.sent()[0].time_spent, 4);

        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_detached_sync_is_forced() {
        let (scheduler, transport) = scheduler(state(41.0, 40.0, 2));
        let scheduler = Arc::new(scheduler);

        let outcome = scheduler.dispatch_detached().await.unwrap();
        assert!(outcome.is_synced());
        assert_eq!(transport.sent().len(), 1);
    }
}
