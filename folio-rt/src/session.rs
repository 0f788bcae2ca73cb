//! Tracking session lifecycle
//!
//! A [`TrackingSession`] owns the sampling state for one article view. While
//! started it runs two timer tasks: a tick that accrues visible seconds and a
//! periodic forced sync. Host events (scroll, visibility, explicit
//! completion) are forwarded through its methods. Sessions share nothing, so
//! several can track different articles side by side.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::TrackerConfig;
use crate::sampler::{ClientSampleState, ProgressSampler, ScrollGeometry};
use crate::scheduler::{SyncOutcome, SyncScheduler};
use crate::transport::ProgressTransport;

/// Reading tracker for one article
pub struct TrackingSession {
    config: TrackerConfig,
    sampler: ProgressSampler,
    state: Arc<Mutex<ClientSampleState>>,
    scheduler: Arc<SyncScheduler>,
    cancel: CancellationToken,
    timers: Vec<JoinHandle<()>>,
}

impl TrackingSession {
    /// New, not yet started session for a page that starts visible
    pub fn new(
        article_id: impl Into<String>,
        config: TrackerConfig,
        transport: Arc<dyn ProgressTransport>,
    ) -> Self {
        let state = Arc::new(Mutex::new(ClientSampleState::visible()));
        let scheduler = Arc::new(SyncScheduler::new(
            article_id,
            config.sync_threshold,
            transport,
            Arc::clone(&state),
        ));

        Self {
            sampler: ProgressSampler::new(config.short_content),
            config,
            state,
            scheduler,
            cancel: CancellationToken::new(),
            timers: Vec::new(),
        }
    }

    pub fn article_id(&self) -> &str {
        self.scheduler.article_id()
    }

    pub fn is_running(&self) -> bool {
        !self.timers.is_empty()
    }

    /// Copy of the current sampling state
    pub fn snapshot(&self) -> ClientSampleState {
        self.lock().clone()
    }

    /// Spawn the tick and periodic sync timers; no-op if already running
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        let tick_every = self.config.tick_interval;
        let sync_every = self.config.sync_interval;

        let sampler = self.sampler;
        let state = Arc::clone(&self.state);
        let cancel = self.cancel.clone();
        self.timers.push(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + tick_every, tick_every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let mut guard = state.lock().unwrap_or_else(|p| p.into_inner());
                        sampler.tick(&mut guard);
                    }
                }
            }
        }));

        let scheduler = Arc::clone(&self.scheduler);
        let cancel = self.cancel.clone();
        self.timers.push(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + sync_every, sync_every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let outcome = scheduler.periodic_sync().await;
                        debug!(article_id = scheduler.article_id(), ?outcome, "Periodic sync");
                    }
                }
            }
        }));

        info!(
            article_id = self.article_id(),
            tick_ms = tick_every.as_millis() as u64,
            sync_interval_ms = sync_every.as_millis() as u64,
            "Tracking session started"
        );
    }

    /// Scroll or initial-paint sample; syncs if progress moved enough
    pub async fn on_scroll(&self, geometry: ScrollGeometry) -> SyncOutcome {
        {
            let mut state = self.lock();
            self.sampler.observe(&mut state, &geometry);
        }
        self.scheduler.sync(false).await
    }

    /// Page shown or hidden; hiding forces a sync
    pub async fn on_visibility_change(&self, visible: bool) -> Option<SyncOutcome> {
        {
            let mut state = self.lock();
            self.sampler.set_visible(&mut state, visible);
        }
        if visible {
            None
        } else {
            Some(self.scheduler.sync(true).await)
        }
    }

    /// Host reached the end of the article
    pub async fn mark_complete(&self) -> SyncOutcome {
        {
            let mut state = self.lock();
            self.sampler.mark_complete(&mut state);
        }
        self.scheduler.sync(false).await
    }

    /// Stop the timers and dispatch the final forced sync
    ///
    /// The final sync runs detached: it outlives the session and is not
    /// cancelled by it. Callers that need its result may await the handle;
    /// page teardown just drops it.
    pub fn stop(mut self) -> JoinHandle<SyncOutcome> {
        self.cancel.cancel();
        self.timers.clear();

        info!(article_id = self.article_id(), "Tracking session stopped");
        self.scheduler.dispatch_detached()
    }

    fn lock(&self) -> MutexGuard<'_, ClientSampleState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
