//! Progress sampling
//!
//! Turns scroll geometry into a percentage and accumulates visible reading
//! time one tick at a time. Nothing here can fail; the sampler only updates
//! [`ClientSampleState`], and the scheduler decides when to send it.

use crate::config::ShortContentPolicy;

/// Scroll position reported by the host, in any consistent unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollGeometry {
    pub scroll_offset: f64,
    pub viewport_height: f64,
    pub total_height: f64,
}

impl ScrollGeometry {
    pub fn new(scroll_offset: f64, viewport_height: f64, total_height: f64) -> Self {
        Self {
            scroll_offset,
            viewport_height,
            total_height,
        }
    }

    /// Distance the viewport can travel; zero or less when the content fits
    pub fn scrollable_range(&self) -> f64 {
        self.total_height - self.viewport_height
    }
}

/// Percentage of the scrollable range covered, or `None` if nothing scrolls
///
/// Overscroll is clamped to `0..=100`.
///
/// # Examples
///
/// ```
/// use folio_rt::sampler::{compute_progress, ScrollGeometry};
///
/// assert_eq!(compute_progress(&ScrollGeometry::new(500.0, 1000.0, 2000.0)), Some(50.0));
/// assert_eq!(compute_progress(&ScrollGeometry::new(-40.0, 1000.0, 2000.0)), Some(0.0));
/// assert_eq!(compute_progress(&ScrollGeometry::new(0.0, 1000.0, 800.0)), None);
/// ```
pub fn compute_progress(geometry: &ScrollGeometry) -> Option<f64> {
    let range = geometry.scrollable_range();
    if range.is_nan() || range <= 0.0 {
        return None;
    }
    let percent = geometry.scroll_offset / range * 100.0;
    // max() first so a NaN offset reads as the top of the page
    Some(percent.max(0.0).min(100.0))
}

/// Client-local sync bookkeeping for one article
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientSampleState {
    /// Latest sampled progress, 0..=100
    pub current_progress: f64,
    /// Progress value of the last confirmed sync
    pub last_synced_progress: f64,
    /// Visible seconds not yet confirmed by the server
    pub pending_time_spent: u64,
    pub is_visible: bool,
    /// A sync request is outstanding
    pub in_flight: bool,
}

impl ClientSampleState {
    /// Fresh state for a page that starts visible
    pub fn visible() -> Self {
        Self {
            is_visible: true,
            ..Self::default()
        }
    }
}

/// Applies host events to a [`ClientSampleState`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressSampler {
    policy: ShortContentPolicy,
}

impl ProgressSampler {
    pub fn new(policy: ShortContentPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ShortContentPolicy {
        self.policy
    }

    /// Record a scroll or initial-paint sample
    ///
    /// Lower values than before are stored as-is; the server keeps the max.
    pub fn observe(&self, state: &mut ClientSampleState, geometry: &ScrollGeometry) {
        match compute_progress(geometry) {
            Some(progress) => state.current_progress = progress,
            None => match self.policy {
                ShortContentPolicy::CompleteOnFirstPaint => state.current_progress = 100.0,
                ShortContentPolicy::AwaitExplicitComplete => {}
            },
        }
    }

    /// One second of engagement, counted only while visible
    pub fn tick(&self, state: &mut ClientSampleState) {
        if state.is_visible {
            state.pending_time_spent = state.pending_time_spent.saturating_add(1);
        }
    }

    pub fn set_visible(&self, state: &mut ClientSampleState, visible: bool) {
        state.is_visible = visible;
    }

    /// Host signal that the reader reached the end
    pub fn mark_complete(&self, state: &mut ClientSampleState) {
        state.current_progress = 100.0;
    }
}
