//! folio-rt library - Reading Tracker
//!
//! Client side of reading progress sync: samples scroll position, counts
//! visible seconds, and sends partial updates to folio-ps when progress
//! moves enough, on a timer, when the page is hidden, and at teardown.

pub mod config;
pub mod sampler;
pub mod scheduler;
pub mod session;
pub mod transport;

pub use config::{ShortContentPolicy, TrackerConfig};
pub use sampler::{compute_progress, ClientSampleState, ProgressSampler, ScrollGeometry};
pub use scheduler::{SkipReason, SyncOutcome, SyncScheduler};
pub use session::TrackingSession;
pub use transport::{HttpTransport, ProgressTransport, TransportError};
