//! Push-based progress tracker for the render generation backend.
//!
//! The backend broadcasts generation progress over a long-lived WebSocket
//! connection. This crate maintains one such connection, registers per-job
//! subscriptions, and dispatches `ProgressEvent`s to caller-supplied
//! handlers from a background receive task until the connection is closed.

pub mod error;
pub mod protocol;
pub mod tracker;

pub use error::{TrackerError, TrackerResult};
pub use tracker::{ProgressHandler, ProgressTracker, RenderTrackerConfig, TrackerState};
