//! Polling status client for the talking-avatar generation backend.
//!
//! The backend is request/response: the orchestration layer submits a job,
//! then repeats `query` on its own interval until the snapshot reports
//! ready. This crate performs no retries and no local writes; feeding
//! results into the status ledger is the caller's job.

pub mod client;
pub mod error;
pub mod types;

pub use client::{AvatarClient, AvatarClientConfig};
pub use error::{AvatarError, AvatarResult};
pub use types::StatusSnapshot;
