//! Artifact reconciliation for downloaded generation outputs.
//!
//! Generation backends drop artifacts under names derived from their own job
//! ids; the assembly stage expects deterministic per-segment filenames. This
//! crate resolves the two through the identifier map, copies downloads into
//! their canonical locations, and records the result in the status ledger.
//! Reconciliation is idempotent and can run any number of times without
//! losing or duplicating data.

pub mod error;
pub mod reconciler;

pub use error::{ReconcileError, ReconcileResult};
pub use reconciler::{ArtifactReconciler, ReconcileOutcome};
