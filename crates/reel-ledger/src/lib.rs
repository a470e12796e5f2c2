//! Durable per-segment status ledger and identifier mapping.
//!
//! The ledger is the single source of truth for generation state: every
//! observed job transition is written here, and the reconciler reads it to
//! decide which artifacts still need to be mapped onto assembly filenames.

pub mod error;
pub mod idmap;
pub mod ledger;
pub mod project;

pub use error::{LedgerError, LedgerResult};
pub use idmap::{IdentifierMap, DEFAULT_AROLL_IDS, SHORT_ID_LEN};
pub use ledger::StatusLedger;
pub use project::ProjectContext;
