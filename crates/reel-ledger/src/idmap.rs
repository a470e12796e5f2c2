//! Bidirectional short/full identifier mapping.
//!
//! Local filenames embed the short form of a job id while the generation
//! backends issue and expect the full form. Keeping the duality in one
//! explicit lookup table (instead of string-matching at call sites)
//! eliminates a whole class of "file not found because of id mismatch" bugs.

use std::collections::BTreeMap;

use reel_models::{segment_id, RollKind};

use crate::error::{LedgerError, LedgerResult};

/// Length of the short identifier form (a prefix of the full id).
pub const SHORT_ID_LEN: usize = 8;

/// Pre-provisioned avatar job ids, in segment order.
///
/// Used to seed a project that has not made real submissions yet, so the
/// reconciler has deterministic ids to work against during development.
pub const DEFAULT_AROLL_IDS: [&str; 4] = [
    "5169ef5a328149a8b13c365ee7060106",
    "aed87db0234e4965825c7ee4c1067467",
    "e7d47355c21e4190bad8752c799343ee",
    "36064085e2a240768a8368bc6a911aea",
];

/// Bidirectional mapping between short and full job identifiers.
///
/// Each short id maps to exactly one full id for the lifetime of a project;
/// conflicting inserts are rejected.
#[derive(Debug, Clone, Default)]
pub struct IdentifierMap {
    short_to_full: BTreeMap<String, String>,
    full_to_short: BTreeMap<String, String>,
}

impl IdentifierMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a map pre-seeded with the default avatar job ids.
    pub fn with_defaults() -> Self {
        let mut map = Self::new();
        for full in DEFAULT_AROLL_IDS {
            // Defaults are disjoint prefixes, insert cannot conflict.
            let _ = map.insert(full);
        }
        map
    }

    /// Register a full id, deriving its short form as the leading prefix.
    ///
    /// Returns the short form. Re-registering the same id is a no-op.
    pub fn insert(&mut self, full_id: &str) -> LedgerResult<String> {
        if full_id.len() <= SHORT_ID_LEN {
            return Err(LedgerError::UnknownIdentifier(full_id.to_string()));
        }
        let short = full_id[..SHORT_ID_LEN].to_string();
        self.insert_pair(&short, full_id)?;
        Ok(short)
    }

    /// Register an explicit short/full pair.
    pub fn insert_pair(&mut self, short_id: &str, full_id: &str) -> LedgerResult<()> {
        if let Some(existing) = self.short_to_full.get(short_id) {
            if existing != full_id {
                return Err(LedgerError::IdConflict {
                    short: short_id.to_string(),
                    existing: existing.clone(),
                });
            }
            return Ok(());
        }
        self.short_to_full
            .insert(short_id.to_string(), full_id.to_string());
        self.full_to_short
            .insert(full_id.to_string(), short_id.to_string());
        Ok(())
    }

    /// Look up the full id for a short id.
    pub fn resolve(&self, short_id: &str) -> Option<&str> {
        self.short_to_full.get(short_id).map(String::as_str)
    }

    /// Look up the short id for a full id.
    pub fn resolve_reverse(&self, full_id: &str) -> Option<&str> {
        self.full_to_short.get(full_id).map(String::as_str)
    }

    /// Normalize an id presented in either form to its full form.
    pub fn expand<'a>(&'a self, id: &'a str) -> Option<&'a str> {
        if self.full_to_short.contains_key(id) {
            Some(id)
        } else {
            self.resolve(id)
        }
    }

    /// Normalize an id presented in either form to its short form.
    pub fn shorten<'a>(&'a self, id: &'a str) -> Option<&'a str> {
        if self.short_to_full.contains_key(id) {
            Some(id)
        } else {
            self.resolve_reverse(id)
        }
    }

    /// Resolve an id in either form to its `(short, full)` pair, registering
    /// it first when it is an unseen full-form id.
    pub fn register(&mut self, id: &str) -> LedgerResult<(String, String)> {
        if let (Some(short), Some(full)) = (self.shorten(id), self.expand(id)) {
            return Ok((short.to_string(), full.to_string()));
        }
        let short = self.insert(id)?;
        Ok((short, id.to_string()))
    }

    /// The fixed seeding set for a stream: ordered `(segment_id, full_id)`
    /// pairs. Only A-Roll has pre-provisioned jobs.
    pub fn seed_defaults(kind: RollKind) -> Vec<(String, String)> {
        match kind {
            RollKind::Aroll => DEFAULT_AROLL_IDS
                .iter()
                .enumerate()
                .map(|(i, full)| (segment_id(i), full.to_string()))
                .collect(),
            RollKind::Broll => Vec::new(),
        }
    }
}
