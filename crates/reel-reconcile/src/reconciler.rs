//! Mapping backend-produced artifacts onto canonical assembly paths.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use reel_ledger::{IdentifierMap, StatusLedger};
use reel_models::{segment_index, RollKind, SegmentPatch};

use crate::error::{ReconcileError, ReconcileResult};

/// Result of one reconciliation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Whether this call mutated the filesystem or the ledger.
    pub changed: bool,
    /// Canonical artifact path, or `None` when the artifact has not been
    /// downloaded yet.
    pub file_path: Option<PathBuf>,
}

impl ReconcileOutcome {
    fn pending() -> Self {
        Self {
            changed: false,
            file_path: None,
        }
    }
}

/// Turns raw downloaded files into the paths the assembly stage expects.
///
/// Backends name their downloads after the full job id; assembly looks for a
/// deterministic per-segment filename. Reconciliation bridges the two by
/// copying (never moving, the download stays behind as backend evidence) and
/// recording the canonical path in the ledger. Every operation is idempotent,
/// so callers are free to re-run it on a timer or after a crash.
pub struct ArtifactReconciler {
    ledger: StatusLedger,
    ids: IdentifierMap,
}

impl ArtifactReconciler {
    /// Create a reconciler seeded with the default id mappings.
    pub fn new(ledger: StatusLedger) -> Self {
        Self {
            ledger,
            ids: IdentifierMap::with_defaults(),
        }
    }

    /// Create a reconciler with a caller-built id map.
    pub fn with_ids(ledger: StatusLedger, ids: IdentifierMap) -> Self {
        Self { ledger, ids }
    }

    pub fn ledger(&self) -> &StatusLedger {
        &self.ledger
    }

    /// Canonical filename assembly expects for a segment.
    pub fn canonical_path(
        &self,
        kind: RollKind,
        index: usize,
        short_id: &str,
    ) -> PathBuf {
        self.ledger.context().media_dir(kind).join(format!(
            "fetched_{}_segment_{}_{}.mp4",
            kind.as_str(),
            index,
            short_id
        ))
    }

    /// Filename the generation backend produces when an artifact is downloaded.
    pub fn backend_path(&self, kind: RollKind, full_id: &str) -> PathBuf {
        self.ledger
            .context()
            .media_dir(kind)
            .join(format!("{}_{}.mp4", kind.backend_prefix(), full_id))
    }

    /// Reconcile one segment's downloaded artifact with its canonical path.
    ///
    /// Looks up the segment's job id, resolves both id forms, and ensures the
    /// canonical file exists, copying the backend download into place when
    /// needed. The ledger's `file_path` is brought in line with whatever ends
    /// up on disk. Repeated calls after a successful reconciliation are
    /// no-ops reporting `changed: false`.
    pub fn reconcile(
        &mut self,
        kind: RollKind,
        segment_id: &str,
    ) -> ReconcileResult<ReconcileOutcome> {
        let status = self.ledger.load_or_default()?;
        let record =
            status
                .segment(kind, segment_id)
                .ok_or_else(|| ReconcileError::SegmentNotFound {
                    stream: kind,
                    segment_id: segment_id.to_string(),
                })?;
        if record.prompt_id.is_empty() {
            return Err(ReconcileError::MissingPromptId(segment_id.to_string()));
        }
        let index = segment_index(segment_id)
            .ok_or_else(|| ReconcileError::MalformedSegmentId(segment_id.to_string()))?;

        let (short, full) = self.ids.register(&record.prompt_id)?;
        let canonical = self.canonical_path(kind, index, &short);

        if canonical.exists() {
            // Already reconciled; only the ledger may still need catching up
            let changed = self.record_path(kind, segment_id, &canonical)?;
            debug!(stream = %kind, segment = segment_id, "Canonical artifact already in place");
            return Ok(ReconcileOutcome {
                changed,
                file_path: Some(canonical),
            });
        }

        let backend = self.backend_path(kind, &full);
        if !backend.exists() {
            debug!(stream = %kind, segment = segment_id, "Artifact not downloaded yet");
            return Ok(ReconcileOutcome::pending());
        }

        if let Some(parent) = canonical.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&backend, &canonical)?;
        info!(
            stream = %kind,
            segment = segment_id,
            from = %backend.display(),
            to = %canonical.display(),
            "Artifact reconciled"
        );

        self.record_path(kind, segment_id, &canonical)?;
        Ok(ReconcileOutcome {
            changed: true,
            file_path: Some(canonical),
        })
    }

    /// Reconcile every tracked segment of a stream.
    ///
    /// Segments that cannot be reconciled (no job id yet, malformed key) are
    /// skipped with a warning rather than aborting the sweep. Returns the
    /// per-segment outcomes in segment order.
    pub fn reconcile_all(
        &mut self,
        kind: RollKind,
    ) -> ReconcileResult<Vec<(String, ReconcileOutcome)>> {
        let segment_ids: Vec<String> = self
            .ledger
            .load_or_default()?
            .stream(kind)
            .keys()
            .cloned()
            .collect();

        let mut outcomes = Vec::with_capacity(segment_ids.len());
        for segment_id in segment_ids {
            match self.reconcile(kind, &segment_id) {
                Ok(outcome) => outcomes.push((segment_id, outcome)),
                Err(
                    e @ (ReconcileError::MissingPromptId(_)
                    | ReconcileError::MalformedSegmentId(_)),
                ) => {
                    warn!(stream = %kind, segment = %segment_id, "Skipped: {}", e);
                    outcomes.push((segment_id, ReconcileOutcome::pending()));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(outcomes)
    }

    fn record_path(
        &self,
        kind: RollKind,
        segment_id: &str,
        canonical: &Path,
    ) -> ReconcileResult<bool> {
        let path = canonical.to_string_lossy().into_owned();
        Ok(self
            .ledger
            .update_segment(kind, segment_id, SegmentPatch::new().file_path(path))?)
    }
}
