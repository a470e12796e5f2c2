//! Persistent status ledger for generation jobs.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use reel_models::{ContentStatus, RollKind, SegmentPatch, SegmentStatus};

use crate::error::{LedgerError, LedgerResult};
use crate::idmap::IdentifierMap;
use crate::project::ProjectContext;

/// Durable, idempotent store of per-segment generation state.
///
/// One ledger file per project. Writes are atomic (temp file + rename), so a
/// crash mid-write never leaves a truncated ledger visible to other readers.
/// Concurrent writers are last-writer-wins; callers needing stronger
/// guarantees must serialize access externally.
#[derive(Debug, Clone)]
pub struct StatusLedger {
    ctx: ProjectContext,
}

impl StatusLedger {
    pub fn new(ctx: ProjectContext) -> Self {
        Self { ctx }
    }

    /// Path of the underlying ledger file.
    pub fn path(&self) -> PathBuf {
        self.ctx.ledger_path()
    }

    /// Project context the ledger belongs to.
    pub fn context(&self) -> &ProjectContext {
        &self.ctx
    }

    /// Load the ledger, failing with `NotFound` when no ledger exists yet.
    pub fn load(&self) -> LedgerResult<ContentStatus> {
        let path = self.path();
        if !path.exists() {
            return Err(LedgerError::NotFound(path));
        }
        let data = fs::read_to_string(&path)?;
        let status: ContentStatus = serde_json::from_str(&data)?;
        Ok(status)
    }

    /// Load the ledger, or an empty one when the file does not exist yet.
    pub fn load_or_default(&self) -> LedgerResult<ContentStatus> {
        match self.load() {
            Ok(status) => Ok(status),
            Err(LedgerError::NotFound(_)) => Ok(ContentStatus::default()),
            Err(e) => Err(e),
        }
    }

    /// Overwrite the ledger file atomically.
    pub fn save(&self, status: &ContentStatus) -> LedgerResult<()> {
        let path = self.path();
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&dir)?;

        // Temp file must live in the destination directory so the rename
        // stays on one filesystem and is atomic.
        let mut tmp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, status)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path)?;

        debug!(path = %path.display(), "Ledger saved");
        Ok(())
    }

    /// Merge a partial update into one segment record.
    ///
    /// Creates the record when the segment is not tracked yet. Returns
    /// whether anything actually changed; unchanged updates skip the write
    /// entirely.
    pub fn update_segment(
        &self,
        kind: RollKind,
        segment_id: &str,
        patch: SegmentPatch,
    ) -> LedgerResult<bool> {
        let mut status = self.load_or_default()?;

        // A file path may only enter the ledger if it exists on disk and is
        // not already claimed by another segment.
        if let Some(path) = &patch.file_path {
            if !path.is_empty() {
                let candidate = Path::new(path);
                if !candidate.exists() {
                    return Err(LedgerError::FileMissing(candidate.to_path_buf()));
                }
                for stream in RollKind::all() {
                    for (other_id, record) in status.stream(stream) {
                        if record.file_path == *path
                            && !(stream == kind && other_id == segment_id)
                        {
                            return Err(LedgerError::DuplicateFilePath {
                                path: path.clone(),
                                segment_id: other_id.clone(),
                            });
                        }
                    }
                }
            }
        }

        let record = status.stream_mut(kind).entry(segment_id.to_string()).or_default();

        if let Some(next) = patch.status {
            if !record.status.can_transition_to(next) {
                return Err(LedgerError::InvalidTransition {
                    from: record.status,
                    to: next,
                });
            }
        }

        let changed = patch.apply(record);
        if changed {
            debug!(stream = %kind, segment = segment_id, "Segment updated");
            self.save(&status)?;
        }
        Ok(changed)
    }

    /// Write the pre-provisioned default ids into a stream's segments.
    ///
    /// Idempotent: a segment whose `prompt_id` already equals the target is
    /// left alone. Returns the `(segment_id, full_id)` pairs that were
    /// applied (or confirmed).
    pub fn seed_default_ids(&self, kind: RollKind) -> LedgerResult<Vec<(String, String)>> {
        let pairs = IdentifierMap::seed_defaults(kind);
        let mut seeded = Vec::with_capacity(pairs.len());

        for (segment_id, full_id) in pairs {
            let current = self
                .load_or_default()?
                .segment(kind, &segment_id)
                .map(|r| r.status)
                .unwrap_or_default();

            let mut patch = SegmentPatch::new().prompt_id(&full_id);
            // Fresh segments move to assigned; segments already further along
            // keep their status.
            if current == SegmentStatus::Unassigned {
                patch = patch.status(SegmentStatus::Assigned);
            }

            if self.update_segment(kind, &segment_id, patch)? {
                info!(stream = %kind, segment = %segment_id, "Seeded default id");
            }
            seeded.push((segment_id, full_id));
        }
        Ok(seeded)
    }

    /// Rewrite relative `file_path` values to absolute paths under the
    /// stream's media directory, skipping files that do not exist.
    ///
    /// Returns whether anything changed.
    pub fn normalize_paths(&self, kind: RollKind) -> LedgerResult<bool> {
        let mut status = self.load()?;
        let media_dir = self.ctx.media_dir(kind);
        let mut modified = false;

        for (segment_id, record) in status.stream_mut(kind) {
            if record.file_path.is_empty() || Path::new(&record.file_path).is_absolute() {
                continue;
            }
            let absolute = media_dir.join(&record.file_path);
            if absolute.exists() {
                record.file_path = absolute.to_string_lossy().into_owned();
                debug!(segment = %segment_id, path = %record.file_path, "Normalized path");
                modified = true;
            } else {
                warn!(segment = %segment_id, path = %absolute.display(), "File not found, path left as-is");
            }
        }

        if modified {
            self.save(&status)?;
        }
        Ok(modified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::{segment_id, SegmentRecord};
    use tempfile::TempDir;

    fn ledger(tmp: &TempDir) -> StatusLedger {
        StatusLedger::new(ProjectContext::new(tmp.path(), "test_project"))
    }

    #[test]
    fn test_load_missing_ledger() {
        let tmp = TempDir::new().unwrap();
        let ledger = ledger(&tmp);

        assert!(matches!(ledger.load(), Err(LedgerError::NotFound(_))));
        let status = ledger.load_or_default().unwrap();
        assert!(status.aroll.is_empty());
        assert!(status.broll.is_empty());
    }

    #[test]
    fn test_save_load_round_trip() {
        let tmp = TempDir::new().unwrap();
        let ledger = ledger(&tmp);

        let mut status = ContentStatus::default();
        status.aroll.insert(
            segment_id(0),
            SegmentRecord {
                prompt_id: "5169ef5a".into(),
                status: SegmentStatus::Processing,
                ..Default::default()
            },
        );
        ledger.save(&status).unwrap();

        assert_eq!(ledger.load().unwrap(), status);
    }

    #[test]
    fn test_round_trip_preserves_unknown_fields() {
        let tmp = TempDir::new().unwrap();
        let ledger = ledger(&tmp);
        fs::create_dir_all(ledger.path().parent().unwrap()).unwrap();
        fs::write(
            ledger.path(),
            r#"{"aroll":{"segment_0":{"prompt_id":"x","status":"assigned","file_path":"","content_type":"video"}},"broll":{}}"#,
        )
        .unwrap();

        let status = ledger.load().unwrap();
        ledger.save(&status).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(ledger.path()).unwrap()).unwrap();
        assert_eq!(raw["aroll"]["segment_0"]["content_type"], "video");
    }

    #[test]
    fn test_interrupted_write_never_corrupts_ledger() {
        let tmp = TempDir::new().unwrap();
        let ledger = ledger(&tmp);

        let mut status = ContentStatus::default();
        status.aroll.insert(
            segment_id(0),
            SegmentRecord {
                prompt_id: "5169ef5a".into(),
                ..Default::default()
            },
        );
        ledger.save(&status).unwrap();

        // A crash mid-write leaves a half-written temp file next to the
        // ledger, never a half-written ledger.
        let stray = ledger.path().parent().unwrap().join(".tmp_partial_write");
        fs::write(&stray, r#"{"aroll": {"segment_0": {"prompt_"#).unwrap();
        assert_eq!(ledger.load().unwrap(), status);

        // The next save still lands atomically
        status.aroll.get_mut("segment_0").unwrap().status = SegmentStatus::Processing;
        ledger.save(&status).unwrap();
        assert_eq!(ledger.load().unwrap(), status);

        // A failed rename surfaces as an error instead of clobbering anything
        let blocked = StatusLedger::new(ProjectContext::new(tmp.path(), "blocked"));
        fs::create_dir_all(blocked.path()).unwrap();
        assert!(blocked.save(&status).is_err());
    }

    #[test]
    fn test_update_segment_reports_change() {
        let tmp = TempDir::new().unwrap();
        let ledger = ledger(&tmp);

        let patch = SegmentPatch::new()
            .prompt_id("5169ef5a")
            .status(SegmentStatus::Assigned);
        assert!(ledger
            .update_segment(RollKind::Aroll, "segment_0", patch.clone())
            .unwrap());

        // Identical patch is a no-op
        assert!(!ledger
            .update_segment(RollKind::Aroll, "segment_0", patch)
            .unwrap());
    }

    #[test]
    fn test_update_rejects_missing_file() {
        let tmp = TempDir::new().unwrap();
        let ledger = ledger(&tmp);

        let patch = SegmentPatch::new().file_path("/does/not/exist.mp4");
        assert!(matches!(
            ledger.update_segment(RollKind::Aroll, "segment_0", patch),
            Err(LedgerError::FileMissing(_))
        ));
    }

    #[test]
    fn test_update_rejects_duplicate_file_path() {
        let tmp = TempDir::new().unwrap();
        let ledger = ledger(&tmp);

        let file = tmp.path().join("artifact.mp4");
        fs::write(&file, b"x").unwrap();
        let path = file.to_string_lossy().into_owned();

        ledger
            .update_segment(RollKind::Aroll, "segment_0", SegmentPatch::new().file_path(&path))
            .unwrap();

        assert!(matches!(
            ledger.update_segment(RollKind::Aroll, "segment_1", SegmentPatch::new().file_path(&path)),
            Err(LedgerError::DuplicateFilePath { .. })
        ));
    }

    #[test]
    fn test_update_rejects_backwards_transition() {
        let tmp = TempDir::new().unwrap();
        let ledger = ledger(&tmp);

        ledger
            .update_segment(
                RollKind::Broll,
                "segment_0",
                SegmentPatch::new().status(SegmentStatus::Complete),
            )
            .unwrap();

        assert!(matches!(
            ledger.update_segment(
                RollKind::Broll,
                "segment_0",
                SegmentPatch::new().status(SegmentStatus::Processing),
            ),
            Err(LedgerError::InvalidTransition { .. })
        ));

        // Failed segments may be retried
        ledger
            .update_segment(
                RollKind::Broll,
                "segment_1",
                SegmentPatch::new().status(SegmentStatus::Failed),
            )
            .unwrap();
        ledger
            .update_segment(
                RollKind::Broll,
                "segment_1",
                SegmentPatch::new().status(SegmentStatus::Assigned),
            )
            .unwrap();
    }

    #[test]
    fn test_seed_default_ids_idempotent() {
        let tmp = TempDir::new().unwrap();
        let ledger = ledger(&tmp);

        let seeded = ledger.seed_default_ids(RollKind::Aroll).unwrap();
        assert_eq!(seeded.len(), 4);

        let status = ledger.load().unwrap();
        assert_eq!(
            status.aroll["segment_0"].prompt_id,
            "5169ef5a328149a8b13c365ee7060106"
        );
        assert_eq!(status.aroll["segment_0"].status, SegmentStatus::Assigned);

        // Re-seeding changes nothing
        ledger.seed_default_ids(RollKind::Aroll).unwrap();
        assert_eq!(ledger.load().unwrap(), status);

        // B-Roll has no pre-provisioned ids
        assert!(ledger.seed_default_ids(RollKind::Broll).unwrap().is_empty());
    }

    #[test]
    fn test_normalize_paths() {
        let tmp = TempDir::new().unwrap();
        let ledger = ledger(&tmp);
        let ctx = ledger.context().clone();
        ctx.scaffold().unwrap();

        let media_dir = ctx.media_dir(RollKind::Aroll);
        fs::write(media_dir.join("clip.mp4"), b"x").unwrap();

        let mut status = ContentStatus::default();
        status.aroll.insert(
            segment_id(0),
            SegmentRecord {
                file_path: "clip.mp4".into(),
                ..Default::default()
            },
        );
        status.aroll.insert(
            segment_id(1),
            SegmentRecord {
                file_path: "missing.mp4".into(),
                ..Default::default()
            },
        );
        ledger.save(&status).unwrap();

        assert!(ledger.normalize_paths(RollKind::Aroll).unwrap());

        let status = ledger.load().unwrap();
        assert_eq!(
            status.aroll["segment_0"].file_path,
            media_dir.join("clip.mp4").to_string_lossy()
        );
        // Missing file is left untouched
        assert_eq!(status.aroll["segment_1"].file_path, "missing.mp4");

        // Second pass is a no-op
        assert!(!ledger.normalize_paths(RollKind::Aroll).unwrap());
    }
}
