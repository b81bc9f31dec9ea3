use std::fs;
use std::io::Write;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use crate::core::error::{ErrorKind, Result};
use crate::core::stats::{FailedPersist, PersistState, PersistenceStatus};
use crate::core::types::Record;
use crate::storage::file_lock::FileLock;
use crate::storage::layout::StorageLayout;
use crate::storage::snapshot::PersistedState;

/// Result of reading the primary file at startup.
#[derive(Debug, Clone, Default)]
pub struct LoadedState {
    pub records: Vec<Record>,
    pub last_saved: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Tracker {
    state: PersistState,
    last_saved: Option<DateTime<Utc>>,
    successful_persists: u64,
    failed_persists: u64,
    backups_written: u64,
    last_failure: Option<FailedPersist>,
    fallback: Option<Arc<PersistedState>>,  // snapshot whose write failed
}

/// Crash-safe save/restore of the store image.
///
/// A cycle serializes the snapshot, writes it to a temp file next to the
/// primary file, fsyncs, and renames over the primary. Readers of the primary
/// path see either the previous or the new file, never a partial one.
pub struct PersistenceManager {
    layout: StorageLayout,
    backup_every: u32,
    cycle: Mutex<()>,  // One cycle at a time in-process
    tracker: Mutex<Tracker>,
}

impl PersistenceManager {
    pub fn new(layout: StorageLayout, backup_every: u32) -> Self {
        PersistenceManager {
            layout,
            backup_every,
            cycle: Mutex::new(()),
            tracker: Mutex::new(Tracker::default()),
        }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Never fails: a missing, unreadable or malformed file yields an empty state.
    pub fn load_on_startup(&self) -> LoadedState {
        let path = self.layout.primary_path();
        match PersistedState::load(path) {
            Ok(Some(state)) => {
                tracing::info!(
                    path = %path.display(),
                    records = state.records.len(),
                    last_saved = %state.last_saved,
                    "loaded persisted records"
                );
                self.tracker.lock().last_saved = Some(state.last_saved);
                LoadedState {
                    records: state.records,
                    last_saved: Some(state.last_saved),
                }
            }
            Ok(None) => {
                tracing::warn!(path = %path.display(), "no persisted records found, starting empty");
                LoadedState::default()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to load persisted records, starting empty");
                LoadedState::default()
            }
        }
    }

    /// Durably write the snapshot produced by `capture`. The capture runs once
    /// the cycle lock is held, so cycles never write an older image over a
    /// newer one. On failure the primary file is untouched and the snapshot
    /// is kept in the fallback slot.
    pub fn persist<F>(&self, capture: F) -> Result<DateTime<Utc>>
    where
        F: FnOnce() -> PersistedState,
    {
        let _cycle = self.cycle.lock();
        let snapshot = capture();
        let saved_at = snapshot.last_saved;
        let record_count = snapshot.records.len();

        match self.write_cycle(&snapshot) {
            Ok(()) => {
                let successes = {
                    let mut tracker = self.tracker.lock();
                    tracker.state = PersistState::Idle;
                    tracker.last_saved = Some(saved_at);
                    tracker.successful_persists += 1;
                    tracker.last_failure = None;
                    tracker.fallback = None;
                    tracker.successful_persists
                };
                tracing::debug!(
                    path = %self.layout.primary_path.display(),
                    records = record_count,
                    "persisted records"
                );

                if self.backup_due(successes) {
                    match self.write_backup() {
                        Ok(()) => self.tracker.lock().backups_written += 1,
                        Err(e) => tracing::warn!(
                            path = %self.layout.backup_path.display(),
                            error = %e,
                            "backup failed"
                        ),
                    }
                }
                Ok(saved_at)
            }
            Err(e) => {
                let err = e.with_kind(ErrorKind::PersistFailure);
                tracing::warn!(
                    path = %self.layout.primary_path.display(),
                    records = record_count,
                    error = %err,
                    "persist failed, previous file left in place"
                );
                {
                    let mut tracker = self.tracker.lock();
                    tracker.failed_persists += 1;
                    tracker.last_failure = Some(FailedPersist {
                        failed_at: Utc::now(),
                        error: err.context.clone(),
                        record_count,
                    });
                    tracker.fallback = Some(Arc::new(snapshot));
                    tracker.state = PersistState::Idle;
                }
                Err(err)
            }
        }
    }

    fn write_cycle(&self, snapshot: &PersistedState) -> Result<()> {
        let outcome = self.try_write(snapshot);
        if outcome.is_err() {
            self.set_state(PersistState::Failed);
        }
        outcome
    }

    fn try_write(&self, snapshot: &PersistedState) -> Result<()> {
        self.set_state(PersistState::Serializing);
        let bytes = snapshot.to_json()?;

        self.set_state(PersistState::WritingTemp);
        self.layout.ensure_primary_dir()?;
        let _lock = FileLock::acquire(&self.layout)?;

        // Dropping the temp file on any error below deletes it.
        let mut temp = tempfile::Builder::new()
            .prefix(&self.layout.temp_prefix())
            .suffix(".tmp")
            .tempfile_in(&self.layout.primary_dir)?;
        temp.write_all(&bytes)?;
        set_primary_permissions(temp.as_file(), &self.layout)?;
        temp.as_file().sync_all()?;

        self.set_state(PersistState::Renaming);
        temp.persist(&self.layout.primary_path)?;
        sync_dir(&self.layout);
        Ok(())
    }

    fn backup_due(&self, successes: u64) -> bool {
        self.backup_every > 0 && successes % self.backup_every as u64 == 0
    }

    fn write_backup(&self) -> Result<()> {
        self.layout
            .ensure_backup_dir()
            .and_then(|_| {
                fs::copy(&self.layout.primary_path, &self.layout.backup_path)?;
                Ok(())
            })
            .map_err(|e| e.with_kind(ErrorKind::BackupFailure))
    }

    fn set_state(&self, state: PersistState) {
        self.tracker.lock().state = state;
    }

    pub fn status(&self) -> PersistenceStatus {
        let tracker = self.tracker.lock();
        PersistenceStatus {
            enabled: true,
            state: tracker.state,
            last_saved: tracker.last_saved,
            successful_persists: tracker.successful_persists,
            failed_persists: tracker.failed_persists,
            backups_written: tracker.backups_written,
            last_failure: tracker.last_failure.clone(),
        }
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.tracker.lock().last_saved
    }

    /// The last snapshot that failed to reach disk, if the newest write failed.
    pub fn fallback_snapshot(&self) -> Option<Arc<PersistedState>> {
        self.tracker.lock().fallback.clone()
    }
}

// Make the rename itself durable. Best-effort: not every platform allows
// opening a directory for sync.
fn sync_dir(layout: &StorageLayout) {
    #[cfg(unix)]
    {
        if let Ok(dir) = fs::File::open(&layout.primary_dir) {
            let _ = dir.sync_all();
        }
    }
    #[cfg(not(unix))]
    let _ = layout;
}

// Temp files are created 0600. Carry over the current primary's mode, or
// use 0644 for a first write, so the rename does not narrow access.
#[cfg(unix)]
fn set_primary_permissions(file: &fs::File, layout: &StorageLayout) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let permissions = match fs::metadata(&layout.primary_path) {
        Ok(meta) if meta.is_file() => meta.permissions(),
        _ => fs::Permissions::from_mode(0o644),
    };
    file.set_permissions(permissions)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_primary_permissions(_file: &fs::File, _layout: &StorageLayout) -> Result<()> {
    Ok(())
}

impl std::fmt::Debug for PersistenceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceManager")
            .field("primary_path", &self.layout.primary_path)
            .field("backup_every", &self.backup_every)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use crate::core::stats::QualityMetrics;
    use crate::core::types::RecordContent;

    fn record(id: &str) -> Record {
        Record {
            id: id.to_string(),
            content: RecordContent::default(),
            quality_score: 0.25,
            source: "unit".to_string(),
            metadata: Default::default(),
            stored_at: Utc::now(),
        }
    }

    fn manager(dir: &TempDir, backup_every: u32) -> PersistenceManager {
        let layout = StorageLayout::new(
            dir.path().join("nested").join("records.json"),
            dir.path().join("backups").join("records.json"),
        )
        .unwrap();
        PersistenceManager::new(layout, backup_every)
    }

    #[test]
    fn test_persist_creates_directory_and_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, 0);

        manager
            .persist(|| PersistedState::new(vec![record("a")], QualityMetrics::default()))
            .unwrap();

        let names: Vec<_> = fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".tmp"))
            .collect();
        assert!(names.is_empty(), "stray temp files: {:?}", names);

        let status = manager.status();
        assert_eq!(status.state, PersistState::Idle);
        assert_eq!(status.successful_persists, 1);
        assert!(status.last_saved.is_some());
    }

    #[test]
    fn test_backup_every_nth_persist() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, 2);
        let backup = dir.path().join("backups").join("records.json");

        manager.persist(|| PersistedState::new(vec![record("a")], QualityMetrics::default())).unwrap();
        assert!(!backup.exists());

        manager.persist(|| PersistedState::new(vec![record("a"), record("b")], QualityMetrics::default())).unwrap();
        assert!(backup.exists());
        assert_eq!(manager.status().backups_written, 1);

        let copy = PersistedState::load(&backup).unwrap().unwrap();
        assert_eq!(copy.records.len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_primary_keeps_readable_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, 0);
        let primary = dir.path().join("nested").join("records.json");
        let mode = |path: &std::path::Path| fs::metadata(path).unwrap().permissions().mode() & 0o777;

        manager.persist(|| PersistedState::new(vec![record("a")], QualityMetrics::default())).unwrap();
        assert_eq!(mode(&primary), 0o644);

        fs::set_permissions(&primary, fs::Permissions::from_mode(0o640)).unwrap();
        manager.persist(|| PersistedState::new(vec![record("b")], QualityMetrics::default())).unwrap();
        assert_eq!(mode(&primary), 0o640);
    }

    #[test]
    fn test_load_missing_and_corrupt_start_empty() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, 0);
        assert!(manager.load_on_startup().records.is_empty());

        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("records.json"), b"not json").unwrap();
        let loaded = manager.load_on_startup();
        assert!(loaded.records.is_empty());
        assert!(loaded.last_saved.is_none());
    }
}
