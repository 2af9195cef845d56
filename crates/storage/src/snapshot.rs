//! Snapshot ledger: the whole issued set in one JSON file
//!
//! The file is a JSON array of numbers (`[100, 4821, 77]`). Every
//! reservation reads the file, checks membership, appends and rewrites it.
//!
//! ## Invariants
//!
//! - load-check-append-save runs inside one critical section per handle
//! - saves are atomic (temp file + fsync + rename), so a crash leaves either
//!   the old or the new snapshot, never a torn one
//! - one handle per file across processes, enforced by an `fs2` lock on a
//!   sibling `.lock` file held for the handle's lifetime

use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uniqnum_core::{Error, Ledger, Result, Value, ValueSpace};

/// File-backed ledger that rewrites the full issued set on each reservation
pub struct SnapshotLedger {
    path: PathBuf,
    space: ValueSpace,
    /// Serializes load-check-append-save
    write_lock: Mutex<()>,
    /// Exclusive filesystem lock, released when the ledger is dropped
    _lock_file: File,
}

impl SnapshotLedger {
    /// Open (or create on first reservation) the snapshot at `path`
    ///
    /// The existing snapshot, if any, is validated eagerly so a corrupt
    /// ledger is reported here rather than on the first request.
    ///
    /// # Errors
    ///
    /// `StorageUnavailable` if the lock is held by another handle, the
    /// directory cannot be created, or the snapshot is unreadable or holds
    /// values outside `space`.
    pub fn open(path: impl AsRef<Path>, space: ValueSpace) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.file_name().is_none() {
            return Err(Error::storage(format!(
                "'{}' does not name a ledger file",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let lock_path = sibling(&path, ".lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)
            .map_err(|e| Error::storage(format!("failed to open lock file: {}", e)))?;
        fs2::FileExt::try_lock_exclusive(&lock_file).map_err(|_| {
            Error::storage(format!(
                "ledger at '{}' is already in use by another process",
                path.display()
            ))
        })?;

        // Clean up a temp file left by a crash mid-save
        let temp_path = sibling(&path, ".tmp");
        if temp_path.exists() {
            warn!(target: "uniqnum::ledger", path = %temp_path.display(), "Removing stale temp file");
            remove_temp(&temp_path);
        }

        let ledger = Self {
            path,
            space,
            write_lock: Mutex::new(()),
            _lock_file: lock_file,
        };
        let issued = ledger.read_snapshot()?;

        info!(
            target: "uniqnum::ledger",
            path = %ledger.path.display(),
            space = %ledger.space,
            issued = issued.len(),
            "Snapshot ledger opened"
        );
        Ok(ledger)
    }

    /// Path of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_snapshot(&self) -> Result<HashSet<Value>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => {
                return Err(Error::storage(format!(
                    "failed to read ledger '{}': {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let numbers: Vec<serde_json::Number> = serde_json::from_slice(&bytes).map_err(|e| {
            Error::storage(format!("ledger '{}' is corrupt: {}", self.path.display(), e))
        })?;

        let mut issued = HashSet::with_capacity(numbers.len());
        for n in &numbers {
            let value = self
                .space
                .value_from_json(n)
                .and_then(|v| self.space.check(&v).map(|_| v))
                .map_err(|e| {
                    Error::storage(format!(
                        "ledger '{}' does not match {}: {}",
                        self.path.display(),
                        self.space,
                        e
                    ))
                })?;
            if !issued.insert(value) {
                warn!(target: "uniqnum::ledger", value = %value, "Duplicate entry in snapshot");
            }
        }
        Ok(issued)
    }

    /// Write the snapshot atomically
    ///
    /// 1. Write to temp file
    /// 2. Sync temp file
    /// 3. Rename temp to final (atomic on POSIX)
    ///
    /// If any step fails, the temp file is cleaned up and the previous
    /// snapshot is left in place.
    fn write_snapshot(&self, issued: &HashSet<Value>) -> Result<()> {
        let mut values: Vec<&Value> = issued.iter().collect();
        values.sort();
        let bytes = serde_json::to_vec(&values)
            .map_err(|e| Error::storage(format!("failed to encode ledger: {}", e)))?;

        let temp_path = sibling(&self.path, ".tmp");
        let result = write_synced(&temp_path, &bytes).and_then(|_| fs::rename(&temp_path, &self.path));
        if let Err(e) = result {
            warn!(
                target: "uniqnum::ledger",
                temp_path = %temp_path.display(),
                error = %e,
                "Snapshot write failed, cleaning up temp file"
            );
            remove_temp(&temp_path);
            return Err(Error::storage(format!(
                "failed to write ledger '{}': {}",
                self.path.display(),
                e
            )));
        }
        Ok(())
    }
}

impl Ledger for SnapshotLedger {
    fn space(&self) -> &ValueSpace {
        &self.space
    }

    fn load(&self) -> Result<HashSet<Value>> {
        self.read_snapshot()
    }

    fn try_reserve(&self, value: &Value) -> Result<bool> {
        self.space.check(value)?;

        let _guard = self.write_lock.lock();
        let mut issued = self.read_snapshot()?;
        if !issued.insert(*value) {
            debug!(target: "uniqnum::ledger", value = %value, "Collision");
            return Ok(false);
        }
        self.write_snapshot(&issued)?;

        debug!(target: "uniqnum::ledger", value = %value, issued = issued.len(), "Reserved");
        Ok(true)
    }

    fn count(&self) -> Result<u64> {
        Ok(self.read_snapshot()?.len() as u64)
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn remove_temp(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            target: "uniqnum::ledger",
            path = %path.display(),
            error = %e,
            "Failed to remove temp file"
        ),
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn small_space() -> ValueSpace {
        ValueSpace::integer(100, 104).unwrap()
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let ledger = SnapshotLedger::open(dir.path().join("used_numbers.json"), small_space()).unwrap();
        assert!(ledger.load().unwrap().is_empty());
        assert_eq!(ledger.count().unwrap(), 0);
        assert!(!ledger.path().exists());
    }

    #[test]
    fn test_reserve_writes_json_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("used_numbers.json");
        let ledger = SnapshotLedger::open(&path, small_space()).unwrap();

        assert!(ledger.try_reserve(&Value::Integer(103)).unwrap());
        assert!(ledger.try_reserve(&Value::Integer(101)).unwrap());

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "[101,103]");
    }

    #[test]
    fn test_duplicate_reserve_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("used_numbers.json");
        let ledger = SnapshotLedger::open(&path, small_space()).unwrap();

        assert!(ledger.try_reserve(&Value::Integer(100)).unwrap());
        let before = fs::metadata(&path).unwrap().modified().unwrap();
        assert!(!ledger.try_reserve(&Value::Integer(100)).unwrap());
        let after = fs::metadata(&path).unwrap().modified().unwrap();

        assert_eq!(before, after);
        assert_eq!(ledger.count().unwrap(), 1);
    }

    #[test]
    fn test_reads_legacy_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("used_numbers.json");
        fs::write(&path, "[104, 100, 102]").unwrap();

        let ledger = SnapshotLedger::open(&path, small_space()).unwrap();
        let issued = ledger.load().unwrap();
        assert_eq!(issued.len(), 3);
        assert!(issued.contains(&Value::Integer(102)));
        assert!(!ledger.try_reserve(&Value::Integer(104)).unwrap());
    }

    #[test]
    fn test_corrupt_snapshot_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("used_numbers.json");
        fs::write(&path, "[100, 101").unwrap();

        let err = SnapshotLedger::open(&path, small_space()).err().unwrap();
        assert!(matches!(err, Error::StorageUnavailable(_)));
    }

    #[test]
    fn test_corruption_after_open_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("used_numbers.json");
        let ledger = SnapshotLedger::open(&path, small_space()).unwrap();
        ledger.try_reserve(&Value::Integer(100)).unwrap();

        fs::write(&path, "not json").unwrap();
        assert!(matches!(ledger.load(), Err(Error::StorageUnavailable(_))));
        assert!(matches!(ledger.count(), Err(Error::StorageUnavailable(_))));
        assert!(matches!(
            ledger.try_reserve(&Value::Integer(101)),
            Err(Error::StorageUnavailable(_))
        ));
        // The corrupt file was not replaced by a fresh snapshot
        assert_eq!(fs::read_to_string(&path).unwrap(), "not json");
    }

    #[test]
    fn test_out_of_space_entry_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("used_numbers.json");
        fs::write(&path, "[100, 99999]").unwrap();

        let err = SnapshotLedger::open(&path, small_space()).err().unwrap();
        assert!(matches!(err, Error::StorageUnavailable(_)));
    }

    #[test]
    fn test_reserve_rejects_foreign_value() {
        let dir = TempDir::new().unwrap();
        let ledger = SnapshotLedger::open(dir.path().join("l.json"), small_space()).unwrap();
        let err = ledger.try_reserve(&Value::Integer(7)).unwrap_err();
        assert!(matches!(err, Error::InvalidValue(_)));
        assert_eq!(ledger.count().unwrap(), 0);
    }

    #[test]
    fn test_second_handle_is_rejected_until_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("used_numbers.json");

        let first = SnapshotLedger::open(&path, small_space()).unwrap();
        let err = SnapshotLedger::open(&path, small_space()).err().unwrap();
        assert!(err.to_string().contains("already in use"));

        drop(first);
        assert!(SnapshotLedger::open(&path, small_space()).is_ok());
    }

    #[test]
    fn test_stale_temp_file_is_removed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("used_numbers.json");
        let temp = dir.path().join("used_numbers.json.tmp");
        fs::write(&temp, "[10").unwrap();

        let _ledger = SnapshotLedger::open(&path, small_space()).unwrap();
        assert!(!temp.exists());
    }

    #[test]
    fn test_failed_save_keeps_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("used_numbers.json");
        let ledger = SnapshotLedger::open(&path, small_space()).unwrap();
        assert!(ledger.try_reserve(&Value::Integer(100)).unwrap());
        let before = fs::read_to_string(&path).unwrap();

        // A directory in the temp file's place makes the save fail
        let temp = dir.path().join("used_numbers.json.tmp");
        fs::create_dir(&temp).unwrap();

        let err = ledger.try_reserve(&Value::Integer(101)).unwrap_err();
        assert!(matches!(err, Error::StorageUnavailable(_)));
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
        assert_eq!(ledger.count().unwrap(), 1);
        assert!(!ledger.load().unwrap().contains(&Value::Integer(101)));

        fs::remove_dir(&temp).unwrap();
        assert!(ledger.try_reserve(&Value::Integer(101)).unwrap());
    }

    #[test]
    fn test_unremovable_stale_temp_does_not_block_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("used_numbers.json");
        fs::create_dir(dir.path().join("used_numbers.json.tmp")).unwrap();

        let ledger = SnapshotLedger::open(&path, small_space()).unwrap();
        assert_eq!(ledger.count().unwrap(), 0);
    }

    #[test]
    fn test_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("ledger.json");
        let ledger = SnapshotLedger::open(&path, small_space()).unwrap();
        assert!(ledger.try_reserve(&Value::Integer(100)).unwrap());
        assert!(path.exists());
    }

    #[test]
    fn test_decimal_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("decimals.json");
        let space = ValueSpace::decimal(0.0, 10.0, 2).unwrap();
        let ledger = SnapshotLedger::open(&path, space).unwrap();

        let v = space.value_from_units(314);
        assert!(ledger.try_reserve(&v).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "[3.14]");
        assert!(!ledger.try_reserve(&v).unwrap());
    }
}
