//! SQLite ledger: uniqueness enforced by the storage engine
//!
//! One row per issued value:
//!
//! ```text
//! issued_values(id, space, number, created_at)
//!   UNIQUE(space, number)
//! ```
//!
//! `space` holds the kind name, so the integer and decimal ledgers can share
//! a database file. A reservation is a single `INSERT`; a constraint
//! violation means the value was already issued. Every operation opens its
//! own connection, so concurrent callers never share a handle and no lock
//! is taken outside SQLite.
//!
//! Databases written by earlier releases keep issued values in a single
//! `random_numbers(number REAL UNIQUE)` table with no kind column. Open
//! copies every row that belongs to the ledger's space into
//! `issued_values`; the legacy table is left untouched.

use rusqlite::{ffi, params, Connection, ErrorCode, OptionalExtension};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use uniqnum_core::{Error, Ledger, Result, Value, ValueSpace};

/// How long a connection waits on a locked database before failing
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Table used by earlier releases, shared by every kind
const LEGACY_TABLE: &str = "random_numbers";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS issued_values (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        space TEXT NOT NULL,
        number REAL NOT NULL,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (space, number)
    );
";

/// Table-backed ledger relying on a `UNIQUE` constraint
#[derive(Debug)]
pub struct SqliteLedger {
    path: PathBuf,
    space: ValueSpace,
    busy_timeout: Duration,
}

impl SqliteLedger {
    /// Open the database at `path` with the default busy timeout
    pub fn open(path: impl AsRef<Path>, space: ValueSpace) -> Result<Self> {
        Self::open_with_timeout(path, space, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open the database at `path`, creating the file and table if needed
    ///
    /// Switches the database to WAL journal mode so readers do not block the
    /// single writer.
    ///
    /// # Errors
    ///
    /// `StorageUnavailable` if the file cannot be opened or the schema
    /// cannot be created.
    pub fn open_with_timeout(
        path: impl AsRef<Path>,
        space: ValueSpace,
        busy_timeout: Duration,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let ledger = Self {
            path,
            space,
            busy_timeout,
        };
        let mut conn = ledger.connect()?;
        conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get::<_, String>(0))
            .map_err(|e| storage_error("failed to enable WAL", e))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| storage_error("failed to create schema", e))?;
        let imported = ledger.import_legacy(&mut conn)?;

        info!(
            target: "uniqnum::ledger",
            path = %ledger.path.display(),
            space = %ledger.space,
            imported,
            "SQLite ledger opened"
        );
        Ok(ledger)
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path).map_err(|e| {
            storage_error(&format!("failed to open '{}'", self.path.display()), e)
        })?;
        conn.busy_timeout(self.busy_timeout)
            .map_err(|e| storage_error("failed to set busy timeout", e))?;
        Ok(conn)
    }

    /// Copy in-space rows of the legacy table into `issued_values`
    ///
    /// Idempotent: rows already present are ignored. Rows that do not decode
    /// to a value of this space (fractional numbers for an integer space,
    /// anything out of bounds) belong to another ledger and are skipped.
    fn import_legacy(&self, conn: &mut Connection) -> Result<usize> {
        let exists = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![LEGACY_TABLE],
                |_| Ok(()),
            )
            .optional()
            .map_err(|e| storage_error("failed to inspect schema", e))?
            .is_some();
        if !exists {
            return Ok(0);
        }

        let tx = conn
            .transaction()
            .map_err(|e| storage_error("failed to begin import", e))?;
        let numbers: Vec<f64> = {
            let mut stmt = tx
                .prepare(&format!(
                    "SELECT number FROM {} WHERE number IS NOT NULL",
                    LEGACY_TABLE
                ))
                .map_err(|e| storage_error("failed to read legacy table", e))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, f64>(0))
                .map_err(|e| storage_error("failed to read legacy table", e))?;
            rows.collect::<rusqlite::Result<Vec<f64>>>()
                .map_err(|e| storage_error("failed to read legacy row", e))?
        };

        let mut imported = 0;
        for number in numbers {
            let value = match self.space.value_from_f64(number) {
                Ok(v) if self.space.contains(&v) => v,
                _ => continue,
            };
            imported += tx
                .execute(
                    "INSERT OR IGNORE INTO issued_values (space, number) VALUES (?1, ?2)",
                    params![self.label(), value.as_f64()],
                )
                .map_err(|e| storage_error("failed to import legacy row", e))?;
        }
        tx.commit()
            .map_err(|e| storage_error("failed to commit import", e))?;

        if imported > 0 {
            info!(
                target: "uniqnum::ledger",
                table = LEGACY_TABLE,
                imported,
                "Imported values from legacy table"
            );
        }
        Ok(imported)
    }

    fn label(&self) -> &'static str {
        self.space.kind().as_str()
    }

    fn bounds(&self) -> (f64, f64) {
        (
            self.space.lower_value().as_f64(),
            self.space.upper_value().as_f64(),
        )
    }
}

impl Ledger for SqliteLedger {
    fn space(&self) -> &ValueSpace {
        &self.space
    }

    fn load(&self) -> Result<HashSet<Value>> {
        let conn = self.connect()?;
        let (lo, hi) = self.bounds();
        let mut stmt = conn
            .prepare("SELECT number FROM issued_values WHERE space = ?1 AND number BETWEEN ?2 AND ?3")
            .map_err(|e| storage_error("failed to prepare load", e))?;
        let rows = stmt
            .query_map(params![self.label(), lo, hi], |row| row.get::<_, f64>(0))
            .map_err(|e| storage_error("failed to load ledger", e))?;

        let mut issued = HashSet::new();
        for row in rows {
            let number = row.map_err(|e| storage_error("failed to read row", e))?;
            let value = self.space.value_from_f64(number).map_err(|e| {
                Error::storage(format!("ledger row {} is not a valid value: {}", number, e))
            })?;
            issued.insert(value);
        }
        Ok(issued)
    }

    fn try_reserve(&self, value: &Value) -> Result<bool> {
        self.space.check(value)?;

        let conn = self.connect()?;
        match conn.execute(
            "INSERT INTO issued_values (space, number) VALUES (?1, ?2)",
            params![self.label(), value.as_f64()],
        ) {
            Ok(_) => {
                debug!(target: "uniqnum::ledger", value = %value, "Reserved");
                Ok(true)
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation
                    && err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                debug!(target: "uniqnum::ledger", value = %value, "Collision");
                Ok(false)
            }
            Err(e) => Err(storage_error("failed to insert value", e)),
        }
    }

    fn count(&self) -> Result<u64> {
        let conn = self.connect()?;
        let (lo, hi) = self.bounds();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM issued_values WHERE space = ?1 AND number BETWEEN ?2 AND ?3",
                params![self.label(), lo, hi],
                |row| row.get(0),
            )
            .map_err(|e| storage_error("failed to count ledger", e))?;
        Ok(count as u64)
    }
}

fn storage_error(context: &str, e: rusqlite::Error) -> Error {
    Error::storage(format!("{}: {}", context, e))
}
