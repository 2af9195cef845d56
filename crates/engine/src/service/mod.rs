//! Service entry point for request handlers
//!
//! `UniqueNumberService` owns one allocator per configured value kind and
//! resolves a request's optional kind selector to one of them:
//!
//! ```ignore
//! let service = UniqueNumberService::open("./data")?;
//! let value = service.allocate_selector(Some("float"))?;
//! ```
//!
//! Opening a data directory reads (or creates) `uniqnum.toml` and opens the
//! ledgers it names. Handlers map errors to responses with
//! [`Error::status_code`](uniqnum_core::Error::status_code).

pub mod config;

pub use config::{
    DecimalRangeConfig, IntegerRangeConfig, ServiceConfig, StorageStrategy, CONFIG_FILE_NAME,
    DECIMAL_SNAPSHOT_FILE, INTEGER_SNAPSHOT_FILE, SQLITE_FILE,
};

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use uniqnum_core::{BoundarySignal, Error, Ledger, Result, Value, ValueKind, ValueSpace};
use uniqnum_storage::{MemoryLedger, SnapshotLedger, SqliteLedger};

use crate::allocator::Allocator;
use crate::generator::RandomGenerator;

/// Allocators for every configured kind, keyed by kind
pub struct UniqueNumberService {
    allocators: BTreeMap<ValueKind, Allocator>,
    default_kind: ValueKind,
    data_dir: Option<PathBuf>,
}

impl UniqueNumberService {
    /// Open a service rooted at `path`
    ///
    /// Creates the directory and a default `uniqnum.toml` on first use.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data_dir = path.as_ref();
        std::fs::create_dir_all(data_dir)?;

        let config_path = data_dir.join(CONFIG_FILE_NAME);
        ServiceConfig::write_default_if_missing(&config_path)?;
        let config = ServiceConfig::from_file(&config_path)?;
        Self::from_config(&config, data_dir)
    }

    /// Build a service from an explicit config, storing ledgers in `data_dir`
    pub fn from_config<P: AsRef<Path>>(config: &ServiceConfig, data_dir: P) -> Result<Self> {
        config.validate()?;
        let data_dir = data_dir.as_ref();
        let strategy = config.storage_strategy()?;

        let mut ledgers: Vec<(ValueKind, Arc<dyn Ledger>)> = Vec::new();
        for space in configured_spaces(config)? {
            let ledger: Arc<dyn Ledger> = match strategy {
                StorageStrategy::Snapshot => {
                    let file = match space.kind() {
                        ValueKind::Integer => INTEGER_SNAPSHOT_FILE,
                        ValueKind::Decimal => DECIMAL_SNAPSHOT_FILE,
                    };
                    Arc::new(SnapshotLedger::open(data_dir.join(file), space)?)
                }
                StorageStrategy::Sqlite => Arc::new(SqliteLedger::open_with_timeout(
                    data_dir.join(SQLITE_FILE),
                    space,
                    config.busy_timeout(),
                )?),
                StorageStrategy::Memory => Arc::new(MemoryLedger::new(space)),
            };
            ledgers.push((space.kind(), ledger));
        }

        let service = Self::assemble(config, ledgers, Some(data_dir.to_path_buf()))?;
        info!(
            target: "uniqnum::service",
            path = %data_dir.display(),
            storage = %config.storage,
            kinds = service.allocators.len(),
            "Service opened"
        );
        Ok(service)
    }

    /// Build a service with in-memory ledgers, ignoring `config.storage`
    pub fn ephemeral(config: &ServiceConfig) -> Result<Self> {
        config.validate()?;
        let ledgers = configured_spaces(config)?
            .into_iter()
            .map(|space| (space.kind(), Arc::new(MemoryLedger::new(space)) as Arc<dyn Ledger>))
            .collect();
        Self::assemble(config, ledgers, None)
    }

    fn assemble(
        config: &ServiceConfig,
        ledgers: Vec<(ValueKind, Arc<dyn Ledger>)>,
        data_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let policy = config.retry_policy();
        let mut allocators = BTreeMap::new();
        for (kind, ledger) in ledgers {
            let generator = Arc::new(RandomGenerator::new(*ledger.space()));
            allocators.insert(kind, Allocator::new(generator, ledger, policy.clone())?);
        }
        Ok(Self {
            allocators,
            default_kind: config.default_kind()?,
            data_dir,
        })
    }

    /// Kind used when a request names none
    pub fn default_kind(&self) -> ValueKind {
        self.default_kind
    }

    /// Data directory, `None` for ephemeral services
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Kinds this service can allocate
    pub fn kinds(&self) -> impl Iterator<Item = ValueKind> + '_ {
        self.allocators.keys().copied()
    }

    /// The allocator for `kind`
    ///
    /// # Errors
    ///
    /// `UnknownKind` if `kind` has no configured space.
    pub fn allocator(&self, kind: ValueKind) -> Result<&Allocator> {
        self.allocators
            .get(&kind)
            .ok_or_else(|| Error::UnknownKind(format!("{} is not configured", kind)))
    }

    /// The space for `kind`, if configured
    pub fn space(&self, kind: ValueKind) -> Option<&ValueSpace> {
        self.allocators.get(&kind).map(|a| a.space())
    }

    /// Allocate a fresh value of `kind` (or the default kind)
    pub fn allocate(&self, kind: Option<ValueKind>) -> Result<Value> {
        let kind = kind.unwrap_or(self.default_kind);
        let result = self.allocator(kind).and_then(|a| a.allocate());
        if let Err(e) = &result {
            match e.boundary_signal() {
                BoundarySignal::NoMoreValues => {
                    warn!(target: "uniqnum::service", kind = %kind, error = %e, "No value available")
                }
                BoundarySignal::InternalFailure => {
                    error!(target: "uniqnum::service", kind = %kind, error = %e, "Allocation failed")
                }
                BoundarySignal::BadRequest => {}
            }
        }
        result
    }

    /// Allocate using a raw selector such as `"int"` or `"float"`
    pub fn allocate_selector(&self, selector: Option<&str>) -> Result<Value> {
        let kind = selector.map(str::parse::<ValueKind>).transpose()?;
        self.allocate(kind)
    }

    /// Number of values issued for `kind`
    pub fn issued_count(&self, kind: ValueKind) -> Result<u64> {
        self.allocator(kind)?.ledger().count()
    }

    /// Every value issued for `kind`
    pub fn issued_values(&self, kind: ValueKind) -> Result<HashSet<Value>> {
        self.allocator(kind)?.ledger().load()
    }
}

fn configured_spaces(config: &ServiceConfig) -> Result<Vec<ValueSpace>> {
    let mut spaces = vec![config.integer_space()?];
    spaces.extend(config.decimal_space()?);
    Ok(spaces)
}
