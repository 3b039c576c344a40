//! Database configuration shared by every component of one database.

use crate::common::{
    LockService, ReadExecutor, TaskExecutor, WriteExecutor, DEFAULT_BACKFILL_BATCH_SIZE,
};
use crate::errors::{ErrorKind, NitriteError, NitriteResult};
use crate::index::text::Tokenizer;
use crate::store::memory::InMemoryStore;
use crate::store::NitriteStore;
use crate::{get_cpu_count, FIELD_SEPARATOR};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

/// Shared configuration handle.
///
/// Every setter is rejected once the database has been opened.
///
/// # Examples
///
/// ```rust,ignore
/// let db = Nitrite::builder()
///     .field_separator(":")
///     .event_workers(2)
///     .open_or_create()?;
/// assert_eq!(db.config().field_separator(), ":");
/// ```
#[derive(Clone)]
pub struct NitriteConfig {
    inner: Arc<NitriteConfigInner>,
}

impl Default for NitriteConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl NitriteConfig {
    pub fn new() -> Self {
        NitriteConfig {
            inner: Arc::new(NitriteConfigInner::new()),
        }
    }

    /// Separator used in field paths, `"."` unless configured otherwise.
    pub fn field_separator(&self) -> String {
        FIELD_SEPARATOR.read_with(|it| it.clone())
    }

    /// Sets the process-wide field separator.
    ///
    /// # Errors
    ///
    /// Returns error if already configured or if separator is empty.
    pub fn set_field_separator(&self, separator: &str) -> NitriteResult<()> {
        self.inner.ensure_not_configured("Field separator")?;
        if separator.is_empty() {
            log::error!("Field separator cannot be empty");
            return Err(NitriteError::new(
                "Field separator cannot be empty",
                ErrorKind::InvalidOperation,
            ));
        }

        FIELD_SEPARATOR.write_with(|it| *it = separator.to_string());
        Ok(())
    }

    /// Number of threads delivering events.
    pub fn event_workers(&self) -> usize {
        self.inner.event_workers.load(Ordering::Relaxed)
    }

    pub fn set_event_workers(&self, workers: usize) -> NitriteResult<()> {
        self.inner.ensure_not_configured("Event worker count")?;
        if workers == 0 {
            log::error!("Event worker count must be at least 1");
            return Err(NitriteError::new(
                "Event worker count must be at least 1",
                ErrorKind::ValidationError,
            ));
        }
        self.inner.event_workers.store(workers, Ordering::Relaxed);
        Ok(())
    }

    /// Documents read per batch while an index is backfilled.
    pub fn backfill_batch_size(&self) -> usize {
        self.inner.backfill_batch_size.load(Ordering::Relaxed)
    }

    pub fn set_backfill_batch_size(&self, batch_size: usize) -> NitriteResult<()> {
        self.inner.ensure_not_configured("Backfill batch size")?;
        if batch_size == 0 {
            log::error!("Backfill batch size must be at least 1");
            return Err(NitriteError::new(
                "Backfill batch size must be at least 1",
                ErrorKind::ValidationError,
            ));
        }
        self.inner.backfill_batch_size.store(batch_size, Ordering::Relaxed);
        Ok(())
    }

    /// Sets the storage backend. Without one the database runs in memory.
    pub fn set_store(&self, store: NitriteStore) -> NitriteResult<()> {
        self.inner.ensure_not_configured("Store")?;
        *self.inner.store.write() = Some(store);
        Ok(())
    }

    /// Gets the configured store.
    ///
    /// # Errors
    ///
    /// Returns error if the database has not been opened yet.
    pub fn nitrite_store(&self) -> NitriteResult<NitriteStore> {
        match self.inner.store.read().as_ref() {
            Some(store) => Ok(store.clone()),
            None => {
                log::error!("No store is configured");
                Err(NitriteError::new(
                    "No store is configured",
                    ErrorKind::InvalidOperation,
                ))
            }
        }
    }

    pub fn tokenizer(&self) -> Tokenizer {
        self.inner.tokenizer.read().clone()
    }

    /// Sets the tokenizer used by full-text indexes.
    pub fn set_tokenizer(&self, tokenizer: Tokenizer) -> NitriteResult<()> {
        self.inner.ensure_not_configured("Tokenizer")?;
        *self.inner.tokenizer.write() = tokenizer;
        Ok(())
    }

    pub fn lock_service(&self) -> LockService {
        self.inner.lock_service.clone()
    }

    /// Gets the executor shared by event buses.
    ///
    /// # Errors
    ///
    /// Returns error if the database has not been opened yet.
    pub fn executor(&self) -> NitriteResult<TaskExecutor> {
        match self.inner.executor.get() {
            Some(executor) => Ok(executor.clone()),
            None => {
                log::error!("Executor is not initialized");
                Err(NitriteError::new(
                    "Executor is not initialized",
                    ErrorKind::InvalidOperation,
                ))
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.configured.load(Ordering::Relaxed)
    }

    /// Starts the executor and opens the store. Runs once per configuration.
    pub(crate) fn initialize(&self) -> NitriteResult<()> {
        if self.inner.configured.swap(true, Ordering::SeqCst) {
            log::error!("Nitrite configuration is already initialized");
            return Err(NitriteError::new(
                "Nitrite configuration is already initialized",
                ErrorKind::InvalidOperation,
            ));
        }

        let executor = TaskExecutor::new("events", self.event_workers())?;
        let store = self
            .inner
            .store
            .write()
            .get_or_insert_with(|| NitriteStore::new(InMemoryStore::new()))
            .clone();

        if let Err(e) = store.open_or_create(executor.clone()) {
            executor.shutdown();
            return Err(NitriteError::new_with_cause(
                "Failed to open the store",
                e.kind().clone(),
                e,
            ));
        }

        // a fresh configuration never has an executor yet
        let _ = self.inner.executor.set(executor);
        log::debug!(
            "Nitrite configured with separator {:?}, {} event workers, backfill batch {}",
            self.field_separator(),
            self.event_workers(),
            self.backfill_batch_size()
        );
        Ok(())
    }

    /// Stops the executor, joining its workers.
    pub(crate) fn shutdown(&self) {
        if let Some(executor) = self.inner.executor.get() {
            executor.shutdown();
        }
    }
}

struct NitriteConfigInner {
    configured: AtomicBool,
    event_workers: AtomicUsize,
    backfill_batch_size: AtomicUsize,
    store: RwLock<Option<NitriteStore>>,
    tokenizer: RwLock<Tokenizer>,
    lock_service: LockService,
    executor: OnceLock<TaskExecutor>,
}

impl NitriteConfigInner {
    fn new() -> Self {
        NitriteConfigInner {
            configured: AtomicBool::new(false),
            event_workers: AtomicUsize::new(get_cpu_count().max(1)),
            backfill_batch_size: AtomicUsize::new(DEFAULT_BACKFILL_BATCH_SIZE),
            store: RwLock::new(None),
            tokenizer: RwLock::new(Tokenizer::default()),
            lock_service: LockService::new(),
            executor: OnceLock::new(),
        }
    }

    fn ensure_not_configured(&self, what: &str) -> NitriteResult<()> {
        if self.configured.load(Ordering::Relaxed) {
            log::error!("{} cannot be changed after initialization", what);
            return Err(NitriteError::new(
                &format!("{} cannot be changed after initialization", what),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }
}
