use crate::collection::{CollectionFactory, NitriteCollection};
use crate::common::{SubscriberRef, INTERNAL_NAME_SEPARATOR, RESERVED_NAME_PREFIX};
use crate::errors::{ErrorKind, NitriteError, NitriteResult};
use crate::nitrite_builder::NitriteBuilder;
use crate::nitrite_config::NitriteConfig;
use crate::store::{NitriteStore, StoreEventListener};
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The database handle.
///
/// Clones share one database. Collections are opened lazily by name and
/// the same handle is returned until it is closed. Closing the database
/// closes every collection, then the store, then stops the event workers.
/// When the last clone is dropped without `close`, the same happens.
///
/// # Examples
///
/// ```rust,ignore
/// let db = Nitrite::builder().open_or_create()?;
/// let users = db.collection("users")?;
/// users.insert(doc! { name: "Alice" })?;
/// db.commit()?;
/// db.close()?;
/// ```
#[derive(Clone)]
pub struct Nitrite {
    inner: Arc<NitriteInner>,
}

struct NitriteInner {
    nitrite_config: NitriteConfig,
    store: NitriteStore,
    collection_factory: CollectionFactory,
    closed: AtomicBool,
}

impl Nitrite {
    pub fn builder() -> NitriteBuilder {
        NitriteBuilder::new()
    }

    pub(crate) fn open(nitrite_config: NitriteConfig) -> NitriteResult<Self> {
        nitrite_config.initialize()?;
        let store = nitrite_config.nitrite_store()?;
        log::debug!("Opened database on store {}", store.store_version());

        Ok(Nitrite {
            inner: Arc::new(NitriteInner {
                collection_factory: CollectionFactory::new(nitrite_config.clone()),
                nitrite_config,
                store,
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Opens the named collection, creating it when it does not exist.
    ///
    /// # Errors
    ///
    /// [ErrorKind::InvalidOperation] for an empty name, a name starting with
    /// `$nitrite` or one containing `|`; [ErrorKind::StoreClosed] once the
    /// database is closed.
    pub fn collection(&self, name: &str) -> NitriteResult<NitriteCollection> {
        validate_collection_name(name)?;
        self.check_opened()?;
        self.inner.collection_factory.get_collection(name)
    }

    pub fn has_collection(&self, name: &str) -> NitriteResult<bool> {
        self.check_opened()?;
        if is_reserved(name) {
            return Ok(false);
        }
        self.inner.store.has_map(name)
    }

    /// Names of the user collections in the store, sorted.
    pub fn list_collection_names(&self) -> NitriteResult<Vec<String>> {
        self.check_opened()?;
        let mut names: Vec<String> = self
            .inner
            .store
            .map_names()?
            .into_iter()
            .filter(|name| !is_reserved(name))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Drops a collection with its indexes. Open handles to it report
    /// [ErrorKind::CollectionDropped] afterwards.
    pub fn destroy_collection(&self, name: &str) -> NitriteResult<()> {
        validate_collection_name(name)?;
        self.check_opened()?;
        self.inner.collection_factory.destroy_collection(name)
    }

    pub fn commit(&self) -> NitriteResult<()> {
        self.check_opened()?;
        self.inner.store.commit()
    }

    pub fn subscribe_store_events(
        &self,
        listener: StoreEventListener,
    ) -> NitriteResult<SubscriberRef> {
        self.check_opened()?;
        self.inner.store.subscribe(listener)
    }

    pub fn unsubscribe_store_events(&self, subscriber: SubscriberRef) -> NitriteResult<()> {
        self.check_opened()?;
        self.inner.store.unsubscribe(subscriber)
    }

    /// Closes the database. A second call does nothing.
    pub fn close(&self) -> NitriteResult<()> {
        self.inner.close()
    }

    pub fn is_closed(&self) -> NitriteResult<bool> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Ok(true);
        }
        self.inner.store.is_closed()
    }

    pub fn config(&self) -> NitriteConfig {
        self.inner.nitrite_config.clone()
    }

    pub fn store(&self) -> NitriteStore {
        self.inner.store.clone()
    }

    fn check_opened(&self) -> NitriteResult<()> {
        if self.is_closed()? {
            log::error!("Nitrite store is closed");
            return Err(NitriteError::new(
                "Nitrite store is closed",
                ErrorKind::StoreClosed,
            ));
        }
        Ok(())
    }
}

impl NitriteInner {
    fn close(&self) -> NitriteResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.collection_factory.close_all();
        let result = self.store.close();
        // workers are joined even when the store failed to close
        self.nitrite_config.shutdown();
        log::debug!("Closed database");
        result
    }
}

// Drop on the inner value so only the last clone closes the store.
impl Drop for NitriteInner {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::error!("Failed to close database on drop: {}", e);
        }
    }
}

fn is_reserved(name: &str) -> bool {
    name.starts_with(RESERVED_NAME_PREFIX)
}

fn validate_collection_name(name: &str) -> NitriteResult<()> {
    if name.is_empty() {
        log::error!("Collection name cannot be empty");
        return Err(NitriteError::new(
            "Collection name cannot be empty",
            ErrorKind::InvalidOperation,
        ));
    }

    if is_reserved(name) {
        log::error!("Collection name {} uses the reserved prefix", name);
        return Err(NitriteError::new(
            &format!("Collection name cannot start with {}", RESERVED_NAME_PREFIX),
            ErrorKind::InvalidOperation,
        ));
    }

    if name.contains(INTERNAL_NAME_SEPARATOR) {
        log::error!("Collection name {} contains {}", name, INTERNAL_NAME_SEPARATOR);
        return Err(NitriteError::new(
            &format!("Collection name cannot contain {}", INTERNAL_NAME_SEPARATOR),
            ErrorKind::InvalidOperation,
        ));
    }
    Ok(())
}

impl Debug for Nitrite {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Nitrite")
            .field("closed", &self.inner.closed.load(Ordering::Relaxed))
            .finish()
    }
}
