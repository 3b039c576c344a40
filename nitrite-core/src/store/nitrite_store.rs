use crate::common::{SubscriberRef, TaskExecutor, META_MAP_NAME};
use crate::errors::NitriteResult;
use crate::store::{NitriteMap, StoreEventListener};
use std::ops::Deref;
use std::sync::Arc;

/// Contract of a storage backend.
///
/// The engine opens the store once, asks it for named maps on demand, calls
/// `commit` at the end of every successful transaction and on explicit
/// request, and closes it when the database closes. A backend reports its
/// lifecycle through [StoreEvents](crate::store::StoreEvents) to the
/// listeners registered with `subscribe`.
pub trait NitriteStoreProvider: Send + Sync {
    /// Opens the backend. Events are dispatched on `executor`.
    fn open_or_create(&self, executor: TaskExecutor) -> NitriteResult<()>;

    fn is_closed(&self) -> NitriteResult<bool>;

    fn has_map(&self, name: &str) -> NitriteResult<bool>;

    /// Returns the map with that name, creating it if needed.
    fn open_map(&self, name: &str) -> NitriteResult<NitriteMap>;

    fn remove_map(&self, name: &str) -> NitriteResult<()>;

    /// Names of every map in the store, reserved ones included.
    fn map_names(&self) -> NitriteResult<Vec<String>>;

    fn commit(&self) -> NitriteResult<()>;

    fn close(&self) -> NitriteResult<()>;

    fn subscribe(&self, listener: StoreEventListener) -> NitriteResult<SubscriberRef>;

    fn unsubscribe(&self, subscriber: SubscriberRef) -> NitriteResult<()>;

    fn store_version(&self) -> String;

    /// Map holding collection attributes and index descriptors.
    fn meta_map(&self) -> NitriteResult<NitriteMap> {
        self.open_map(META_MAP_NAME)
    }
}

#[derive(Clone)]
pub struct NitriteStore {
    inner: Arc<dyn NitriteStoreProvider>,
}

impl NitriteStore {
    pub fn new<T: NitriteStoreProvider + 'static>(inner: T) -> Self {
        NitriteStore {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for NitriteStore {
    type Target = Arc<dyn NitriteStoreProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
