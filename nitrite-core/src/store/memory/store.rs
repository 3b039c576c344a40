use crate::common::{SubscriberRef, TaskExecutor, Value, META_MAP_NAME};
use crate::errors::{ErrorKind, NitriteError, NitriteResult};
use crate::store::memory::map::{InMemoryMap, MapData};
use crate::store::{
    NitriteMap, NitriteMapProvider, NitriteStoreProvider, StoreEventBus, StoreEventInfo,
    StoreEventListener, StoreEvents,
};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

const IN_MEMORY_STORE_VERSION: &str = "in-memory/1";

/// Volatile store backed by lock-free skip lists. Content is lost when the
/// store is closed.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<InMemoryStoreInner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NitriteStoreProvider for InMemoryStore {
    fn open_or_create(&self, executor: TaskExecutor) -> NitriteResult<()> {
        self.inner.open(executor)
    }

    fn is_closed(&self) -> NitriteResult<bool> {
        Ok(self.inner.is_closed())
    }

    fn has_map(&self, name: &str) -> NitriteResult<bool> {
        self.inner.check_opened()?;
        Ok(self.inner.maps.contains_key(name))
    }

    fn open_map(&self, name: &str) -> NitriteResult<NitriteMap> {
        self.inner.check_opened()?;
        let map = self.inner.raw_map(name, &Arc::downgrade(&self.inner));
        Ok(NitriteMap::new(map))
    }

    fn remove_map(&self, name: &str) -> NitriteResult<()> {
        self.inner.check_opened()?;
        self.inner.remove_map(name)
    }

    fn map_names(&self) -> NitriteResult<Vec<String>> {
        self.inner.check_opened()?;
        Ok(self.inner.maps.iter().map(|e| e.key().clone()).collect())
    }

    fn commit(&self) -> NitriteResult<()> {
        self.inner.check_opened()?;
        self.inner.alert(StoreEvents::Commit);
        Ok(())
    }

    fn close(&self) -> NitriteResult<()> {
        self.inner.close()
    }

    fn subscribe(&self, listener: StoreEventListener) -> NitriteResult<SubscriberRef> {
        match self.inner.event_bus.read().as_ref() {
            Some(bus) => bus.register(listener),
            None => {
                log::error!("Cannot subscribe to a store that is not open");
                Err(NitriteError::new(
                    "Cannot subscribe to a store that is not open",
                    ErrorKind::StoreClosed,
                ))
            }
        }
    }

    fn unsubscribe(&self, subscriber: SubscriberRef) -> NitriteResult<()> {
        match self.inner.event_bus.read().as_ref() {
            Some(bus) => bus.deregister(subscriber),
            None => Ok(()),
        }
    }

    fn store_version(&self) -> String {
        IN_MEMORY_STORE_VERSION.to_string()
    }
}

pub(crate) struct InMemoryStoreInner {
    closed: AtomicBool,
    opened: AtomicBool,
    maps: DashMap<String, Arc<MapData>>,
    event_bus: RwLock<Option<StoreEventBus>>,
}

impl Default for InMemoryStoreInner {
    fn default() -> Self {
        InMemoryStoreInner {
            closed: AtomicBool::new(false),
            opened: AtomicBool::new(false),
            maps: DashMap::new(),
            event_bus: RwLock::new(None),
        }
    }
}

impl InMemoryStoreInner {
    fn open(&self, executor: TaskExecutor) -> NitriteResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            log::error!("In-memory store cannot be reopened after close");
            return Err(NitriteError::new(
                "In-memory store cannot be reopened after close",
                ErrorKind::StoreClosed,
            ));
        }

        if self.opened.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        *self.event_bus.write() = Some(StoreEventBus::with_executor(executor));
        log::debug!("In-memory store opened");
        self.alert(StoreEvents::Opened);
        Ok(())
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || !self.opened.load(Ordering::SeqCst)
    }

    fn check_opened(&self) -> NitriteResult<()> {
        if self.is_closed() {
            log::error!("Store is closed");
            return Err(NitriteError::new("Store is closed", ErrorKind::StoreClosed));
        }
        Ok(())
    }

    pub(crate) fn raw_map(&self, name: &str, me: &Weak<InMemoryStoreInner>) -> InMemoryMap {
        let data = self
            .maps
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MapData::new()))
            .clone();
        InMemoryMap::new(name, data, me.clone())
    }

    pub(crate) fn remove_map(&self, name: &str) -> NitriteResult<()> {
        if let Some((_, data)) = self.maps.remove(name) {
            data.mark_dropped();
        }

        if name != META_MAP_NAME {
            if let Some(meta) = self.maps.get(META_MAP_NAME) {
                meta.remove_entry(&Value::from(name));
            }
        }
        Ok(())
    }

    fn alert(&self, event: StoreEvents) {
        if let Some(bus) = self.event_bus.read().as_ref() {
            let info = StoreEventInfo::new(event, IN_MEMORY_STORE_VERSION);
            if let Err(e) = bus.publish(info) {
                log::warn!("Failed to publish store event {:?}: {}", event, e);
            }
        }
    }

    fn close(&self) -> NitriteResult<()> {
        if self.closed.load(Ordering::SeqCst) || !self.opened.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.alert(StoreEvents::Closing);
        self.closed.store(true, Ordering::SeqCst);
        for entry in self.maps.iter() {
            entry.value().mark_dropped();
        }
        self.maps.clear();
        self.alert(StoreEvents::Closed);

        // queued deliveries keep their mailboxes alive; no new events after this
        self.event_bus.write().take();
        log::debug!("In-memory store closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{AttributeAware, Attributes};
    use crate::store::NitriteStore;
    use awaitility::at_most;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn open_store() -> (NitriteStore, TaskExecutor) {
        let executor = TaskExecutor::new("store-test", 1).unwrap();
        let store = NitriteStore::new(InMemoryStore::new());
        store.open_or_create(executor.clone()).unwrap();
        (store, executor)
    }

    #[test]
    fn test_open_map_shares_data() {
        let (store, _executor) = open_store();
        let first = store.open_map("a").unwrap();
        let second = store.open_map("a").unwrap();
        first.put(Value::from(1), Value::from("x")).unwrap();
        assert_eq!(second.get(&Value::from(1)).unwrap(), Some(Value::from("x")));
        assert!(store.has_map("a").unwrap());
        assert!(!store.has_map("b").unwrap());
    }

    #[test]
    fn test_closing_a_handle_keeps_data() {
        let (store, _executor) = open_store();
        let map = store.open_map("a").unwrap();
        map.put(Value::from(1), Value::from(1)).unwrap();
        map.close().unwrap();
        assert!(map.is_closed().unwrap());
        assert_eq!(
            map.get(&Value::from(1)).unwrap_err().kind(),
            &ErrorKind::InvalidOperation
        );

        let reopened = store.open_map("a").unwrap();
        assert_eq!(reopened.size().unwrap(), 1);
    }

    #[test]
    fn test_entries_after_is_ordered_and_exclusive() {
        let (store, _executor) = open_store();
        let map = store.open_map("a").unwrap();
        for i in [5, 1, 3, 2, 4] {
            map.put(Value::from(i), Value::from(i * 10)).unwrap();
        }

        let first = map.entries_after(None, 2).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].0, Value::from(1));
        assert_eq!(first[1].0, Value::from(2));

        let rest = map.entries_after(Some(&Value::from(2)), 10).unwrap();
        let keys: Vec<Value> = rest.into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![Value::from(3), Value::from(4), Value::from(5)]);

        let all: Vec<_> = map.entries().map(|e| e.unwrap().0).collect();
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn test_put_if_absent() {
        let (store, _executor) = open_store();
        let map = store.open_map("a").unwrap();
        assert_eq!(map.put_if_absent(Value::from(1), Value::from("a")).unwrap(), None);
        assert_eq!(
            map.put_if_absent(Value::from(1), Value::from("b")).unwrap(),
            Some(Value::from("a"))
        );
    }

    #[test]
    fn test_attributes_live_in_meta_map() {
        let (store, _executor) = open_store();
        let map = store.open_map("users").unwrap();
        assert!(map.attributes().unwrap().is_none());

        map.set_attributes(Attributes::new_for_collection("users")).unwrap();
        let attributes = map.attributes().unwrap().unwrap();
        assert_eq!(attributes.owner(), Some("users"));

        let meta = store.meta_map().unwrap();
        assert!(meta.contains_key(&Value::from("users")).unwrap());

        map.dispose().unwrap();
        assert!(map.is_dropped().unwrap());
        assert!(!meta.contains_key(&Value::from("users")).unwrap());
        assert!(!store.has_map("users").unwrap());
    }

    #[test]
    fn test_closed_store_rejects_access() {
        let (store, executor) = open_store();
        let map = store.open_map("a").unwrap();
        store.close().unwrap();
        assert!(store.is_closed().unwrap());
        assert_eq!(store.open_map("a").unwrap_err().kind(), &ErrorKind::StoreClosed);
        assert_eq!(map.size().unwrap_err().kind(), &ErrorKind::StoreClosed);
        executor.shutdown();
    }

    #[test]
    fn test_lifecycle_events() {
        let (store, executor) = open_store();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        store
            .subscribe(StoreEventListener::new(move |info| {
                if matches!(info.event(), StoreEvents::Commit | StoreEvents::Closed) {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
                Ok(())
            }))
            .unwrap();

        store.commit().unwrap();
        store.close().unwrap();
        at_most(Duration::from_secs(5)).until(|| seen.load(Ordering::SeqCst) == 2);
        executor.shutdown();
    }
}
