use crate::common::{AttributeAware, Attributes, Convertible, Key, Value, META_MAP_NAME};
use crate::errors::{ErrorKind, NitriteError, NitriteResult};
use crate::store::memory::store::InMemoryStoreInner;
use crate::store::NitriteMapProvider;
use crossbeam_skiplist::SkipMap;
use std::ops::Bound::{Excluded, Unbounded};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Content of one named map. Shared by every handle the store hands out
/// for that name.
pub(crate) struct MapData {
    entries: SkipMap<Key, Value>,
    dropped: AtomicBool,
}

impl MapData {
    pub(crate) fn new() -> Self {
        MapData {
            entries: SkipMap::new(),
            dropped: AtomicBool::new(false),
        }
    }

    pub(crate) fn remove_entry(&self, key: &Key) {
        self.entries.remove(key);
    }

    pub(crate) fn mark_dropped(&self) {
        self.dropped.store(true, Ordering::SeqCst);
        self.entries.clear();
    }
}

/// Handle to a map of the [InMemoryStore](super::InMemoryStore).
///
/// Closing a handle only invalidates that handle; the data lives as long
/// as the store does.
#[derive(Clone)]
pub struct InMemoryMap {
    name: String,
    data: Arc<MapData>,
    closed: Arc<AtomicBool>,
    store: Weak<InMemoryStoreInner>,
}

impl InMemoryMap {
    pub(crate) fn new(name: &str, data: Arc<MapData>, store: Weak<InMemoryStoreInner>) -> Self {
        InMemoryMap {
            name: name.to_string(),
            data,
            closed: Arc::new(AtomicBool::new(false)),
            store,
        }
    }

    fn store(&self) -> NitriteResult<Arc<InMemoryStoreInner>> {
        match self.store.upgrade() {
            Some(store) if !store.is_closed() => Ok(store),
            _ => {
                log::error!("Store of map {} is closed", self.name);
                Err(NitriteError::new(
                    &format!("Store of map {} is closed", self.name),
                    ErrorKind::StoreClosed,
                ))
            }
        }
    }

    fn check_opened(&self) -> NitriteResult<()> {
        self.store()?;

        if self.data.dropped.load(Ordering::SeqCst) {
            log::error!("Map {} is dropped", self.name);
            return Err(NitriteError::new(
                &format!("Map {} is dropped", self.name),
                ErrorKind::InvalidOperation,
            ));
        }

        if self.closed.load(Ordering::SeqCst) {
            log::error!("Map {} is closed", self.name);
            return Err(NitriteError::new(
                &format!("Map {} is closed", self.name),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }

    fn meta_entry(&self) -> NitriteResult<Option<InMemoryMap>> {
        if self.name == META_MAP_NAME {
            return Ok(None);
        }
        let store = self.store()?;
        Ok(Some(store.raw_map(META_MAP_NAME, &self.store)))
    }
}

impl AttributeAware for InMemoryMap {
    fn attributes(&self) -> NitriteResult<Option<Attributes>> {
        self.check_opened()?;
        match self.meta_entry()? {
            Some(meta) => match meta.get(&Value::from(self.name.as_str()))? {
                Some(value) => Ok(Some(Attributes::from_value(&value)?)),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    fn set_attributes(&self, attributes: Attributes) -> NitriteResult<()> {
        self.check_opened()?;
        if let Some(meta) = self.meta_entry()? {
            meta.put(Value::from(self.name.as_str()), attributes.to_value()?)?;
        }
        Ok(())
    }
}

impl NitriteMapProvider for InMemoryMap {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn contains_key(&self, key: &Key) -> NitriteResult<bool> {
        self.check_opened()?;
        Ok(self.data.entries.contains_key(key))
    }

    fn get(&self, key: &Key) -> NitriteResult<Option<Value>> {
        self.check_opened()?;
        Ok(self.data.entries.get(key).map(|e| e.value().clone()))
    }

    fn put(&self, key: Key, value: Value) -> NitriteResult<()> {
        self.check_opened()?;
        self.data.entries.insert(key, value);
        Ok(())
    }

    fn remove(&self, key: &Key) -> NitriteResult<Option<Value>> {
        self.check_opened()?;
        Ok(self.data.entries.remove(key).map(|e| e.value().clone()))
    }

    fn put_if_absent(&self, key: Key, value: Value) -> NitriteResult<Option<Value>> {
        self.check_opened()?;
        // callers serialize writers per map through the collection lock
        if let Some(existing) = self.data.entries.get(&key) {
            return Ok(Some(existing.value().clone()));
        }
        self.data.entries.insert(key, value);
        Ok(None)
    }

    fn size(&self) -> NitriteResult<u64> {
        self.check_opened()?;
        Ok(self.data.entries.len() as u64)
    }

    fn clear(&self) -> NitriteResult<()> {
        self.check_opened()?;
        self.data.entries.clear();
        Ok(())
    }

    fn entries_after(&self, key: Option<&Key>, limit: usize) -> NitriteResult<Vec<(Key, Value)>> {
        self.check_opened()?;
        let range = match key {
            Some(key) => self.data.entries.range((Excluded(key), Unbounded)),
            None => self.data.entries.range((Unbounded, Unbounded)),
        };
        Ok(range
            .take(limit)
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect())
    }

    fn close(&self) -> NitriteResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> NitriteResult<bool> {
        Ok(self.closed.load(Ordering::SeqCst) || self.store().is_err())
    }

    fn dispose(&self) -> NitriteResult<()> {
        self.check_opened()?;
        let store = self.store()?;
        store.remove_map(&self.name)?;
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_dropped(&self) -> NitriteResult<bool> {
        Ok(self.data.dropped.load(Ordering::SeqCst))
    }
}
