use crate::common::util::{derive_index_map_name, derive_index_meta_key, derive_index_meta_prefix};
use crate::common::{atomic, Atomic, Convertible, Fields, Key, ReadExecutor, Value, WriteExecutor};
use crate::errors::{ErrorKind, NitriteError, NitriteResult};
use crate::index::text::Tokenizer;
use crate::index::{
    ComparableIndex, IndexDescriptor, IndexKind, IndexState, NitriteIndex, TextIndex,
};
use crate::nitrite_config::NitriteConfig;
use crate::store::{NitriteMap, NitriteStore};
use std::collections::BTreeMap;
use std::sync::Arc;

const META_SCAN_BATCH: usize = 64;

/// One registered index: its descriptor, the open index, and the backfill
/// watermark while it is building.
#[derive(Clone)]
pub(crate) struct IndexRecord {
    pub(crate) descriptor: IndexDescriptor,
    pub(crate) index: NitriteIndex,
    /// Highest primary key the backfill has indexed. `None` until the first
    /// batch lands, and once the index is active.
    pub(crate) watermark: Option<Key>,
}

impl IndexRecord {
    /// Whether a write to document `key` must be mirrored into this index.
    pub(crate) fn tracks(&self, key: &Key) -> bool {
        match self.descriptor.state() {
            IndexState::Active => true,
            IndexState::Building => self.watermark.as_ref().is_some_and(|w| key <= w),
            IndexState::Dropped => false,
        }
    }
}

/// Registry of the indexes of one collection, backed by descriptor records
/// in the store meta map.
#[derive(Clone)]
pub(crate) struct IndexManager {
    inner: Arc<IndexManagerInner>,
}

impl IndexManager {
    /// Opens the manager and loads every persisted descriptor of the collection.
    pub fn new(collection_name: &str, nitrite_config: &NitriteConfig) -> NitriteResult<Self> {
        let store = nitrite_config.nitrite_store()?;
        let inner = IndexManagerInner {
            collection_name: collection_name.to_string(),
            meta_map: store.meta_map()?,
            store,
            tokenizer: nitrite_config.tokenizer(),
            records: atomic(BTreeMap::new()),
        };
        inner.load()?;
        Ok(IndexManager {
            inner: Arc::new(inner),
        })
    }

    pub fn find(&self, fields: &Fields) -> Option<IndexRecord> {
        self.inner.records.read_with(|records| records.get(fields).cloned())
    }

    pub fn records(&self) -> Vec<IndexRecord> {
        self.inner.records.read_with(|records| records.values().cloned().collect())
    }

    pub fn descriptors(&self) -> Vec<IndexDescriptor> {
        self.inner
            .records
            .read_with(|records| records.values().map(|r| r.descriptor.clone()).collect())
    }

    /// Persists a new descriptor and opens its index.
    pub fn register(&self, descriptor: IndexDescriptor) -> NitriteResult<IndexRecord> {
        self.inner.persist(&descriptor)?;
        let record = IndexRecord {
            index: self.inner.open_index(&descriptor)?,
            descriptor,
            watermark: None,
        };
        self.inner.records.write_with(|records| {
            records.insert(record.descriptor.fields().clone(), record.clone())
        });
        Ok(record)
    }

    /// Moves an index to `state` and persists the change.
    pub fn set_state(&self, fields: &Fields, state: IndexState) -> NitriteResult<IndexDescriptor> {
        let descriptor = self.inner.records.write_with(|records| {
            records.get_mut(fields).map(|record| {
                record.descriptor = record.descriptor.with_state(state);
                if state == IndexState::Active {
                    record.watermark = None;
                }
                record.descriptor.clone()
            })
        });

        match descriptor {
            Some(descriptor) => {
                self.inner.persist(&descriptor)?;
                Ok(descriptor)
            }
            None => Err(self.inner.not_found(fields)),
        }
    }

    #[cfg(test)]
    pub fn watermark(&self, fields: &Fields) -> NitriteResult<Option<Key>> {
        self.inner.records.read_with(|records| match records.get(fields) {
            Some(record) => Ok(record.watermark.clone()),
            None => Err(self.inner.not_found(fields)),
        })
    }

    pub fn set_watermark(&self, fields: &Fields, watermark: Key) {
        self.inner.records.write_with(|records| {
            if let Some(record) = records.get_mut(fields) {
                record.watermark = Some(watermark);
            }
        })
    }

    /// Unregisters an index and deletes its descriptor record. The entries
    /// are left to the caller.
    pub fn remove(&self, fields: &Fields) -> NitriteResult<Option<IndexRecord>> {
        let record = self.inner.records.write_with(|records| records.remove(fields));
        if record.is_some() {
            let key = derive_index_meta_key(&self.inner.collection_name, fields);
            self.inner.meta_map.remove(&Value::from(key))?;
        }
        Ok(record)
    }

    /// Drops every entry of an index and starts it over empty, keeping its
    /// descriptor.
    pub fn reset(&self, fields: &Fields) -> NitriteResult<()> {
        let Some(record) = self.find(fields) else {
            return Err(self.inner.not_found(fields));
        };
        record.index.drop_index()?;
        let index = self.inner.open_index(&record.descriptor)?;
        self.inner.records.write_with(|records| {
            if let Some(existing) = records.get_mut(fields) {
                existing.index = index;
            }
        });
        Ok(())
    }
}

struct IndexManagerInner {
    collection_name: String,
    store: NitriteStore,
    meta_map: NitriteMap,
    tokenizer: Tokenizer,
    records: Atomic<BTreeMap<Fields, IndexRecord>>,
}

impl IndexManagerInner {
    fn load(&self) -> NitriteResult<()> {
        let prefix = derive_index_meta_prefix(&self.collection_name);
        let mut cursor = Value::from(prefix.as_str());

        loop {
            let batch = self.meta_map.entries_after(Some(&cursor), META_SCAN_BATCH)?;
            let fetched = batch.len();
            for (key, value) in batch {
                if !key.as_string().is_some_and(|k| k.starts_with(&prefix)) {
                    return Ok(());
                }

                let descriptor = IndexDescriptor::from_value(&value)?;
                log::debug!("Loaded {}", descriptor);
                let record = IndexRecord {
                    index: self.open_index(&descriptor)?,
                    descriptor,
                    watermark: None,
                };
                self.records.write_with(|records| {
                    records.insert(record.descriptor.fields().clone(), record)
                });
                cursor = key;
            }
            if fetched < META_SCAN_BATCH {
                return Ok(());
            }
        }
    }

    fn open_index(&self, descriptor: &IndexDescriptor) -> NitriteResult<NitriteIndex> {
        let map_name =
            derive_index_map_name(&self.collection_name, descriptor.fields(), descriptor.kind());
        let index_map = self.store.open_map(&map_name)?;
        Ok(match descriptor.kind() {
            IndexKind::FullText => NitriteIndex::new(TextIndex::new(
                descriptor.clone(),
                index_map,
                self.tokenizer.clone(),
            )),
            IndexKind::Unique | IndexKind::NonUnique => {
                NitriteIndex::new(ComparableIndex::new(descriptor.clone(), index_map))
            }
        })
    }

    fn persist(&self, descriptor: &IndexDescriptor) -> NitriteResult<()> {
        let key = derive_index_meta_key(&self.collection_name, descriptor.fields());
        self.meta_map.put(Value::from(key), descriptor.to_value()?)
    }

    fn not_found(&self, fields: &Fields) -> NitriteError {
        log::error!("No index found on {} in {}", fields, self.collection_name);
        NitriteError::new(
            &format!("No index found on {}", fields),
            ErrorKind::IndexingError,
        )
    }
}
