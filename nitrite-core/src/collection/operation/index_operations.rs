use super::index_manager::{IndexManager, IndexRecord};
use crate::collection::{CollectionEventBus, CollectionEventInfo, CollectionEvents, NitriteId};
use crate::common::{Convertible, Fields, LockHandle, ProcessorChain, Value};
use crate::errors::{ErrorKind, NitriteError, NitriteResult};
use crate::index::{FieldValues, IndexDescriptor, IndexKind, IndexState};
use crate::store::NitriteMap;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Index lifecycle of one collection: create with backfill, rebuild, drop
/// and lookup.
///
/// A build registers its descriptor as `Building` under the collection write
/// lock, then backfills in batches under the read lock so writers can run
/// between batches. Each batch advances a watermark; writers mirror their
/// changes into the building index only for documents at or below it, the
/// rest are picked up by later batches. A final write-locked pass indexes
/// whatever remains and flips the descriptor to `Active`.
///
/// Dropping an index that is still building removes it at once; the build
/// notices at its next batch and stops without touching the collection.
#[derive(Clone)]
pub(crate) struct IndexOperations {
    inner: Arc<IndexOperationsInner>,
}

struct IndexOperationsInner {
    collection_name: String,
    index_manager: IndexManager,
    nitrite_map: NitriteMap,
    lock: LockHandle,
    processor_chain: ProcessorChain,
    event_bus: CollectionEventBus,
    batch_size: usize,
    building: DashMap<Fields, u64>,
    next_build: AtomicU64,
}

impl IndexOperations {
    pub fn new(
        collection_name: &str,
        index_manager: IndexManager,
        nitrite_map: NitriteMap,
        lock: LockHandle,
        processor_chain: ProcessorChain,
        event_bus: CollectionEventBus,
        batch_size: usize,
    ) -> Self {
        IndexOperations {
            inner: Arc::new(IndexOperationsInner {
                collection_name: collection_name.to_string(),
                index_manager,
                nitrite_map,
                lock,
                processor_chain,
                event_bus,
                batch_size: batch_size.max(1),
                building: DashMap::new(),
                next_build: AtomicU64::new(0),
            }),
        }
    }

    pub fn create_index(&self, fields: &Fields, kind: IndexKind) -> NitriteResult<()> {
        self.inner.create_index(fields, kind)
    }

    /// Drops the index and builds it again with the same kind.
    pub fn rebuild_index(&self, fields: &Fields) -> NitriteResult<()> {
        let kind = {
            let _guard = self.inner.lock.write();
            self.inner.ensure_not_building(fields, "rebuild")?;
            let record = self.inner.drop_existing(fields)?;
            record.descriptor.kind()
        };
        log::debug!("Rebuilding {} index on {}", kind, fields);
        self.inner.create_index(fields, kind)
    }

    /// Drops the index, cancelling its build if it is still building.
    pub fn drop_index(&self, fields: &Fields) -> NitriteResult<()> {
        let _guard = self.inner.lock.write();
        self.inner.drop_existing(fields)?;
        if self.inner.building.remove(fields).is_some() {
            log::debug!("Cancelled build of index on {}", fields);
        }
        Ok(())
    }

    pub fn drop_all(&self) -> NitriteResult<()> {
        let _guard = self.inner.lock.write();
        self.dispose_all()
    }

    pub fn is_indexing(&self, fields: &Fields) -> bool {
        self.inner.building.contains_key(fields)
    }

    pub fn has_index(&self, fields: &Fields) -> bool {
        self.inner.index_manager.find(fields).is_some()
    }

    /// `true` when an index of `kind` on exactly these fields is active.
    pub fn is_indexed_with(&self, fields: &Fields, kind: IndexKind) -> bool {
        self.inner.index_manager.find(fields).is_some_and(|record| {
            record.descriptor.kind() == kind && record.descriptor.state() == IndexState::Active
        })
    }

    pub fn list_indexes(&self) -> Vec<IndexDescriptor> {
        self.inner.index_manager.descriptors()
    }

    pub fn lookup(&self, fields: &Fields, value: &Value) -> NitriteResult<Vec<NitriteId>> {
        let Some(record) = self.inner.index_manager.find(fields) else {
            log::error!("No index found on {} in {}", fields, self.inner.collection_name);
            return Err(NitriteError::new(
                &format!("No index found on {}", fields),
                ErrorKind::IndexingError,
            ));
        };
        if record.descriptor.state() != IndexState::Active {
            log::error!("{} is not active yet", record.descriptor);
            return Err(NitriteError::new(
                &format!("Index on {} is not active yet", fields),
                ErrorKind::IndexingError,
            ));
        }
        record.index.lookup(value)
    }

    /// Rebuilds indexes whose build was interrupted before they became active.
    pub fn recover(&self) -> NitriteResult<()> {
        for descriptor in self.inner.index_manager.descriptors() {
            if descriptor.state() != IndexState::Building {
                continue;
            }
            log::warn!("Recovering interrupted build of {}", descriptor);
            {
                let _guard = self.inner.lock.write();
                self.inner.drop_existing(descriptor.fields())?;
            }
            self.inner.create_index(descriptor.fields(), descriptor.kind())?;
        }
        Ok(())
    }

    /// Empties every index, keeping the descriptors. Caller holds the write lock.
    pub fn clear_entries(&self) -> NitriteResult<()> {
        for descriptor in self.inner.index_manager.descriptors() {
            self.inner.index_manager.reset(descriptor.fields())?;
        }
        Ok(())
    }

    /// Drops every index along with its descriptor. Caller holds the write lock.
    pub fn dispose_all(&self) -> NitriteResult<()> {
        for descriptor in self.inner.index_manager.descriptors() {
            self.inner.drop_existing(descriptor.fields())?;
        }
        self.inner.building.clear();
        Ok(())
    }
}

impl IndexOperationsInner {
    fn create_index(&self, fields: &Fields, kind: IndexKind) -> NitriteResult<()> {
        if kind == IndexKind::FullText && fields.is_compound() {
            log::error!("Full-text index cannot be compound: {}", fields);
            return Err(NitriteError::new(
                &format!("Full-text index cannot be created on compound fields {}", fields),
                ErrorKind::IndexingError,
            ));
        }

        let build = {
            let _guard = self.lock.write();
            self.ensure_not_building(fields, "create")?;
            if let Some(record) = self.index_manager.find(fields) {
                log::error!("{} already exists", record.descriptor);
                return Err(NitriteError::new(
                    &format!("Index already exists on {}", fields),
                    ErrorKind::IndexingError,
                ));
            }

            let descriptor = IndexDescriptor::new(&self.collection_name, fields.clone(), kind);
            let build = self.next_build.fetch_add(1, Ordering::Relaxed);
            self.index_manager.register(descriptor.clone())?;
            self.building.insert(fields.clone(), build);
            log::debug!("Building {}", descriptor);
            self.alert(CollectionEvents::IndexStart, fields);
            build
        };

        match self.backfill(fields, build) {
            Ok(true) => Ok(()),
            Ok(false) => {
                log::debug!("Build of index on {} stopped, the index was dropped", fields);
                Ok(())
            }
            Err(e) => {
                let _guard = self.lock.write();
                if self.is_current(fields, build) {
                    if let Err(cleanup) = self.drop_existing(fields) {
                        log::error!("Failed to discard partial index on {}: {}", fields, cleanup);
                    }
                    self.building.remove(fields);
                }
                log::error!("Failed to build index on {}: {}", fields, e);
                Err(NitriteError::new_with_cause(
                    &format!("Failed to build index on {}", fields),
                    e.kind().clone(),
                    e,
                ))
            }
        }
    }

    /// Returns `false` when the index was dropped before the build finished.
    fn backfill(&self, fields: &Fields, build: u64) -> NitriteResult<bool> {
        let mut batches = 0usize;
        loop {
            let fetched = {
                let _guard = self.lock.read();
                self.index_batch(fields, build)?
            };
            let Some(fetched) = fetched else {
                return Ok(false);
            };
            batches += 1;
            log::debug!(
                "Backfilled batch {} of {} documents into index on {}",
                batches,
                fetched,
                fields
            );
            if fetched < self.batch_size {
                break;
            }
        }

        let _guard = self.lock.write();
        let mut reconciled = 0usize;
        loop {
            let Some(fetched) = self.index_batch(fields, build)? else {
                return Ok(false);
            };
            reconciled += fetched;
            if fetched < self.batch_size {
                break;
            }
        }
        log::debug!("Reconciled {} late documents into index on {}", reconciled, fields);

        let descriptor = self.index_manager.set_state(fields, IndexState::Active)?;
        self.building.remove(fields);
        log::debug!("{} is active", descriptor);
        self.alert(CollectionEvents::IndexEnd, fields);
        Ok(true)
    }

    /// Indexes the next batch past the watermark and advances it. Returns the
    /// number of documents read, or `None` once the build has been dropped.
    fn index_batch(&self, fields: &Fields, build: u64) -> NitriteResult<Option<usize>> {
        if !self.is_current(fields, build) {
            return Ok(None);
        }
        let Some(record) = self.index_manager.find(fields) else {
            return Ok(None);
        };

        let batch = self
            .nitrite_map
            .entries_after(record.watermark.as_ref(), self.batch_size)?;
        let fetched = batch.len();
        let mut last = None;
        for (key, value) in batch {
            self.index_entry(&record, &key, value)?;
            last = Some(key);
        }
        if let Some(last) = last {
            self.index_manager.set_watermark(fields, last);
        }
        Ok(Some(fetched))
    }

    fn is_current(&self, fields: &Fields, build: u64) -> bool {
        self.building.get(fields).is_some_and(|entry| *entry == build)
    }

    fn index_entry(&self, record: &IndexRecord, key: &Value, value: Value) -> NitriteResult<()> {
        let Some(id) = key.as_nitrite_id().copied() else {
            log::warn!("Skipping entry with non-id key {} while indexing", key);
            return Ok(());
        };
        let Value::Document(stored) = value else {
            log::warn!("Skipping non-document entry {} while indexing", id);
            return Ok(());
        };

        let doc = self.processor_chain.process_after_read(stored)?;
        let field_values = FieldValues::extract(id, &doc, record.descriptor.fields())?;
        record.index.write(&field_values)
    }

    /// Removes the index and its entries. Fails when there is none.
    fn drop_existing(&self, fields: &Fields) -> NitriteResult<IndexRecord> {
        match self.index_manager.remove(fields)? {
            Some(record) => {
                record.index.drop_index()?;
                log::debug!("Dropped {}", record.descriptor);
                Ok(record)
            }
            None => {
                log::error!("No index found on {} in {}", fields, self.collection_name);
                Err(NitriteError::new(
                    &format!("No index found on {}", fields),
                    ErrorKind::IndexingError,
                ))
            }
        }
    }

    fn ensure_not_building(&self, fields: &Fields, action: &str) -> NitriteResult<()> {
        if self.building.contains_key(fields) {
            log::error!("Cannot {} index on {} while it is building", action, fields);
            return Err(NitriteError::new(
                &format!("Index on {} is already building", fields),
                ErrorKind::IndexingError,
            ));
        }
        Ok(())
    }

    fn alert(&self, event: CollectionEvents, fields: &Fields) {
        let item = match fields.to_value() {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Cannot describe fields {} for {:?} event: {}", fields, event, e);
                return;
            }
        };
        let info = CollectionEventInfo::new(Some(item), event, &self.collection_name);
        if let Err(e) = self.event_bus.publish(info) {
            log::warn!("Failed to publish {:?} event: {}", event, e);
        }
    }
}
