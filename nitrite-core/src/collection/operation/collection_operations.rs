use super::index_manager::IndexManager;
use super::index_operations::IndexOperations;
use super::index_writer::DocumentIndexWriter;
use super::read_operations::ReadOperations;
use super::write_operations::{ChangeSet, WriteOperations};
use crate::collection::{CollectionEventBus, CollectionEventInfo};
use crate::common::{AttributeAware, Attributes, LockHandle, Processor, ProcessorChain, OWNER};
use crate::errors::NitriteResult;
use crate::nitrite_config::NitriteConfig;
use crate::store::{NitriteMap, NitriteStore};
use std::sync::Arc;

/// Wires the read, write and index components of one collection together.
#[derive(Clone)]
pub(crate) struct CollectionOperations {
    inner: Arc<CollectionOperationsInner>,
}

struct CollectionOperationsInner {
    collection_name: String,
    nitrite_map: NitriteMap,
    store: NitriteStore,
    processor_chain: ProcessorChain,
    event_bus: CollectionEventBus,
    index_operations: IndexOperations,
    read_operations: ReadOperations,
    write_operations: WriteOperations,
}

impl CollectionOperations {
    pub fn new(
        collection_name: &str,
        nitrite_map: NitriteMap,
        nitrite_config: &NitriteConfig,
        lock: LockHandle,
    ) -> NitriteResult<Self> {
        let store = nitrite_config.nitrite_store()?;
        let processor_chain = ProcessorChain::new();
        let event_bus = CollectionEventBus::with_executor(nitrite_config.executor()?);
        let index_manager = IndexManager::new(collection_name, nitrite_config)?;

        let index_operations = IndexOperations::new(
            collection_name,
            index_manager.clone(),
            nitrite_map.clone(),
            lock,
            processor_chain.clone(),
            event_bus.clone(),
            nitrite_config.backfill_batch_size(),
        );
        let read_operations = ReadOperations::new(
            nitrite_map.clone(),
            index_operations.clone(),
            processor_chain.clone(),
        );
        let write_operations = WriteOperations::new(
            nitrite_map.clone(),
            DocumentIndexWriter::new(index_manager),
            read_operations.clone(),
            processor_chain.clone(),
        );

        let operations = CollectionOperations {
            inner: Arc::new(CollectionOperationsInner {
                collection_name: collection_name.to_string(),
                nitrite_map,
                store,
                processor_chain,
                event_bus,
                index_operations,
                read_operations,
                write_operations,
            }),
        };
        operations.init_attributes()?;
        Ok(operations)
    }

    pub fn index_operations(&self) -> &IndexOperations {
        &self.inner.index_operations
    }

    pub fn read_operations(&self) -> &ReadOperations {
        &self.inner.read_operations
    }

    pub fn event_bus(&self) -> &CollectionEventBus {
        &self.inner.event_bus
    }

    pub fn add_processor(&self, processor: Processor) {
        self.inner.processor_chain.add_processor(processor);
    }

    /// Runs a write. On failure everything it changed is undone; on success
    /// the store is committed when `commit` is set, then its events are
    /// published.
    pub fn write<R>(
        &self,
        commit: bool,
        op: impl FnOnce(&WriteOperations, &mut ChangeSet) -> NitriteResult<R>,
    ) -> NitriteResult<R> {
        let write_operations = &self.inner.write_operations;
        let mut changes = ChangeSet::default();

        let result = op(write_operations, &mut changes).and_then(|result| {
            if commit {
                self.inner.store.commit()?;
            }
            Ok(result)
        });

        match result {
            Ok(result) => {
                self.publish(changes.events);
                Ok(result)
            }
            Err(e) => {
                log::debug!(
                    "Rolling back {} changes in {} after: {}",
                    changes.undo.len(),
                    self.inner.collection_name,
                    e
                );
                write_operations.rollback(changes);
                Err(e)
            }
        }
    }

    /// Removes every document and index entry. Caller holds the write lock.
    pub fn clear(&self) -> NitriteResult<()> {
        self.inner.nitrite_map.clear()?;
        self.inner.index_operations.clear_entries()?;
        self.touch_attributes()
    }

    pub fn attributes(&self) -> NitriteResult<Option<Attributes>> {
        self.inner.nitrite_map.attributes()
    }

    pub fn set_attributes(&self, attributes: Attributes) -> NitriteResult<()> {
        self.inner.nitrite_map.set_attributes(attributes)
    }

    pub fn close(&self) -> NitriteResult<()> {
        self.inner.event_bus.close();
        self.inner.nitrite_map.close()
    }

    /// Deletes the documents, the indexes and the attributes of the collection.
    pub fn dispose(&self) -> NitriteResult<()> {
        self.inner.index_operations.dispose_all()?;
        self.inner.nitrite_map.dispose()?;
        self.inner.event_bus.close();
        Ok(())
    }

    fn publish(&self, events: Vec<CollectionEventInfo>) {
        for event in events {
            if let Err(e) = self.inner.event_bus.publish(event) {
                log::warn!("Failed to publish event in {}: {}", self.inner.collection_name, e);
            }
        }
    }

    fn init_attributes(&self) -> NitriteResult<()> {
        if self.inner.nitrite_map.attributes()?.is_none() {
            let attributes = Attributes::new_for_collection(&self.inner.collection_name);
            self.inner.nitrite_map.set_attributes(attributes)?;
        }
        Ok(())
    }

    fn touch_attributes(&self) -> NitriteResult<()> {
        let mut attributes = self
            .inner
            .nitrite_map
            .attributes()?
            .unwrap_or_else(|| Attributes::new_for_collection(&self.inner.collection_name));
        attributes.set(OWNER, &self.inner.collection_name);
        self.inner.nitrite_map.set_attributes(attributes)
    }
}
