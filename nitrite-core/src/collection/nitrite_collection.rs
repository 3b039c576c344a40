use super::operation::{ChangeSet, CollectionOperations, WriteOperations, WriteResult};
use super::{
    CollectionEventInfo, CollectionEventListener, Document, DocumentCursor, Filter, NitriteId,
};
use crate::common::{
    Attributes, EventSubscription, Fields, LockHandle, Processor, SubscriberRef, Value,
};
use crate::errors::{ErrorKind, NitriteError, NitriteResult};
use crate::index::{IndexDescriptor, IndexKind};
use crate::nitrite_config::NitriteConfig;
use crate::store::NitriteStore;
use crate::transaction::{JournalEntry, NitriteTransaction};
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A named set of documents with its indexes and change listeners.
///
/// Handles are cheap to clone and all refer to the same collection. Every
/// write runs under the collection write lock and either applies fully,
/// index entries included, or leaves no trace. Reads run under the read
/// lock and return independent copies.
///
/// # Examples
///
/// ```rust,ignore
/// let users = db.collection("users")?;
/// users.create_index(vec!["email"], IndexKind::Unique)?;
/// let id = users.insert(doc! { name: "Alice", email: "alice@x.org" })?.first();
/// let found = users.find(Filter::eq("email", "alice@x.org"))?;
/// assert_eq!(found.size(), 1);
/// ```
#[derive(Clone)]
pub struct NitriteCollection {
    inner: Arc<NitriteCollectionInner>,
}

struct NitriteCollectionInner {
    name: String,
    lock: LockHandle,
    store: NitriteStore,
    operations: CollectionOperations,
    closed: AtomicBool,
    dropped: AtomicBool,
}

impl NitriteCollection {
    /// Opens the collection, loading its attributes and indexes and
    /// finishing any index build that was interrupted.
    pub(crate) fn open(name: &str, nitrite_config: &NitriteConfig) -> NitriteResult<Self> {
        let store = nitrite_config.nitrite_store()?;
        let lock = nitrite_config.lock_service().get_lock(name);
        let nitrite_map = store.open_map(name)?;
        let operations =
            CollectionOperations::new(name, nitrite_map, nitrite_config, lock.clone())?;
        operations.index_operations().recover()?;

        log::debug!("Opened collection {}", name);
        Ok(NitriteCollection {
            inner: Arc::new(NitriteCollectionInner {
                name: name.to_string(),
                lock,
                store,
                operations,
                closed: AtomicBool::new(false),
                dropped: AtomicBool::new(false),
            }),
        })
    }

    pub fn name(&self) -> String {
        self.inner.name.clone()
    }

    /// Inserts a document and returns its id. A document without `_id` gets
    /// a generated one; an `_id` already in the collection is rejected with
    /// [ErrorKind::InvalidId].
    pub fn insert(&self, document: Document) -> NitriteResult<WriteResult> {
        self.write(|ops, changes| {
            let id = ops.insert(document, changes)?;
            Ok(WriteResult::new(vec![id]))
        })
    }

    /// Inserts every document or none of them.
    pub fn insert_many(&self, documents: Vec<Document>) -> NitriteResult<WriteResult> {
        self.write(|ops, changes| ops.insert_many(documents, changes))
    }

    /// Merges `update` into every document matching `filter`. The `_id` of
    /// `update` is ignored. With `upsert` and no match, `update` is inserted.
    pub fn update(&self, filter: Filter, update: &Document, upsert: bool) -> NitriteResult<WriteResult> {
        self.write(|ops, changes| ops.update(&filter, update, upsert, changes))
    }

    pub fn update_by_id(
        &self,
        id: NitriteId,
        update: &Document,
        upsert: bool,
    ) -> NitriteResult<WriteResult> {
        self.write(|ops, changes| ops.update_by_id(id, update, upsert, changes))
    }

    pub fn remove(&self, filter: Filter, just_once: bool) -> NitriteResult<WriteResult> {
        self.write(|ops, changes| ops.remove(&filter, just_once, changes))
    }

    pub fn remove_by_id(&self, id: NitriteId) -> NitriteResult<WriteResult> {
        self.write(|ops, changes| ops.remove_by_id(id, changes))
    }

    pub fn get_by_id(&self, id: NitriteId) -> NitriteResult<Option<Document>> {
        let _guard = self.inner.lock.read();
        self.ensure_opened()?;
        self.inner.operations.read_operations().get_by_id(id)
    }

    pub fn find(&self, filter: Filter) -> NitriteResult<DocumentCursor> {
        let _guard = self.inner.lock.read();
        self.ensure_opened()?;
        self.inner.operations.read_operations().find(&filter)
    }

    pub fn size(&self) -> NitriteResult<u64> {
        let _guard = self.inner.lock.read();
        self.ensure_opened()?;
        self.inner.operations.read_operations().size()
    }

    /// Removes every document and every index entry; index definitions stay.
    pub fn clear(&self) -> NitriteResult<()> {
        let _guard = self.inner.lock.write();
        self.ensure_opened()?;
        self.inner.operations.clear()
    }

    /// Creates an index and fills it from the existing documents.
    ///
    /// Writes keep running while the index builds. A unique index fails
    /// with [ErrorKind::IndexingError] when the data already violates it,
    /// and nothing of the partial index is kept.
    pub fn create_index(&self, field_names: Vec<&str>, kind: IndexKind) -> NitriteResult<()> {
        self.ensure_opened()?;
        let fields = Fields::with_names(field_names)?;
        self.inner.operations.index_operations().create_index(&fields, kind)
    }

    pub fn rebuild_index(&self, field_names: Vec<&str>) -> NitriteResult<()> {
        self.ensure_opened()?;
        let fields = Fields::with_names(field_names)?;
        self.inner.operations.index_operations().rebuild_index(&fields)
    }

    pub fn drop_index(&self, field_names: Vec<&str>) -> NitriteResult<()> {
        self.ensure_opened()?;
        let fields = Fields::with_names(field_names)?;
        self.inner.operations.index_operations().drop_index(&fields)
    }

    pub fn drop_all_indexes(&self) -> NitriteResult<()> {
        self.ensure_opened()?;
        self.inner.operations.index_operations().drop_all()
    }

    pub fn list_indexes(&self) -> NitriteResult<Vec<IndexDescriptor>> {
        let _guard = self.inner.lock.read();
        self.ensure_opened()?;
        Ok(self.inner.operations.index_operations().list_indexes())
    }

    pub fn has_index(&self, field_names: Vec<&str>) -> NitriteResult<bool> {
        self.ensure_opened()?;
        let fields = Fields::with_names(field_names)?;
        Ok(self.inner.operations.index_operations().has_index(&fields))
    }

    /// `true` when an active index of `kind` covers exactly these fields,
    /// so a lookup can replace a scan.
    pub fn is_indexed_with(&self, field_names: Vec<&str>, kind: IndexKind) -> NitriteResult<bool> {
        self.ensure_opened()?;
        let fields = Fields::with_names(field_names)?;
        Ok(self.inner.operations.index_operations().is_indexed_with(&fields, kind))
    }

    pub fn is_indexing(&self, field_names: Vec<&str>) -> NitriteResult<bool> {
        self.ensure_opened()?;
        let fields = Fields::with_names(field_names)?;
        Ok(self.inner.operations.index_operations().is_indexing(&fields))
    }

    /// Ids indexed under `value`. A compound index takes a `Value::Array`
    /// with one component per field; a full-text index takes the query text.
    pub fn lookup(&self, field_names: Vec<&str>, value: &Value) -> NitriteResult<Vec<NitriteId>> {
        let _guard = self.inner.lock.read();
        self.ensure_opened()?;
        let fields = Fields::with_names(field_names)?;
        self.inner.operations.index_operations().lookup(&fields, value)
    }

    pub fn subscribe(&self, listener: CollectionEventListener) -> NitriteResult<SubscriberRef> {
        self.ensure_opened()?;
        self.inner.operations.event_bus().register(listener)
    }

    pub fn unsubscribe(&self, subscriber: SubscriberRef) -> NitriteResult<()> {
        self.ensure_opened()?;
        self.inner.operations.event_bus().deregister(subscriber)
    }

    /// Subscribes for as long as the returned guard lives.
    pub fn subscribe_scoped(
        &self,
        listener: CollectionEventListener,
    ) -> NitriteResult<EventSubscription<CollectionEventInfo, CollectionEventListener>> {
        self.ensure_opened()?;
        self.inner.operations.event_bus().register_scoped(listener)
    }

    pub fn add_processor(&self, processor: Processor) -> NitriteResult<()> {
        let _guard = self.inner.lock.write();
        self.ensure_opened()?;
        self.inner.operations.add_processor(processor);
        Ok(())
    }

    pub fn attributes(&self) -> NitriteResult<Option<Attributes>> {
        let _guard = self.inner.lock.read();
        self.ensure_opened()?;
        self.inner.operations.attributes()
    }

    pub fn set_attributes(&self, attributes: Attributes) -> NitriteResult<()> {
        let _guard = self.inner.lock.write();
        self.ensure_opened()?;
        self.inner.operations.set_attributes(attributes)
    }

    pub fn is_open(&self) -> bool {
        !self.inner.closed.load(Ordering::SeqCst)
            && !self.inner.dropped.load(Ordering::SeqCst)
            && !self.inner.store.is_closed().unwrap_or(true)
    }

    pub fn is_dropped(&self) -> bool {
        self.inner.dropped.load(Ordering::SeqCst)
    }

    /// Releases the handle and its listeners; the data stays in the store.
    /// Closing twice, or closing a dropped collection, does nothing.
    pub fn close(&self) -> NitriteResult<()> {
        let _guard = self.inner.lock.write();
        if self.is_dropped() || self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.inner.operations.close()?;
        log::debug!("Closed collection {}", self.inner.name);
        Ok(())
    }

    /// Deletes the collection with its indexes and attributes. Every later
    /// operation on any handle to it fails with [ErrorKind::CollectionDropped].
    pub fn dispose(&self) -> NitriteResult<()> {
        let _guard = self.inner.lock.write();
        self.ensure_opened()?;
        self.inner.operations.dispose()?;
        self.inner.dropped.store(true, Ordering::SeqCst);
        self.inner.closed.store(true, Ordering::SeqCst);
        log::debug!("Dropped collection {}", self.inner.name);
        Ok(())
    }

    /// Starts a transaction over this collection.
    pub fn begin_transaction(&self) -> NitriteResult<NitriteTransaction> {
        self.ensure_opened()?;
        Ok(NitriteTransaction::new(self.clone()))
    }

    /// Applies a transaction journal atomically and commits the store.
    pub(crate) fn apply_journal(&self, journal: &[JournalEntry]) -> NitriteResult<()> {
        let _guard = self.inner.lock.write();
        self.ensure_opened()?;
        self.inner
            .operations
            .write(true, |ops, changes| ops.replay(journal, changes))
    }

    fn write<R>(
        &self,
        op: impl FnOnce(&WriteOperations, &mut ChangeSet) -> NitriteResult<R>,
    ) -> NitriteResult<R> {
        let _guard = self.inner.lock.write();
        self.ensure_opened()?;
        self.inner.operations.write(false, op)
    }

    fn ensure_opened(&self) -> NitriteResult<()> {
        if self.inner.dropped.load(Ordering::SeqCst) {
            log::error!("Collection {} has been dropped", self.inner.name);
            return Err(NitriteError::new(
                &format!("Collection {} has been dropped", self.inner.name),
                ErrorKind::CollectionDropped,
            ));
        }

        if self.inner.store.is_closed()? {
            log::error!("Store is closed, cannot access collection {}", self.inner.name);
            return Err(NitriteError::new(
                "Store is closed",
                ErrorKind::StoreClosed,
            ));
        }

        if self.inner.closed.load(Ordering::SeqCst) {
            log::error!("Collection {} is closed", self.inner.name);
            return Err(NitriteError::new(
                &format!("Collection {} is closed", self.inner.name),
                ErrorKind::CollectionClosed,
            ));
        }
        Ok(())
    }
}

impl Debug for NitriteCollection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NitriteCollection")
            .field("name", &self.inner.name)
            .field("closed", &self.inner.closed.load(Ordering::Relaxed))
            .field("dropped", &self.inner.dropped.load(Ordering::Relaxed))
            .finish()
    }
}
