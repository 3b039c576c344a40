use super::index_writer::DocumentIndexWriter;
use super::read_operations::ReadOperations;
use super::write_result::WriteResult;
use crate::collection::{CollectionEventInfo, CollectionEvents, Document, Filter, NitriteId};
use crate::common::{
    get_current_time_or_zero, ProcessorChain, Value, DOC_ID, DOC_MODIFIED, DOC_REVISION,
    DOC_SOURCE, REPLICATOR,
};
use crate::errors::{ErrorKind, NitriteError, NitriteResult};
use crate::store::NitriteMap;
use crate::transaction::JournalEntry;

/// What a write did so far: the events to publish once it succeeds, and
/// the prior stored value of every document it touched, so it can be undone
/// if it does not.
#[derive(Default)]
pub(crate) struct ChangeSet {
    pub(crate) events: Vec<CollectionEventInfo>,
    pub(crate) undo: Vec<(NitriteId, Option<Value>)>,
}

/// Document mutations of one collection. Callers hold the collection write
/// lock for the whole call and for the matching `rollback`.
#[derive(Clone)]
pub(crate) struct WriteOperations {
    nitrite_map: NitriteMap,
    index_writer: DocumentIndexWriter,
    read_operations: ReadOperations,
    processor_chain: ProcessorChain,
}

impl WriteOperations {
    pub fn new(
        nitrite_map: NitriteMap,
        index_writer: DocumentIndexWriter,
        read_operations: ReadOperations,
        processor_chain: ProcessorChain,
    ) -> Self {
        WriteOperations {
            nitrite_map,
            index_writer,
            read_operations,
            processor_chain,
        }
    }

    pub fn insert(&self, document: Document, changes: &mut ChangeSet) -> NitriteResult<NitriteId> {
        let mut document = document;
        let id = document.id()?;
        let key = Value::NitriteId(id);
        if self.nitrite_map.contains_key(&key)? {
            log::error!("Document already exists with id {}", id);
            return Err(NitriteError::new(
                &format!("Document already exists with id {}", id),
                ErrorKind::InvalidId,
            ));
        }

        let source = document.source();
        if source != REPLICATOR {
            document.put(DOC_REVISION, 1i64)?;
            document.put(DOC_MODIFIED, get_current_time_or_zero() as i64)?;
        }
        document.remove(DOC_SOURCE)?;

        let processed = self.processor_chain.process_before_write(document.clone())?;
        self.nitrite_map.put(key.clone(), Value::Document(processed))?;
        if let Err(e) = self.index_writer.maintain(id, None, Some(&document)) {
            self.nitrite_map.remove(&key)?;
            return Err(e);
        }

        changes.undo.push((id, None));
        changes.events.push(CollectionEventInfo::new(
            Some(Value::Document(document)),
            CollectionEvents::Insert,
            &source,
        ));
        Ok(id)
    }

    pub fn insert_many(
        &self,
        documents: Vec<Document>,
        changes: &mut ChangeSet,
    ) -> NitriteResult<WriteResult> {
        let mut ids = Vec::with_capacity(documents.len());
        for document in documents {
            ids.push(self.insert(document, changes)?);
        }
        Ok(WriteResult::new(ids))
    }

    /// Merges `update` into every document matching `filter`. With `upsert`
    /// and no match, inserts `update` as a new document.
    pub fn update(
        &self,
        filter: &Filter,
        update: &Document,
        upsert: bool,
        changes: &mut ChangeSet,
    ) -> NitriteResult<WriteResult> {
        let matches = self.read_operations.find_matches(filter)?;
        if matches.is_empty() {
            if upsert {
                let id = self.insert(update.clone(), changes)?;
                return Ok(WriteResult::new(vec![id]));
            }
            log::debug!("No document matched {} for update", filter);
            return Ok(WriteResult::default());
        }

        let update = strip_id(update)?;
        let mut ids = Vec::with_capacity(matches.len());
        for (id, existing) in matches {
            self.update_one(id, existing, &update, changes)?;
            ids.push(id);
        }
        Ok(WriteResult::new(ids))
    }

    pub fn update_by_id(
        &self,
        id: NitriteId,
        update: &Document,
        upsert: bool,
        changes: &mut ChangeSet,
    ) -> NitriteResult<WriteResult> {
        match self.read_operations.get_by_id(id)? {
            Some(existing) => {
                self.update_one(id, existing, &strip_id(update)?, changes)?;
                Ok(WriteResult::new(vec![id]))
            }
            None if upsert => {
                let mut document = update.clone();
                document.put(DOC_ID, id)?;
                let id = self.insert(document, changes)?;
                Ok(WriteResult::new(vec![id]))
            }
            None => Ok(WriteResult::default()),
        }
    }

    pub fn remove(
        &self,
        filter: &Filter,
        just_once: bool,
        changes: &mut ChangeSet,
    ) -> NitriteResult<WriteResult> {
        if filter.is_all() && just_once {
            log::error!("Cannot remove just one document with an all filter");
            return Err(NitriteError::new(
                "Cannot remove just one document with an all filter",
                ErrorKind::InvalidOperation,
            ));
        }

        let mut matches = self.read_operations.find_matches(filter)?;
        if just_once {
            matches.truncate(1);
        }

        let mut ids = Vec::with_capacity(matches.len());
        for (id, existing) in matches {
            self.remove_one(id, existing, changes)?;
            ids.push(id);
        }
        Ok(WriteResult::new(ids))
    }

    pub fn remove_by_id(&self, id: NitriteId, changes: &mut ChangeSet) -> NitriteResult<WriteResult> {
        match self.read_operations.get_by_id(id)? {
            Some(existing) => {
                self.remove_one(id, existing, changes)?;
                Ok(WriteResult::new(vec![id]))
            }
            None => Ok(WriteResult::default()),
        }
    }

    /// Applies a transaction journal in order.
    pub fn replay(&self, journal: &[JournalEntry], changes: &mut ChangeSet) -> NitriteResult<()> {
        for entry in journal {
            match entry {
                JournalEntry::Insert { document } => {
                    self.insert(document.clone(), changes)?;
                }
                JournalEntry::Update { id, update } => {
                    let result = self.update_by_id(*id, update, false, changes)?;
                    ensure_replayed(*id, &result)?;
                }
                JournalEntry::Remove { id } => {
                    let result = self.remove_by_id(*id, changes)?;
                    ensure_replayed(*id, &result)?;
                }
            }
        }
        Ok(())
    }

    /// Undoes a change set, newest change first. Failures are logged and the
    /// remaining changes are still undone.
    pub fn rollback(&self, changes: ChangeSet) {
        for (id, prior) in changes.undo.into_iter().rev() {
            if let Err(e) = self.restore(id, prior) {
                log::error!("Failed to roll back document {}: {}", id, e);
            }
        }
    }

    fn update_one(
        &self,
        id: NitriteId,
        existing: Document,
        update: &Document,
        changes: &mut ChangeSet,
    ) -> NitriteResult<()> {
        let key = Value::NitriteId(id);
        let prior = self.nitrite_map.get(&key)?;

        let mut document = existing.clone();
        document.merge(update);
        let source = document.source();
        if source != REPLICATOR {
            document.put(DOC_REVISION, existing.revision() + 1)?;
            document.put(DOC_MODIFIED, get_current_time_or_zero() as i64)?;
        }
        document.remove(DOC_SOURCE)?;

        let processed = self.processor_chain.process_before_write(document.clone())?;
        self.nitrite_map.put(key.clone(), Value::Document(processed))?;
        if let Err(e) = self.index_writer.maintain(id, Some(&existing), Some(&document)) {
            self.put_back(key, prior)?;
            return Err(e);
        }

        changes.undo.push((id, prior));
        changes.events.push(CollectionEventInfo::new(
            Some(Value::Document(document)),
            CollectionEvents::Update,
            &source,
        ));
        Ok(())
    }

    fn remove_one(
        &self,
        id: NitriteId,
        existing: Document,
        changes: &mut ChangeSet,
    ) -> NitriteResult<()> {
        let key = Value::NitriteId(id);
        let prior = self.nitrite_map.remove(&key)?;
        if let Err(e) = self.index_writer.maintain(id, Some(&existing), None) {
            self.put_back(key, prior)?;
            return Err(e);
        }

        let source = existing.source();
        changes.undo.push((id, prior));
        changes.events.push(CollectionEventInfo::new(
            Some(Value::Document(existing)),
            CollectionEvents::Remove,
            &source,
        ));
        Ok(())
    }

    /// Puts the stored value of `id` and its index entries back to `prior`.
    fn restore(&self, id: NitriteId, prior: Option<Value>) -> NitriteResult<()> {
        let current = self.read_operations.get_by_id(id)?;
        let previous = match prior.clone() {
            Some(value) => Some(self.read_operations.decode(value)?),
            None => None,
        };
        self.index_writer.maintain(id, current.as_ref(), previous.as_ref())?;
        self.put_back(Value::NitriteId(id), prior)
    }

    fn put_back(&self, key: Value, prior: Option<Value>) -> NitriteResult<()> {
        match prior {
            Some(value) => self.nitrite_map.put(key, value),
            None => self.nitrite_map.remove(&key).map(|_| ()),
        }
    }
}

/// A journaled update or remove must still find its document at commit time.
fn ensure_replayed(id: NitriteId, result: &WriteResult) -> NitriteResult<()> {
    if result.affected_count() == 0 {
        log::error!("Document {} was removed by another writer before commit", id);
        return Err(NitriteError::new(
            &format!("Document {} was removed by another writer before commit", id),
            ErrorKind::InvalidOperation,
        ));
    }
    Ok(())
}

/// The update document without its id; an update never moves a document.
fn strip_id(update: &Document) -> NitriteResult<Document> {
    let mut update = update.clone();
    update.remove(DOC_ID)?;
    Ok(update)
}
