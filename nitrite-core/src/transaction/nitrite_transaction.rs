use super::core::{JournalEntry, TransactionState};
use super::shadow_map::ShadowMap;
use crate::collection::{Document, DocumentCursor, Filter, NitriteCollection, NitriteId, WriteResult};
use crate::common::DOC_ID;
use crate::errors::{ErrorKind, NitriteError, NitriteResult};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use uuid::Uuid;

/// A unit of atomic work over one collection.
///
/// # Characteristics
/// - **Isolation**: writes land in a private shadow map; the collection and
///   other transactions do not see them before `commit`.
/// - **Read your writes**: `get_by_id`, `find` and `size` consult the shadow
///   map first and fall back to the collection.
/// - **Atomic commit**: the journal is replayed under the collection write
///   lock; a failure part way undoes everything already replayed.
/// - **No leaks**: a transaction dropped while still active is rolled back.
///
/// # Usage
/// ```ignore
/// let txn = collection.begin_transaction()?;
/// txn.insert(doc! { name: "a" })?;
/// txn.commit()?; // or txn.rollback()?
/// ```
pub struct NitriteTransaction {
    id: String,
    collection: NitriteCollection,
    inner: Mutex<TransactionInner>,
}

struct TransactionInner {
    state: TransactionState,
    shadow: ShadowMap,
    journal: Vec<JournalEntry>,
}

impl NitriteTransaction {
    pub(crate) fn new(collection: NitriteCollection) -> Self {
        let id = Uuid::new_v4().to_string();
        log::debug!("Began transaction {} on {}", id, collection.name());
        NitriteTransaction {
            id,
            collection,
            inner: Mutex::new(TransactionInner {
                state: TransactionState::Active,
                shadow: ShadowMap::new(),
                journal: Vec::new(),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> TransactionState {
        self.inner.lock().state
    }

    pub fn collection_name(&self) -> String {
        self.collection.name()
    }

    /// Number of operations waiting for commit.
    pub fn pending_operations(&self) -> usize {
        self.inner.lock().journal.len()
    }

    /// Inserts a document, assigning its id now.
    pub fn insert(&self, document: Document) -> NitriteResult<NitriteId> {
        let mut inner = self.inner.lock();
        check_active(&inner)?;

        let mut document = document;
        let id = document.id()?;
        if self.view(&inner, id)?.is_some() {
            log::error!("Document already exists with id {}", id);
            return Err(NitriteError::new(
                &format!("Document already exists with id {}", id),
                ErrorKind::InvalidId,
            ));
        }

        inner.shadow.put(id, document.clone());
        inner.journal.push(JournalEntry::Insert { document });
        Ok(id)
    }

    pub fn update_by_id(&self, id: NitriteId, update: &Document) -> NitriteResult<WriteResult> {
        let mut inner = self.inner.lock();
        check_active(&inner)?;

        match self.view(&inner, id)? {
            Some(existing) => {
                self.update_one(&mut inner, id, existing, update)?;
                Ok(WriteResult::new(vec![id]))
            }
            None => Ok(WriteResult::default()),
        }
    }

    /// Merges `update` into every document the transaction sees matching
    /// `filter`. With `upsert` and no match, `update` is inserted.
    pub fn update(&self, filter: Filter, update: &Document, upsert: bool) -> NitriteResult<WriteResult> {
        {
            let mut inner = self.inner.lock();
            check_active(&inner)?;

            let matches = self.matches(&inner, &filter)?;
            if !matches.is_empty() {
                let mut ids = Vec::with_capacity(matches.len());
                for (id, existing) in matches {
                    self.update_one(&mut inner, id, existing, update)?;
                    ids.push(id);
                }
                return Ok(WriteResult::new(ids));
            }
        }

        if upsert {
            let id = self.insert(update.clone())?;
            return Ok(WriteResult::new(vec![id]));
        }
        Ok(WriteResult::default())
    }

    pub fn remove_by_id(&self, id: NitriteId) -> NitriteResult<WriteResult> {
        let mut inner = self.inner.lock();
        check_active(&inner)?;

        if self.view(&inner, id)?.is_none() {
            return Ok(WriteResult::default());
        }
        inner.shadow.remove(id);
        inner.journal.push(JournalEntry::Remove { id });
        Ok(WriteResult::new(vec![id]))
    }

    pub fn remove(&self, filter: Filter) -> NitriteResult<WriteResult> {
        let mut inner = self.inner.lock();
        check_active(&inner)?;

        let mut ids = Vec::new();
        for (id, _) in self.matches(&inner, &filter)? {
            inner.shadow.remove(id);
            inner.journal.push(JournalEntry::Remove { id });
            ids.push(id);
        }
        Ok(WriteResult::new(ids))
    }

    pub fn get_by_id(&self, id: NitriteId) -> NitriteResult<Option<Document>> {
        let inner = self.inner.lock();
        check_active(&inner)?;
        self.view(&inner, id)
    }

    pub fn find(&self, filter: Filter) -> NitriteResult<DocumentCursor> {
        let inner = self.inner.lock();
        check_active(&inner)?;
        let documents = self
            .matches(&inner, &filter)?
            .into_iter()
            .map(|(_, doc)| doc)
            .collect();
        Ok(DocumentCursor::new(documents))
    }

    pub fn size(&self) -> NitriteResult<u64> {
        let inner = self.inner.lock();
        check_active(&inner)?;
        Ok(self.matches(&inner, &Filter::all())?.len() as u64)
    }

    /// Replays the journal against the collection and commits the store.
    ///
    /// # Errors
    /// If the replay fails the collection is restored, the transaction moves
    /// to [TransactionState::Failed] and the error is returned as the cause.
    pub fn commit(&self) -> NitriteResult<()> {
        let journal = {
            let mut inner = self.inner.lock();
            check_active(&inner)?;
            inner.state = TransactionState::PartiallyCommitted;
            std::mem::take(&mut inner.journal)
        };

        let result = self.collection.apply_journal(&journal);

        let mut inner = self.inner.lock();
        inner.shadow.clear();
        match result {
            Ok(()) => {
                inner.state = TransactionState::Committed;
                log::debug!("Committed transaction {} with {} operations", self.id, journal.len());
                Ok(())
            }
            Err(e) => {
                inner.state = TransactionState::Failed;
                log::error!("Transaction {} failed to commit: {}", self.id, e);
                Err(NitriteError::new_with_cause(
                    "Transaction failed to commit",
                    e.kind().clone(),
                    e,
                ))
            }
        }
    }

    /// Discards every pending operation. The collection is untouched.
    pub fn rollback(&self) -> NitriteResult<()> {
        let mut inner = self.inner.lock();
        check_active(&inner)?;
        discard(&mut inner);
        inner.state = TransactionState::Aborted;
        log::debug!("Rolled back transaction {}", self.id);
        Ok(())
    }

    /// Ends the transaction. An active transaction is rolled back first.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if inner.state == TransactionState::Active {
            log::debug!("Closing active transaction {}, rolling back", self.id);
        }
        discard(&mut inner);
        inner.state = TransactionState::Closed;
    }

    fn update_one(
        &self,
        inner: &mut TransactionInner,
        id: NitriteId,
        existing: Document,
        update: &Document,
    ) -> NitriteResult<()> {
        let mut update = update.clone();
        update.remove(DOC_ID)?;

        let mut document = existing;
        document.merge(&update);
        inner.shadow.put(id, document);
        inner.journal.push(JournalEntry::Update { id, update });
        Ok(())
    }

    /// The document as this transaction sees it.
    fn view(&self, inner: &TransactionInner, id: NitriteId) -> NitriteResult<Option<Document>> {
        match inner.shadow.get(&id) {
            Some(entry) => Ok(entry.cloned()),
            None => self.collection.get_by_id(id),
        }
    }

    fn matches(
        &self,
        inner: &TransactionInner,
        filter: &Filter,
    ) -> NitriteResult<Vec<(NitriteId, Document)>> {
        let mut matches = BTreeMap::new();
        for document in self.collection.find(filter.clone())? {
            if let Some(id) = document.existing_id() {
                matches.insert(id, document);
            }
        }

        for (id, entry) in inner.shadow.iter() {
            matches.remove(id);
            if let Some(document) = entry {
                if filter.apply(document)? {
                    matches.insert(*id, document.clone());
                }
            }
        }
        Ok(matches.into_iter().collect())
    }
}

impl Drop for NitriteTransaction {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if inner.state == TransactionState::Active {
            log::debug!(
                "Transaction {} dropped with {} pending operations, rolling back",
                self.id,
                inner.journal.len()
            );
            discard(inner);
            inner.state = TransactionState::Aborted;
        }
    }
}

fn check_active(inner: &TransactionInner) -> NitriteResult<()> {
    if inner.state != TransactionState::Active {
        log::error!("Transaction is not active, state is {:?}", inner.state);
        return Err(NitriteError::new(
            "Transaction is not active",
            ErrorKind::InvalidOperation,
        ));
    }
    Ok(())
}

fn discard(inner: &mut TransactionInner) {
    inner.shadow.clear();
    inner.journal.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Value;
    use crate::doc;
    use crate::index::IndexKind;
    use crate::nitrite::Nitrite;

    fn open() -> (Nitrite, NitriteCollection) {
        let db = Nitrite::builder().event_workers(1).open_or_create().unwrap();
        let collection = db.collection("txn").unwrap();
        (db, collection)
    }

    #[test]
    fn test_commit_applies_everything() {
        let (db, collection) = open();
        collection.create_index(vec!["name"], IndexKind::Unique).unwrap();
        let existing = collection.insert(doc! { name: "old" }).unwrap().first().unwrap();

        let txn = collection.begin_transaction().unwrap();
        assert_eq!(txn.state(), TransactionState::Active);
        assert!(!txn.id().is_empty());

        let ids: Vec<NitriteId> = (0..5)
            .map(|i| txn.insert(doc! { name: (format!("n{}", i)) }).unwrap())
            .collect();
        txn.update_by_id(existing, &doc! { name: "renamed" }).unwrap();
        assert_eq!(txn.size().unwrap(), 6);
        assert_eq!(collection.size().unwrap(), 1);
        assert_eq!(txn.pending_operations(), 6);

        txn.commit().unwrap();
        assert_eq!(txn.state(), TransactionState::Committed);
        assert_eq!(collection.size().unwrap(), 6);
        for (i, id) in ids.iter().enumerate() {
            let found = collection
                .lookup(vec!["name"], &Value::from(format!("n{}", i)))
                .unwrap();
            assert_eq!(found, vec![*id]);
        }
        assert_eq!(
            collection.lookup(vec!["name"], &Value::from("renamed")).unwrap(),
            vec![existing]
        );
        db.close().unwrap();
    }

    #[test]
    fn test_rollback_leaves_collection_untouched() {
        let (db, collection) = open();
        collection.create_index(vec!["name"], IndexKind::NonUnique).unwrap();
        let txn = collection.begin_transaction().unwrap();
        for i in 0..3 {
            txn.insert(doc! { name: (format!("n{}", i)) }).unwrap();
        }

        txn.rollback().unwrap();
        assert_eq!(txn.state(), TransactionState::Aborted);
        assert_eq!(collection.size().unwrap(), 0);
        assert!(collection.lookup(vec!["name"], &Value::from("n0")).unwrap().is_empty());

        let err = txn.insert(doc! { name: "late" }).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
        assert!(txn.commit().is_err());
        db.close().unwrap();
    }

    #[test]
    fn test_reads_see_own_writes() {
        let (db, collection) = open();
        let kept = collection.insert(doc! { kind: "a" }).unwrap().first().unwrap();
        let removed = collection.insert(doc! { kind: "a" }).unwrap().first().unwrap();

        let txn = collection.begin_transaction().unwrap();
        txn.remove_by_id(removed).unwrap();
        txn.insert(doc! { kind: "a" }).unwrap();
        txn.update_by_id(kept, &doc! { kind: "b" }).unwrap();

        assert!(txn.get_by_id(removed).unwrap().is_none());
        assert!(collection.get_by_id(removed).unwrap().is_some());
        assert_eq!(txn.find(Filter::eq("kind", "a")).unwrap().size(), 1);
        assert_eq!(txn.find(Filter::eq("kind", "b")).unwrap().size(), 1);
        assert_eq!(collection.find(Filter::eq("kind", "a")).unwrap().size(), 2);

        // a removed id may be reused inside the same transaction
        txn.insert(doc! { _id: (removed), kind: "c" }).unwrap();
        assert_eq!(txn.size().unwrap(), 3);
        txn.commit().unwrap();

        let stored = collection.get_by_id(removed).unwrap().unwrap();
        assert_eq!(stored.get("kind").unwrap(), Value::from("c"));
        db.close().unwrap();
    }

    #[test]
    fn test_duplicate_id_inside_transaction() {
        let (db, collection) = open();
        collection.insert(doc! { _id: 1, name: "a" }).unwrap();
        let txn = collection.begin_transaction().unwrap();

        let err = txn.insert(doc! { _id: 1, name: "b" }).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidId);
        txn.insert(doc! { _id: 2, name: "b" }).unwrap();
        assert!(txn.insert(doc! { _id: 2, name: "c" }).is_err());
        txn.close();
        assert_eq!(txn.state(), TransactionState::Closed);
        assert_eq!(collection.size().unwrap(), 1);
        db.close().unwrap();
    }

    #[test]
    fn test_failed_commit_restores_collection() {
        let (db, collection) = open();
        collection.create_index(vec!["email"], IndexKind::Unique).unwrap();
        let before = collection.insert(doc! { email: "b@x.org" }).unwrap().first().unwrap();

        let txn = collection.begin_transaction().unwrap();
        txn.insert(doc! { email: "a@x.org" }).unwrap();
        txn.remove_by_id(before).unwrap();

        // another writer takes the value first
        collection.insert(doc! { email: "a@x.org" }).unwrap();

        let err = txn.commit().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::IndexingError);
        assert!(err.cause().is_some());
        assert_eq!(txn.state(), TransactionState::Failed);

        assert_eq!(collection.size().unwrap(), 2);
        assert!(collection.get_by_id(before).unwrap().is_some());
        assert_eq!(collection.lookup(vec!["email"], &Value::from("a@x.org")).unwrap().len(), 1);
        db.close().unwrap();
    }

    #[test]
    fn test_update_with_upsert() {
        let (db, collection) = open();
        let txn = collection.begin_transaction().unwrap();
        let result = txn
            .update(Filter::eq("name", "x"), &doc! { name: "x", n: 1 }, true)
            .unwrap();
        assert_eq!(result.affected_count(), 1);

        let result = txn
            .update(Filter::eq("name", "x"), &doc! { n: 2 }, false)
            .unwrap();
        assert_eq!(result.affected_count(), 1);
        let removed = txn.remove(Filter::eq("n", 5)).unwrap();
        assert_eq!(removed.affected_count(), 0);

        txn.commit().unwrap();
        let stored = collection.find(Filter::eq("name", "x")).unwrap().first().unwrap();
        assert_eq!(stored.get("n").unwrap(), Value::from(2));
        assert_eq!(stored.revision(), 2);
        db.close().unwrap();
    }

    #[test]
    fn test_drop_rolls_back() {
        let (db, collection) = open();
        {
            let txn = collection.begin_transaction().unwrap();
            txn.insert(doc! { name: "leak" }).unwrap();
        }
        assert_eq!(collection.size().unwrap(), 0);
        db.close().unwrap();
    }
}
