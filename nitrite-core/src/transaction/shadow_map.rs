use crate::collection::{Document, NitriteId};
use std::collections::BTreeMap;

/// Transaction-private overlay over a collection.
///
/// An entry holding `None` is a tombstone: the document was removed inside
/// the transaction and must not show through from the collection.
#[derive(Debug, Default)]
pub(crate) struct ShadowMap {
    entries: BTreeMap<NitriteId, Option<Document>>,
}

impl ShadowMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when the transaction has not touched `id`, `Some(None)` when it
    /// removed it.
    pub fn get(&self, id: &NitriteId) -> Option<Option<&Document>> {
        self.entries.get(id).map(|entry| entry.as_ref())
    }

    pub fn put(&mut self, id: NitriteId, document: Document) {
        self.entries.insert(id, Some(document));
    }

    pub fn remove(&mut self, id: NitriteId) {
        self.entries.insert(id, None);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NitriteId, Option<&Document>)> {
        self.entries.iter().map(|(id, entry)| (id, entry.as_ref()))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
