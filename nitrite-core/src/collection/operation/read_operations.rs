use super::index_operations::IndexOperations;
use crate::collection::{Document, DocumentCursor, Filter, FilterPlan, NitriteId};
use crate::common::{Fields, ProcessorChain, Value};
use crate::errors::{ErrorKind, NitriteError, NitriteResult};
use crate::index::IndexKind;
use crate::store::NitriteMap;

#[derive(Clone)]
pub(crate) struct ReadOperations {
    nitrite_map: NitriteMap,
    index_operations: IndexOperations,
    processor_chain: ProcessorChain,
}

impl ReadOperations {
    pub fn new(
        nitrite_map: NitriteMap,
        index_operations: IndexOperations,
        processor_chain: ProcessorChain,
    ) -> Self {
        ReadOperations {
            nitrite_map,
            index_operations,
            processor_chain,
        }
    }

    /// The logical document stored under `id`.
    pub fn get_by_id(&self, id: NitriteId) -> NitriteResult<Option<Document>> {
        match self.nitrite_map.get(&Value::NitriteId(id))? {
            Some(value) => Ok(Some(self.decode(value)?)),
            None => Ok(None),
        }
    }

    pub fn find(&self, filter: &Filter) -> NitriteResult<DocumentCursor> {
        let documents = self
            .find_matches(filter)?
            .into_iter()
            .map(|(_, doc)| doc)
            .collect();
        Ok(DocumentCursor::new(documents))
    }

    /// Every matching document with its id, in ascending id order.
    pub fn find_matches(&self, filter: &Filter) -> NitriteResult<Vec<(NitriteId, Document)>> {
        match filter.plan() {
            FilterPlan::ById(id) => {
                let mut matches = Vec::new();
                if let Some(doc) = self.get_by_id(id)? {
                    if filter.apply(&doc)? {
                        matches.push((id, doc));
                    }
                }
                Ok(matches)
            }
            FilterPlan::Eq { field, value } if !value.is_array() => {
                let fields = Fields::with_names(vec![field])?;
                let indexed = self.index_operations.is_indexed_with(&fields, IndexKind::Unique)
                    || self.index_operations.is_indexed_with(&fields, IndexKind::NonUnique);
                if indexed {
                    let ids = self.index_operations.lookup(&fields, value)?;
                    self.fetch(ids, Some(filter))
                } else {
                    self.scan(filter)
                }
            }
            FilterPlan::Text { field, query } => {
                let fields = Fields::with_names(vec![field])?;
                if !self.index_operations.is_indexed_with(&fields, IndexKind::FullText) {
                    log::error!("{} is not full-text indexed", field);
                    return Err(NitriteError::new(
                        &format!("{} is not full-text indexed", field),
                        ErrorKind::IndexingError,
                    ));
                }
                let ids = self.index_operations.lookup(&fields, &Value::from(query))?;
                self.fetch(ids, None)
            }
            _ => self.scan(filter),
        }
    }

    pub fn size(&self) -> NitriteResult<u64> {
        self.nitrite_map.size()
    }

    /// Loads the documents of an index lookup. Ids with no document are
    /// skipped.
    fn fetch(
        &self,
        ids: Vec<NitriteId>,
        confirm: Option<&Filter>,
    ) -> NitriteResult<Vec<(NitriteId, Document)>> {
        let mut matches = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(doc) = self.get_by_id(id)? else {
                log::warn!("Index points to missing document {}", id);
                continue;
            };
            if let Some(filter) = confirm {
                if !filter.apply(&doc)? {
                    continue;
                }
            }
            matches.push((id, doc));
        }
        Ok(matches)
    }

    fn scan(&self, filter: &Filter) -> NitriteResult<Vec<(NitriteId, Document)>> {
        let mut matches = Vec::new();
        for entry in self.nitrite_map.entries() {
            let (key, value) = entry?;
            let Some(id) = key.as_nitrite_id().copied() else {
                log::warn!("Skipping entry with non-id key {}", key);
                continue;
            };
            let doc = self.decode(value)?;
            if filter.apply(&doc)? {
                matches.push((id, doc));
            }
        }
        Ok(matches)
    }

    pub fn decode(&self, value: Value) -> NitriteResult<Document> {
        match value {
            Value::Document(doc) => self.processor_chain.process_after_read(doc),
            other => {
                log::error!("Stored value {} is not a document", other);
                Err(NitriteError::new(
                    "Stored value is not a document",
                    ErrorKind::IOError,
                ))
            }
        }
    }
}
