use crate::collection::NitriteId;
use crate::common::Value;
use crate::errors::{ErrorKind, NitriteError, NitriteResult};
use crate::index::text::Tokenizer;
use crate::index::{decode_ids, encode_ids, FieldValues, IndexDescriptor, NitriteIndexProvider};
use crate::store::NitriteMap;
use std::collections::BTreeSet;

const PREFIX_SCAN_BATCH: usize = 64;

/// Inverted index from terms to the documents containing them.
pub(crate) struct TextIndex {
    descriptor: IndexDescriptor,
    index_map: NitriteMap,
    tokenizer: Tokenizer,
}

impl TextIndex {
    pub(crate) fn new(descriptor: IndexDescriptor, index_map: NitriteMap, tokenizer: Tokenizer) -> Self {
        TextIndex {
            descriptor,
            index_map,
            tokenizer,
        }
    }

    fn terms(&self, field_values: &FieldValues) -> NitriteResult<BTreeSet<String>> {
        let field = self.descriptor.fields().first();
        let mut terms = BTreeSet::new();
        match field_values.get_value(field) {
            Value::Null => {}
            Value::String(text) => terms.extend(self.tokenizer.tokenize(text)),
            Value::Array(items) => {
                for item in items {
                    match item {
                        Value::String(text) => terms.extend(self.tokenizer.tokenize(text)),
                        Value::Null => {}
                        other => return Err(not_text(field, other)),
                    }
                }
            }
            other => return Err(not_text(field, other)),
        }
        Ok(terms)
    }

    /// Ids posted under `term` and under every term starting with it.
    fn prefix_matches(&self, term: &str, ids: &mut BTreeSet<NitriteId>) -> NitriteResult<()> {
        let start = Value::from(term);
        ids.extend(decode_ids(self.index_map.get(&start)?));

        let mut cursor = start;
        loop {
            let batch = self.index_map.entries_after(Some(&cursor), PREFIX_SCAN_BATCH)?;
            let fetched = batch.len();
            for (key, entry) in batch {
                match key.as_string() {
                    Some(candidate) if candidate.starts_with(term) => {
                        ids.extend(decode_ids(Some(entry)));
                        cursor = key;
                    }
                    _ => return Ok(()),
                }
            }
            if fetched < PREFIX_SCAN_BATCH {
                return Ok(());
            }
        }
    }
}

fn not_text(field: &str, value: &Value) -> NitriteError {
    log::error!("Full-text index on {} cannot index non-text value {}", field, value);
    NitriteError::new(
        &format!("Full-text index on {} requires string values", field),
        ErrorKind::IndexingError,
    )
}

impl NitriteIndexProvider for TextIndex {
    fn descriptor(&self) -> IndexDescriptor {
        self.descriptor.clone()
    }

    fn write(&self, field_values: &FieldValues) -> NitriteResult<()> {
        let id = *field_values.nitrite_id();
        for term in self.terms(field_values)? {
            let key = Value::from(term);
            let mut ids = decode_ids(self.index_map.get(&key)?);
            if let Err(position) = ids.binary_search(&id) {
                ids.insert(position, id);
                self.index_map.put(key, encode_ids(&ids))?;
            }
        }
        Ok(())
    }

    fn remove(&self, field_values: &FieldValues) -> NitriteResult<()> {
        let id = *field_values.nitrite_id();
        for term in self.terms(field_values)? {
            let key = Value::from(term);
            let mut ids = decode_ids(self.index_map.get(&key)?);
            ids.retain(|existing| *existing != id);
            if ids.is_empty() {
                self.index_map.remove(&key)?;
            } else {
                self.index_map.put(key, encode_ids(&ids))?;
            }
        }
        Ok(())
    }

    fn lookup(&self, value: &Value) -> NitriteResult<Vec<NitriteId>> {
        let Some(query) = value.as_string() else {
            log::error!("Full-text query must be a string, got {}", value);
            return Err(NitriteError::new(
                "Full-text query must be a string",
                ErrorKind::IndexingError,
            ));
        };

        let mut ids = BTreeSet::new();
        for term in self.tokenizer.tokenize(query) {
            self.prefix_matches(&term, &mut ids)?;
        }
        Ok(ids.into_iter().collect())
    }

    fn drop_index(&self) -> NitriteResult<()> {
        self.index_map.clear()?;
        self.index_map.dispose()
    }
}
