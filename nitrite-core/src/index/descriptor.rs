use crate::collection::Document;
use crate::common::{
    Convertible, Fields, Value, TAG_COLLECTION, TAG_FIELDS, TAG_INDEX_KIND, TAG_INDEX_STATE,
};
use crate::errors::{ErrorKind, NitriteError, NitriteResult};
use crate::index::{IndexKind, IndexState};
use std::fmt::Display;

/// Identifies one index: the collection, the indexed fields and the kind,
/// plus the lifecycle state it was last persisted with.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IndexDescriptor {
    collection: String,
    fields: Fields,
    kind: IndexKind,
    state: IndexState,
}

impl IndexDescriptor {
    pub fn new(collection: &str, fields: Fields, kind: IndexKind) -> Self {
        IndexDescriptor {
            collection: collection.to_string(),
            fields,
            kind,
            state: IndexState::Building,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    pub fn state(&self) -> IndexState {
        self.state
    }

    pub fn is_compound(&self) -> bool {
        self.fields.is_compound()
    }

    pub(crate) fn with_state(&self, state: IndexState) -> Self {
        IndexDescriptor {
            state,
            ..self.clone()
        }
    }
}

impl Display for IndexDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} index on {}{} ({})",
            self.kind, self.collection, self.fields, self.state
        )
    }
}

fn required_string(doc: &Document, key: &str) -> NitriteResult<String> {
    match doc.get(key)? {
        Value::String(s) => Ok(s),
        other => {
            log::error!("Index descriptor field {} is malformed: {}", key, other);
            Err(NitriteError::new(
                &format!("Index descriptor field {} is malformed", key),
                ErrorKind::IndexingError,
            ))
        }
    }
}

impl Convertible for IndexDescriptor {
    type Output = Self;

    fn to_value(&self) -> NitriteResult<Value> {
        let mut doc = Document::new();
        doc.put(TAG_COLLECTION, self.collection.as_str())?;
        doc.put(TAG_FIELDS, self.fields.to_value()?)?;
        doc.put(TAG_INDEX_KIND, self.kind.as_str())?;
        doc.put(TAG_INDEX_STATE, self.state.as_str())?;
        Ok(Value::Document(doc))
    }

    fn from_value(value: &Value) -> NitriteResult<Self::Output> {
        let Some(doc) = value.as_document() else {
            log::error!("Index descriptor {} is not a document", value);
            return Err(NitriteError::new(
                "Index descriptor is not a document",
                ErrorKind::IndexingError,
            ));
        };

        let collection = required_string(doc, TAG_COLLECTION)?;
        let fields = Fields::from_value(&doc.get(TAG_FIELDS)?)?;
        let kind = required_string(doc, TAG_INDEX_KIND)?.parse::<IndexKind>()?;
        let state = required_string(doc, TAG_INDEX_STATE)?.parse::<IndexState>()?;

        Ok(IndexDescriptor {
            collection,
            fields,
            kind,
            state,
        })
    }
}
