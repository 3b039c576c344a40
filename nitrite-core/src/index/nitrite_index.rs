use crate::collection::NitriteId;
use crate::common::Value;
use crate::errors::NitriteResult;
use crate::index::{FieldValues, IndexDescriptor};
use std::ops::Deref;
use std::sync::Arc;

/// Capabilities every index kind provides.
///
/// `write` and `remove` are called with the collection write lock held, so
/// an implementation may read-modify-write its entries without further
/// synchronization.
pub trait NitriteIndexProvider: Send + Sync {
    fn descriptor(&self) -> IndexDescriptor;

    /// Adds entries for the document. A unique index fails with
    /// `IndexingError` when another document already holds the value, and
    /// then leaves its entries untouched.
    fn write(&self, field_values: &FieldValues) -> NitriteResult<()>;

    /// Removes the document's entries. Missing entries are ignored.
    fn remove(&self, field_values: &FieldValues) -> NitriteResult<()>;

    /// Ids of the documents matching `value`, in ascending order.
    fn lookup(&self, value: &Value) -> NitriteResult<Vec<NitriteId>>;

    /// Deletes every entry along with the backing map.
    fn drop_index(&self) -> NitriteResult<()>;
}

#[derive(Clone)]
pub struct NitriteIndex {
    inner: Arc<dyn NitriteIndexProvider>,
}

impl NitriteIndex {
    pub fn new<T: NitriteIndexProvider + 'static>(inner: T) -> Self {
        NitriteIndex {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for NitriteIndex {
    type Target = Arc<dyn NitriteIndexProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Reads the id list stored under one index key.
pub(crate) fn decode_ids(entry: Option<Value>) -> Vec<NitriteId> {
    match entry {
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(|v| v.as_nitrite_id().copied())
            .collect(),
        Some(other) => {
            log::warn!("Ignoring malformed index entry {}", other);
            Vec::new()
        }
        None => Vec::new(),
    }
}

pub(crate) fn encode_ids(ids: &[NitriteId]) -> Value {
    Value::Array(ids.iter().map(|id| Value::NitriteId(*id)).collect())
}
