use crate::collection::NitriteId;
use crate::common::Value;
use crate::errors::{ErrorKind, NitriteError, NitriteResult};
use crate::index::{decode_ids, encode_ids, FieldValues, IndexDescriptor, IndexKind, NitriteIndexProvider};
use crate::store::NitriteMap;
use itertools::Itertools;

/// Unique or non-unique index over one field or a compound field set.
///
/// A single-field index keys on the field value, or on each distinct
/// element when the value is an array. A compound index keys on a
/// `Value::Array` holding one component per field, in field order, and
/// does not accept array components.
pub(crate) struct ComparableIndex {
    descriptor: IndexDescriptor,
    index_map: NitriteMap,
}

impl ComparableIndex {
    pub(crate) fn new(descriptor: IndexDescriptor, index_map: NitriteMap) -> Self {
        ComparableIndex {
            descriptor,
            index_map,
        }
    }

    fn is_unique(&self) -> bool {
        self.descriptor.kind() == IndexKind::Unique
    }

    fn keys(&self, field_values: &FieldValues) -> NitriteResult<Vec<Value>> {
        if self.descriptor.is_compound() {
            let mut components = Vec::with_capacity(self.descriptor.fields().len());
            for (name, value) in self
                .descriptor
                .fields()
                .field_names()
                .iter()
                .zip(field_values.values())
            {
                if value.is_array() {
                    log::error!(
                        "Compound index on {} cannot index array field {}",
                        self.descriptor.fields(),
                        name
                    );
                    return Err(NitriteError::new(
                        &format!("Compound index cannot index array field {}", name),
                        ErrorKind::IndexingError,
                    ));
                }
                components.push(value.clone());
            }
            return Ok(vec![Value::Array(components)]);
        }

        let value = field_values.get_value(self.descriptor.fields().first());
        match value {
            Value::Array(items) if !items.is_empty() => {
                Ok(items.iter().cloned().sorted().dedup().collect())
            }
            Value::Array(_) => Ok(vec![Value::Null]),
            other => Ok(vec![other.clone()]),
        }
    }
}

impl NitriteIndexProvider for ComparableIndex {
    fn descriptor(&self) -> IndexDescriptor {
        self.descriptor.clone()
    }

    fn write(&self, field_values: &FieldValues) -> NitriteResult<()> {
        let id = *field_values.nitrite_id();
        let keys = self.keys(field_values)?;

        if self.is_unique() {
            // check every key before touching any entry, null included
            for key in keys.iter() {
                let holders = decode_ids(self.index_map.get(key)?);
                if holders.iter().any(|holder| *holder != id) {
                    log::error!(
                        "Unique constraint violated for {} = {} in {}",
                        self.descriptor.fields(),
                        key,
                        self.descriptor.collection()
                    );
                    return Err(NitriteError::new(
                        &format!(
                            "Unique constraint violated for {} = {}",
                            self.descriptor.fields(),
                            key
                        ),
                        ErrorKind::IndexingError,
                    ));
                }
            }
        }

        for key in keys {
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
        for key in self.keys(field_values)? {
            let mut ids = decode_ids(self.index_map.get(&key)?);
            let before = ids.len();
            ids.retain(|existing| *existing != id);
            if ids.is_empty() {
                self.index_map.remove(&key)?;
            } else if ids.len() != before {
                self.index_map.put(key, encode_ids(&ids))?;
            }
        }
        Ok(())
    }

    fn lookup(&self, value: &Value) -> NitriteResult<Vec<NitriteId>> {
        Ok(decode_ids(self.index_map.get(value)?))
    }

    fn drop_index(&self) -> NitriteResult<()> {
        self.index_map.clear()?;
        self.index_map.dispose()
    }
}
