use crate::collection::{Document, NitriteId};
use crate::common::{Fields, Value};
use crate::errors::NitriteResult;

/// The values a document carries for the fields of one index.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValues {
    field_values: Vec<(String, Value)>,
    nitrite_id: NitriteId,
    fields: Fields,
}

impl FieldValues {
    pub fn new(field_values: Vec<(String, Value)>, nitrite_id: NitriteId, fields: Fields) -> Self {
        FieldValues {
            field_values,
            nitrite_id,
            fields,
        }
    }

    pub(crate) fn extract(
        nitrite_id: NitriteId,
        document: &Document,
        fields: &Fields,
    ) -> NitriteResult<Self> {
        let mut field_values = Vec::with_capacity(fields.len());
        for name in fields.field_names() {
            field_values.push((name.clone(), document.get(name)?));
        }
        Ok(FieldValues::new(field_values, nitrite_id, fields.clone()))
    }

    /// Value of the field, `Null` when absent.
    pub fn get_value(&self, field_name: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.field_values
            .iter()
            .find(|(name, _)| name == field_name)
            .map(|(_, value)| value)
            .unwrap_or(&NULL)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.field_values.iter().map(|(_, v)| v)
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn nitrite_id(&self) -> &NitriteId {
        &self.nitrite_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_extract() {
        let doc = doc! { name: "x", address: { city: "Oslo" } };
        let fields = Fields::with_names(vec!["address.city", "zip"]).unwrap();
        let values = FieldValues::extract(NitriteId::create_id(1), &doc, &fields).unwrap();
        assert_eq!(values.get_value("address.city"), &Value::from("Oslo"));
        assert_eq!(values.get_value("zip"), &Value::Null);
        assert_eq!(values.get_value("unknown"), &Value::Null);
        assert_eq!(values.nitrite_id(), &NitriteId::create_id(1));
    }

    #[test]
    fn test_all_null() {
        let fields = Fields::with_names(vec!["a"]).unwrap();
        let values = FieldValues::extract(NitriteId::create_id(1), &Document::new(), &fields).unwrap();
        assert!(values.values().all(|value| value.is_null()));
    }
}
