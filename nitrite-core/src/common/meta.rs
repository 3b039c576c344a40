use crate::collection::Document;
use crate::common::{
    get_current_time_or_zero, Convertible, Value, CREATED_TIME, LAST_MODIFIED_TIME, OWNER,
    UNIQUE_ID,
};
use crate::errors::{ErrorKind, NitriteError, NitriteResult};
use indexmap::IndexMap;
use std::fmt::Display;
use uuid::Uuid;

/// Implemented by everything that carries [Attributes] (maps and collections).
pub trait AttributeAware {
    fn attributes(&self) -> NitriteResult<Option<Attributes>>;

    fn set_attributes(&self, attributes: Attributes) -> NitriteResult<()>;
}

/// Small string-to-string metadata map attached to a collection.
///
/// Every `set` refreshes `last_modified_at`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    attributes: IndexMap<String, String>,
}

impl Attributes {
    pub fn new() -> Self {
        let now = get_current_time_or_zero().to_string();
        let mut attributes = IndexMap::with_capacity(4);
        attributes.insert(CREATED_TIME.to_string(), now.clone());
        attributes.insert(LAST_MODIFIED_TIME.to_string(), now);
        attributes.insert(UNIQUE_ID.to_string(), Uuid::new_v4().to_string());
        Attributes { attributes }
    }

    pub fn new_for_collection(collection: &str) -> Self {
        let mut attributes = Attributes::new();
        attributes
            .attributes
            .insert(OWNER.to_string(), collection.to_string());
        attributes
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(|s| s.as_str())
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.attributes.insert(key.to_string(), value.to_string());
        if key != LAST_MODIFIED_TIME {
            self.attributes.insert(
                LAST_MODIFIED_TIME.to_string(),
                get_current_time_or_zero().to_string(),
            );
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let removed = self.attributes.shift_remove(key);
        if removed.is_some() {
            self.attributes.insert(
                LAST_MODIFIED_TIME.to_string(),
                get_current_time_or_zero().to_string(),
            );
        }
        removed
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn owner(&self) -> Option<&str> {
        self.get(OWNER)
    }

    pub fn uuid(&self) -> Option<&str> {
        self.get(UNIQUE_ID)
    }

    pub fn created_time(&self) -> Option<&str> {
        self.get(CREATED_TIME)
    }

    pub fn last_modified_time(&self) -> Option<&str> {
        self.get(LAST_MODIFIED_TIME)
    }
}

impl Convertible for Attributes {
    type Output = Self;

    fn to_value(&self) -> NitriteResult<Value> {
        let mut document = Document::new();
        for (key, value) in self.attributes.iter() {
            document.put(key.as_str(), value.as_str())?;
        }
        Ok(Value::Document(document))
    }

    fn from_value(value: &Value) -> NitriteResult<Self::Output> {
        let Some(document) = value.as_document() else {
            log::error!("Attributes value {} is not a document", value);
            return Err(NitriteError::new(
                "Attributes value is not a document",
                ErrorKind::ValidationError,
            ));
        };

        let mut attributes = IndexMap::with_capacity(document.size());
        for (key, value) in document.iter() {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            attributes.insert(key.to_string(), text);
        }
        Ok(Attributes { attributes })
    }
}

impl Display for Attributes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pairs: Vec<String> = self
            .attributes
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect();
        write!(f, "{{{}}}", pairs.join(", "))
    }
}
