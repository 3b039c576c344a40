use crate::common::{Convertible, Value, INTERNAL_NAME_SEPARATOR};
use crate::errors::{ErrorKind, NitriteError, NitriteResult};
use itertools::Itertools;
use std::fmt::Display;
use std::sync::Arc;

/// An ordered list of field paths an index is defined on.
///
/// Two `Fields` are equal when they name the same paths in the same order;
/// `["a", "b"]` and `["b", "a"]` are different compound indexes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fields {
    inner: Arc<Vec<String>>,
}

impl Fields {
    pub fn with_names(field_names: Vec<&str>) -> NitriteResult<Fields> {
        if field_names.is_empty() {
            log::error!("Field names cannot be empty");
            return Err(NitriteError::new(
                "Field names cannot be empty",
                ErrorKind::ValidationError,
            ));
        }

        if field_names.iter().any(|name| name.is_empty()) {
            log::error!("Field name cannot be empty in {:?}", field_names);
            return Err(NitriteError::new(
                "Field name cannot be empty",
                ErrorKind::ValidationError,
            ));
        }

        if !field_names.iter().all_unique() {
            log::error!("Duplicate field names in {:?}", field_names);
            return Err(NitriteError::new(
                "Field names must be unique",
                ErrorKind::ValidationError,
            ));
        }

        Ok(Fields {
            inner: Arc::new(field_names.iter().map(|s| s.to_string()).collect()),
        })
    }

    pub fn field_names(&self) -> &[String] {
        &self.inner
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn is_compound(&self) -> bool {
        self.inner.len() > 1
    }

    pub fn first(&self) -> &str {
        self.inner.first().map(|s| s.as_str()).unwrap_or_default()
    }

    /// Names joined with the internal separator; used in map and meta keys.
    pub fn encoded_names(&self) -> String {
        self.inner.join(INTERNAL_NAME_SEPARATOR)
    }
}

impl Display for Fields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.inner.join(", "))
    }
}

impl Convertible for Fields {
    type Output = Self;

    fn to_value(&self) -> NitriteResult<Value> {
        Ok(Value::from(self.inner.as_ref().clone()))
    }

    fn from_value(value: &Value) -> NitriteResult<Self::Output> {
        let Some(array) = value.as_array() else {
            log::error!("Fields value {} is not an array", value);
            return Err(NitriteError::new(
                "Fields value is not an array",
                ErrorKind::ValidationError,
            ));
        };

        let mut names = Vec::with_capacity(array.len());
        for item in array {
            match item.as_string() {
                Some(name) => names.push(name.as_str()),
                None => {
                    log::error!("Field name must be a string, got {:?}", item);
                    return Err(NitriteError::new(
                        "Field name must be a string",
                        ErrorKind::ValidationError,
                    ));
                }
            }
        }
        Fields::with_names(names)
    }
}
