use crate::collection::NitriteId;
use crate::common::{
    ReadExecutor, Value, DOC_ID, DOC_MODIFIED, DOC_REVISION, DOC_SOURCE, RESERVED_FIELDS,
};
use crate::errors::{ErrorKind, NitriteError, NitriteResult};
use crate::FIELD_SEPARATOR;
use im::OrdMap;
use itertools::Itertools;
use smallvec::SmallVec;
use std::borrow::Cow;
use std::fmt::{Debug, Display};

type FieldVec = SmallVec<[String; 8]>;

/// A schemaless record: an ordered map from field names to [Value]s.
///
/// Cloning is cheap (structural sharing), and every clone is independent:
/// changing a document returned by a read never touches stored state.
///
/// Field paths use the configured separator (`.` by default) to address
/// nested documents, and a numeric segment indexes into an array:
///
/// ```
/// use nitrite_core::doc;
///
/// let mut doc = doc! {
///     name: "Ada",
///     address: { city: "London" },
///     phones: [ { kind: "home" }, { kind: "work" } ],
/// };
/// assert_eq!(doc.get("address.city").unwrap(), "London".into());
/// assert_eq!(doc.get("phones.1.kind").unwrap(), "work".into());
///
/// doc.put("address.zip", "N1").unwrap();
/// assert_eq!(doc.get("address.zip").unwrap(), "N1".into());
/// ```
///
/// The `_id` field is the designated identifier. It accepts a [NitriteId],
/// a non-negative integer or a decimal string; anything else fails with
/// [ErrorKind::InvalidId].
#[derive(Clone, Eq, PartialEq, Hash, Default, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Document {
    data: OrdMap<String, Value>,
}

fn separator() -> String {
    FIELD_SEPARATOR.read_with(|sep| sep.clone())
}

fn to_id_value(value: Value) -> NitriteResult<Value> {
    let id = match &value {
        Value::NitriteId(id) => Some(*id),
        Value::U64(v) => Some(NitriteId::create_id(*v)),
        Value::String(s) => Some(s.parse::<NitriteId>()?),
        v if v.is_number() => v
            .as_i64()
            .filter(|i| *i >= 0)
            .map(|i| NitriteId::create_id(i as u64)),
        _ => None,
    };

    match id {
        Some(id) => Ok(Value::NitriteId(id)),
        None => {
            log::error!("{} is not a valid document id", value);
            Err(NitriteError::new(
                &format!("{} is not a valid document id", value),
                ErrorKind::InvalidId,
            ))
        }
    }
}

fn get_path(value: &Value, segments: &[&str]) -> Value {
    let Some((head, rest)) = segments.split_first() else {
        return value.clone();
    };

    match value {
        Value::Document(doc) => doc
            .data
            .get(*head)
            .map(|v| get_path(v, rest))
            .unwrap_or(Value::Null),
        Value::Array(items) => match head.parse::<usize>() {
            Ok(index) => items
                .get(index)
                .map(|v| get_path(v, rest))
                .unwrap_or(Value::Null),
            Err(_) => {
                // project the remaining path over every element
                let projected: Vec<Value> = items
                    .iter()
                    .map(|item| get_path(item, segments))
                    .filter(|v| !v.is_null())
                    .collect();
                if projected.is_empty() {
                    Value::Null
                } else {
                    Value::Array(projected)
                }
            }
        },
        _ => Value::Null,
    }
}

impl Document {
    pub fn new() -> Self {
        Document {
            data: OrdMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn put<'a, T: Into<Value>>(
        &mut self,
        key: impl Into<Cow<'a, str>>,
        value: T,
    ) -> NitriteResult<()> {
        let key = key.into();
        if key.is_empty() {
            log::error!("Document does not support empty key");
            return Err(NitriteError::new(
                "Document does not support empty key",
                ErrorKind::InvalidOperation,
            ));
        }

        let mut value = value.into();
        if key == DOC_ID {
            value = to_id_value(value)?;
        }

        let sep = separator();
        if key.contains(sep.as_str()) {
            let segments: Vec<&str> = key.split(sep.as_str()).collect();
            self.deep_put(&segments, value)
        } else {
            self.data.insert(key.into_owned(), value);
            Ok(())
        }
    }

    /// Returns the value at `key`, or [Value::Null] if there is none.
    pub fn get(&self, key: &str) -> NitriteResult<Value> {
        if let Some(value) = self.data.get(key) {
            return Ok(value.clone());
        }

        let sep = separator();
        if key.contains(sep.as_str()) {
            let segments: Vec<&str> = key.split(sep.as_str()).collect();
            if segments.iter().any(|s| s.is_empty()) {
                log::error!("Invalid field path {}", key);
                return Err(NitriteError::new(
                    &format!("Invalid field path {}", key),
                    ErrorKind::ValidationError,
                ));
            }
            let root = Value::Document(self.clone());
            Ok(get_path(&root, &segments))
        } else {
            Ok(Value::Null)
        }
    }

    pub fn remove(&mut self, key: &str) -> NitriteResult<()> {
        if self.data.remove(key).is_some() {
            return Ok(());
        }

        let sep = separator();
        if key.contains(sep.as_str()) {
            let segments: Vec<&str> = key.split(sep.as_str()).collect();
            self.deep_remove(&segments);
        }
        Ok(())
    }

    /// Returns the id, generating and storing a new one if the document has none.
    pub fn id(&mut self) -> NitriteResult<NitriteId> {
        match self.data.get(DOC_ID) {
            Some(Value::NitriteId(id)) => Ok(*id),
            Some(other) => {
                let value = to_id_value(other.clone())?;
                self.data.insert(DOC_ID.to_string(), value.clone());
                value.as_nitrite_id().copied().ok_or_else(|| {
                    NitriteError::new("Document id is malformed", ErrorKind::InvalidId)
                })
            }
            None => {
                let id = NitriteId::new();
                self.data.insert(DOC_ID.to_string(), Value::NitriteId(id));
                Ok(id)
            }
        }
    }

    /// The id if one is set; never generates.
    pub fn existing_id(&self) -> Option<NitriteId> {
        self.data.get(DOC_ID).and_then(|v| v.as_nitrite_id()).copied()
    }

    pub fn has_id(&self) -> bool {
        self.data.contains_key(DOC_ID)
    }

    pub fn revision(&self) -> i64 {
        self.data
            .get(DOC_REVISION)
            .and_then(|v| v.as_i64())
            .unwrap_or(0)
    }

    pub fn last_modified_since_epoch(&self) -> i64 {
        self.data
            .get(DOC_MODIFIED)
            .and_then(|v| v.as_i64())
            .unwrap_or(0)
    }

    pub fn source(&self) -> String {
        self.data
            .get(DOC_SOURCE)
            .and_then(|v| v.as_string())
            .cloned()
            .unwrap_or_default()
    }

    /// Copies every field of `other` into this document; nested documents are
    /// merged recursively instead of being replaced.
    pub fn merge(&mut self, other: &Document) {
        for (key, value) in other.data.iter() {
            match (self.data.get(key), value) {
                (Some(Value::Document(existing)), Value::Document(incoming)) => {
                    let mut merged = existing.clone();
                    merged.merge(incoming);
                    self.data.insert(key.clone(), Value::Document(merged));
                }
                _ => {
                    self.data.insert(key.clone(), value.clone());
                }
            }
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Leaf field paths of the document, excluding reserved fields.
    pub fn fields(&self) -> FieldVec {
        self.fields_with_prefix("", &separator())
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.contains_key(field) || self.fields().iter().any(|f| f == field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    fn fields_with_prefix(&self, prefix: &str, sep: &str) -> FieldVec {
        let mut fields = FieldVec::new();
        for (key, value) in self.data.iter() {
            if RESERVED_FIELDS.contains(&key.as_str()) {
                continue;
            }

            let field = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}{}{}", prefix, sep, key)
            };

            match value {
                Value::Document(nested) => fields.extend(nested.fields_with_prefix(&field, sep)),
                _ => fields.push(field),
            }
        }
        fields
    }

    fn deep_put(&mut self, segments: &[&str], value: Value) -> NitriteResult<()> {
        let Some((head, rest)) = segments.split_first() else {
            return Ok(());
        };

        if head.is_empty() {
            log::error!("Document does not support empty key");
            return Err(NitriteError::new(
                "Document does not support empty key",
                ErrorKind::InvalidOperation,
            ));
        }

        if rest.is_empty() {
            self.data.insert(head.to_string(), value);
            return Ok(());
        }

        let mut nested = match self.data.get(*head) {
            Some(Value::Document(doc)) => doc.clone(),
            _ => Document::new(),
        };
        nested.deep_put(rest, value)?;
        self.data.insert(head.to_string(), Value::Document(nested));
        Ok(())
    }

    fn deep_remove(&mut self, segments: &[&str]) {
        let Some((head, rest)) = segments.split_first() else {
            return;
        };

        if rest.is_empty() {
            self.data.remove(*head);
            return;
        }

        if let Some(Value::Document(doc)) = self.data.get(*head) {
            let mut nested = doc.clone();
            nested.deep_remove(rest);
            if nested.is_empty() {
                self.data.remove(*head);
            } else {
                self.data.insert(head.to_string(), Value::Document(nested));
            }
        }
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let body = self
            .data
            .iter()
            .map(|(k, v)| format!("\"{}\": {}", k, v))
            .join(", ");
        write!(f, "{{{}}}", body)
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let body = self
            .data
            .iter()
            .map(|(k, v)| format!("\"{}\": {:?}", k, v))
            .join(", ");
        write!(f, "{{{}}}", body)
    }
}

#[doc(hidden)]
pub fn normalize(value: &str) -> String {
    value.trim_matches('"').to_string()
}

/// Creates a [Document] with JSON-like syntax.
///
/// Keys may be bare identifiers or string literals; values may be
/// expressions, nested `{ ... }` documents or `[ ... ]` arrays.
///
/// ```
/// use nitrite_core::doc;
///
/// let doc = doc! { "_id": 1, name: "a", tags: ["x", "y"] };
/// assert!(doc.has_id());
/// ```
#[macro_export]
macro_rules! doc {
    () => {
        $crate::collection::Document::new()
    };

    ($($key:tt : $value:tt),* $(,)?) => {
        {
            #[allow(unused_imports)]
            use $crate::doc_value;

            let mut doc = $crate::collection::Document::new();
            $(
                doc.put($crate::collection::normalize(stringify!($key)), $crate::doc_value!($value))
                    .expect(&format!("Failed to put value {} in document", stringify!($value)));
            )*
            doc
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! doc_value {
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::common::Value::Document($crate::doc!{ $($key : $value),* })
    };

    ([ $($value:tt),* $(,)? ]) => {
        $crate::common::Value::Array(vec![$($crate::doc_value!($value)),*])
    };

    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    fn sample() -> Document {
        doc! {
            score: 1034,
            location: {
                state: "NY",
                address: {
                    line1: "40",
                    zip: 10001,
                },
            },
            tags: ["a", "b"],
            items: [ { sku: "x" }, { sku: "y" } ],
        }
    }

    #[test]
    fn test_get_nested() {
        let doc = sample();
        assert_eq!(doc.get("score").unwrap(), Value::I32(1034));
        assert_eq!(doc.get("location.state").unwrap(), "NY".into());
        assert_eq!(doc.get("location.address.zip").unwrap(), Value::I32(10001));
        assert_eq!(doc.get("tags.1").unwrap(), "b".into());
        assert_eq!(doc.get("items.0.sku").unwrap(), "x".into());
        assert_eq!(doc.get("missing").unwrap(), Value::Null);
        assert_eq!(doc.get("location.missing").unwrap(), Value::Null);
        assert_eq!(doc.get("tags.9").unwrap(), Value::Null);
    }

    #[test]
    fn test_get_projects_over_arrays() {
        let doc = sample();
        assert_eq!(
            doc.get("items.sku").unwrap(),
            Value::Array(vec!["x".into(), "y".into()])
        );
    }

    #[test]
    fn test_put_nested_creates_documents() {
        let mut doc = Document::new();
        doc.put("a.b.c", 1).unwrap();
        assert_eq!(doc.get("a.b.c").unwrap(), Value::I32(1));
        assert!(doc.get("a").unwrap().is_document());
    }

    #[test]
    fn test_empty_key_rejected() {
        let mut doc = Document::new();
        let err = doc.put("", 1).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
        assert!(doc.put("a..b", 1).is_err());
    }

    #[test]
    fn test_id_field_conversion() {
        let mut doc = Document::new();
        doc.put(DOC_ID, 1).unwrap();
        assert_eq!(doc.existing_id(), Some(NitriteId::create_id(1)));

        doc.put(DOC_ID, "77").unwrap();
        assert_eq!(doc.id().unwrap(), NitriteId::create_id(77));

        assert_eq!(doc.put(DOC_ID, -1).unwrap_err().kind(), &ErrorKind::InvalidId);
        assert_eq!(doc.put(DOC_ID, 1.5).unwrap_err().kind(), &ErrorKind::InvalidId);
        assert_eq!(doc.put(DOC_ID, true).unwrap_err().kind(), &ErrorKind::InvalidId);
    }

    #[test]
    fn test_id_is_generated_once() {
        let mut doc = doc! { name: "x" };
        assert!(!doc.has_id());
        let first = doc.id().unwrap();
        let second = doc.id().unwrap();
        assert_eq!(first, second);
        assert!(doc.has_id());
    }

    #[test]
    fn test_remove_nested() {
        let mut doc = sample();
        doc.remove("location.address.zip").unwrap();
        assert_eq!(doc.get("location.address.zip").unwrap(), Value::Null);
        assert_eq!(doc.get("location.address.line1").unwrap(), "40".into());

        doc.remove("location.address.line1").unwrap();
        assert_eq!(doc.get("location.address").unwrap(), Value::Null);
    }

    #[test]
    fn test_merge_recursive() {
        let mut doc = sample();
        doc.merge(&doc! { location: { state: "CA" }, score: 1 });
        assert_eq!(doc.get("location.state").unwrap(), "CA".into());
        assert_eq!(doc.get("location.address.line1").unwrap(), "40".into());
        assert_eq!(doc.get("score").unwrap(), Value::I32(1));
    }

    #[test]
    fn test_fields_skip_reserved() {
        let mut doc = sample();
        doc.id().unwrap();
        let fields = doc.fields();
        assert!(fields.contains(&"location.address.zip".to_string()));
        assert!(fields.contains(&"tags".to_string()));
        assert!(!fields.contains(&DOC_ID.to_string()));
        assert!(doc.contains_field("location.state"));
    }

    #[test]
    fn test_metadata_accessors() {
        let mut doc = Document::new();
        assert_eq!(doc.revision(), 0);
        doc.put(DOC_REVISION, 3).unwrap();
        doc.put(DOC_MODIFIED, 1000i64).unwrap();
        doc.put(DOC_SOURCE, "replica").unwrap();
        assert_eq!(doc.revision(), 3);
        assert_eq!(doc.last_modified_since_epoch(), 1000);
        assert_eq!(doc.source(), "replica");
    }

    #[test]
    fn test_clone_is_independent() {
        let original = sample();
        let mut copy = original.clone();
        copy.put("score", 1).unwrap();
        assert_eq!(original.get("score").unwrap(), Value::I32(1034));
    }
}
