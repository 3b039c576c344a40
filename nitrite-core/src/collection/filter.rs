use crate::collection::{Document, NitriteId};
use crate::common::Value;
use crate::errors::NitriteResult;
use crate::index::text::Tokenizer;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

type PredicateFn = dyn Fn(&Document) -> bool + Send + Sync;

/// An opaque selection over the documents of a collection.
///
/// A filter is evaluated against whole documents. The equality and text
/// variants also tell the collection which field they look at, so a read
/// can go through an index instead of scanning when one is available.
#[derive(Clone)]
pub struct Filter {
    kind: FilterKind,
}

#[derive(Clone)]
enum FilterKind {
    All,
    ById(NitriteId),
    Eq { field: String, value: Value },
    Text { field: String, query: String },
    Predicate(Arc<PredicateFn>),
}

/// How a read should locate the candidates of a filter.
pub(crate) enum FilterPlan<'a> {
    Scan,
    ById(NitriteId),
    Eq { field: &'a str, value: &'a Value },
    Text { field: &'a str, query: &'a str },
}

impl Filter {
    /// Matches every document.
    pub fn all() -> Self {
        Filter {
            kind: FilterKind::All,
        }
    }

    pub fn by_id(id: NitriteId) -> Self {
        Filter {
            kind: FilterKind::ById(id),
        }
    }

    /// Matches documents whose `field` equals `value`, or holds it as an
    /// array element.
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Filter {
            kind: FilterKind::Eq {
                field: field.to_string(),
                value: value.into(),
            },
        }
    }

    /// Full-text match on `field`. Reading through a collection requires an
    /// active full-text index on the field.
    pub fn text(field: &str, query: &str) -> Self {
        Filter {
            kind: FilterKind::Text {
                field: field.to_string(),
                query: query.to_string(),
            },
        }
    }

    pub fn predicate(predicate: impl Fn(&Document) -> bool + Send + Sync + 'static) -> Self {
        Filter {
            kind: FilterKind::Predicate(Arc::new(predicate)),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self.kind, FilterKind::All)
    }

    pub fn apply(&self, document: &Document) -> NitriteResult<bool> {
        match &self.kind {
            FilterKind::All => Ok(true),
            FilterKind::ById(id) => Ok(document.existing_id() == Some(*id)),
            FilterKind::Eq { field, value } => {
                let actual = document.get(field)?;
                Ok(match &actual {
                    Value::Array(items) if !value.is_array() => items.contains(value),
                    other => other == value,
                })
            }
            FilterKind::Text { field, query } => {
                let actual = document.get(field)?;
                Ok(text_matches(&actual, query))
            }
            FilterKind::Predicate(predicate) => Ok(predicate(document)),
        }
    }

    pub(crate) fn plan(&self) -> FilterPlan<'_> {
        match &self.kind {
            FilterKind::All | FilterKind::Predicate(_) => FilterPlan::Scan,
            FilterKind::ById(id) => FilterPlan::ById(*id),
            FilterKind::Eq { field, value } => FilterPlan::Eq { field, value },
            FilterKind::Text { field, query } => FilterPlan::Text { field, query },
        }
    }
}

/// Term-prefix matching with the default tokenizer, used where no index
/// is consulted (transaction-local documents).
fn text_matches(actual: &Value, query: &str) -> bool {
    let tokenizer = Tokenizer::default();
    let mut terms = Vec::new();
    match actual {
        Value::String(text) => terms.extend(tokenizer.tokenize(text)),
        Value::Array(items) => {
            for item in items {
                if let Value::String(text) = item {
                    terms.extend(tokenizer.tokenize(text));
                }
            }
        }
        _ => return false,
    }

    tokenizer
        .tokenize(query)
        .iter()
        .any(|token| terms.iter().any(|term| term.starts_with(token.as_str())))
}

impl Display for Filter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            FilterKind::All => write!(f, "All"),
            FilterKind::ById(id) => write!(f, "({} == {})", crate::common::DOC_ID, id),
            FilterKind::Eq { field, value } => write!(f, "({} == {})", field, value),
            FilterKind::Text { field, query } => write!(f, "({} : {})", field, query),
            FilterKind::Predicate(_) => write!(f, "(predicate)"),
        }
    }
}

impl Debug for Filter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Filter{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_eq_matches_value_and_array_element() {
        let doc = doc! { name: "a", tags: ["x", "y"], age: 3 };
        assert!(Filter::eq("name", "a").apply(&doc).unwrap());
        assert!(Filter::eq("tags", "y").apply(&doc).unwrap());
        assert!(Filter::eq("age", 3.0).apply(&doc).unwrap());
        assert!(!Filter::eq("name", "b").apply(&doc).unwrap());
        assert!(!Filter::eq("missing", "a").apply(&doc).unwrap());
        assert!(Filter::eq("missing", Value::Null).apply(&doc).unwrap());
    }

    #[test]
    fn test_by_id() {
        let mut doc = doc! { a: 1 };
        let id = doc.id().unwrap();
        assert!(Filter::by_id(id).apply(&doc).unwrap());
        assert!(!Filter::by_id(NitriteId::create_id(1)).apply(&doc).unwrap());
    }

    #[test]
    fn test_text_prefix_match() {
        let doc = doc! { body: "Searching the database" };
        assert!(Filter::text("body", "data").apply(&doc).unwrap());
        assert!(Filter::text("body", "nothing search").apply(&doc).unwrap());
        assert!(!Filter::text("body", "the").apply(&doc).unwrap());
        assert!(!Filter::text("title", "data").apply(&doc).unwrap());
    }

    #[test]
    fn test_predicate_and_plan() {
        let filter = Filter::predicate(|d| d.size() > 1);
        assert!(filter.apply(&doc! { a: 1, b: 2 }).unwrap());
        assert!(matches!(filter.plan(), FilterPlan::Scan));
        assert!(matches!(Filter::eq("a", 1).plan(), FilterPlan::Eq { field: "a", .. }));
        assert!(Filter::all().is_all());
        assert_eq!(Filter::eq("a", 1).to_string(), "(a == 1)");
    }
}
