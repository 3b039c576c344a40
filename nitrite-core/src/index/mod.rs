//! Secondary indexes.
//!
//! An index is described by an [IndexDescriptor] (collection, fields, kind,
//! lifecycle state) and backed by one store map whose keys are indexed
//! values and whose values are the ids of the documents carrying them.
//!
//! - [IndexKind::Unique]: a value may belong to one document only. A missing
//!   field indexes as null and is constrained like any other value.
//! - [IndexKind::NonUnique]: any number of documents per value.
//! - [IndexKind::FullText]: an inverted index of the terms produced by a
//!   [Tokenizer](text::Tokenizer).
//!
//! Single-field indexes index every element of an array value separately.
//! Compound indexes key on the tuple of field values.

mod comparable_index;
mod descriptor;
mod field_values;
mod nitrite_index;
pub mod text;
mod text_index;

pub(crate) use comparable_index::*;
pub use descriptor::*;
pub use field_values::*;
pub use nitrite_index::*;
pub(crate) use text_index::*;

use crate::common::{FULL_TEXT_INDEX, NON_UNIQUE_INDEX, UNIQUE_INDEX};
use crate::errors::{ErrorKind, NitriteError, NitriteResult};
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexKind {
    Unique,
    NonUnique,
    FullText,
}

impl IndexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Unique => UNIQUE_INDEX,
            IndexKind::NonUnique => NON_UNIQUE_INDEX,
            IndexKind::FullText => FULL_TEXT_INDEX,
        }
    }
}

impl FromStr for IndexKind {
    type Err = NitriteError;

    fn from_str(s: &str) -> NitriteResult<Self> {
        match s {
            UNIQUE_INDEX => Ok(IndexKind::Unique),
            NON_UNIQUE_INDEX => Ok(IndexKind::NonUnique),
            FULL_TEXT_INDEX => Ok(IndexKind::FullText),
            other => {
                log::error!("Unknown index kind {}", other);
                Err(NitriteError::new(
                    &format!("Unknown index kind {}", other),
                    ErrorKind::IndexingError,
                ))
            }
        }
    }
}

impl Display for IndexKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of an index: `Building -> Active`, and any state `-> Dropped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexState {
    Building,
    Active,
    Dropped,
}

impl IndexState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexState::Building => "building",
            IndexState::Active => "active",
            IndexState::Dropped => "dropped",
        }
    }
}

impl FromStr for IndexState {
    type Err = NitriteError;

    fn from_str(s: &str) -> NitriteResult<Self> {
        match s {
            "building" => Ok(IndexState::Building),
            "active" => Ok(IndexState::Active),
            "dropped" => Ok(IndexState::Dropped),
            other => {
                log::error!("Unknown index state {}", other);
                Err(NitriteError::new(
                    &format!("Unknown index state {}", other),
                    ErrorKind::IndexingError,
                ))
            }
        }
    }
}

impl Display for IndexState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        for kind in [IndexKind::Unique, IndexKind::NonUnique, IndexKind::FullText] {
            assert_eq!(kind.as_str().parse::<IndexKind>().unwrap(), kind);
        }
        assert!("spatial".parse::<IndexKind>().is_err());
    }

    #[test]
    fn test_state_names() {
        for state in [IndexState::Building, IndexState::Active, IndexState::Dropped] {
            assert_eq!(state.to_string().parse::<IndexState>().unwrap(), state);
        }
    }
}
