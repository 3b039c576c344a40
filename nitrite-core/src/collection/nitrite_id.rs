use crate::errors::{ErrorKind, NitriteError, NitriteResult};
use crate::ID_GENERATOR;
use std::fmt::{Debug, Display};

/// Identifier of a document within a collection.
///
/// Generated ids come from the process-wide snowflake generator and increase
/// monotonically, so iterating a collection in key order approximates
/// insertion order. User-supplied ids may be any `u64`.
#[derive(PartialEq, Eq, Ord, PartialOrd, Hash, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NitriteId {
    id_value: u64,
}

impl NitriteId {
    pub fn new() -> Self {
        NitriteId {
            id_value: ID_GENERATOR.get_id(),
        }
    }

    pub fn create_id(id_value: u64) -> NitriteId {
        NitriteId { id_value }
    }

    pub fn id_value(&self) -> u64 {
        self.id_value
    }
}

impl Default for NitriteId {
    fn default() -> Self {
        NitriteId::new()
    }
}

impl std::str::FromStr for NitriteId {
    type Err = NitriteError;

    fn from_str(s: &str) -> NitriteResult<Self> {
        s.trim().parse::<u64>().map(NitriteId::create_id).map_err(|_| {
            log::error!("'{}' is not a valid document id", s);
            NitriteError::new(
                &format!("'{}' is not a valid document id", s),
                ErrorKind::InvalidId,
            )
        })
    }
}

impl Debug for NitriteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NitriteId({})", self.id_value)
    }
}

impl Display for NitriteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id_value)
    }
}
