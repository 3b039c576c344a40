use crate::common::Value;
use crate::errors::NitriteResult;

/// Conversion between an engine type and its persisted [Value] form.
///
/// Implemented by the metadata types that live in the store meta map
/// (field lists, index descriptors, attributes).
pub trait Convertible {
    type Output;

    fn to_value(&self) -> NitriteResult<Value>;

    fn from_value(value: &Value) -> NitriteResult<Self::Output>;
}
