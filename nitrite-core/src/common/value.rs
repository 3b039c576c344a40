use crate::collection::{Document, NitriteId};
use itertools::Itertools;
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};

/// A dynamically typed document value.
///
/// # Ordering and equality
/// Numeric variants compare by exact mathematical value regardless of width
/// or representation, so `I32(1) == I64(1) == F64(1.0)` while `F64(1.5)`
/// sits strictly between `I32(1)` and `I32(2)`. All `NaN`s are equal to each
/// other and sort above every other number. Values of unrelated families are
/// ordered by family rank:
///
/// ```text
/// null < bool < number < char/string < bytes < nitrite id < array < document
/// ```
///
/// `Hash` follows the same rules, so equal values always hash alike. This is
/// the comparator used for index keys and for primary map keys.
#[derive(Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Char(char),
    String(String),
    /// Opaque binary payload. Stored as is, never tokenized.
    Bytes(Vec<u8>),
    Document(Document),
    Array(Vec<Value>),
    NitriteId(NitriteId),
}

/// Alias used where a value plays the role of a map key.
pub type Key = Value;

#[derive(Clone, Copy)]
enum Number {
    Int(i128),
    Float(f64),
}

// 2^127 as f64; floats at or beyond this cannot be truncated into an i128.
const I128_BOUND: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0;

fn cmp_f64(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

fn cmp_int_float(i: i128, f: f64) -> Ordering {
    if f.is_nan() || f >= I128_BOUND {
        return Ordering::Less;
    }
    if f < -I128_BOUND {
        return Ordering::Greater;
    }

    let truncated = f.trunc();
    match i.cmp(&(truncated as i128)) {
        Ordering::Equal => {
            if f > truncated {
                Ordering::Less
            } else if f < truncated {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        }
        other => other,
    }
}

fn cmp_numbers(a: Number, b: Number) -> Ordering {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => x.cmp(&y),
        (Number::Float(x), Number::Float(y)) => cmp_f64(x, y),
        (Number::Int(x), Number::Float(y)) => cmp_int_float(x, y),
        (Number::Float(x), Number::Int(y)) => cmp_int_float(y, x).reverse(),
    }
}

impl Value {
    fn family_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::I32(_) | Value::I64(_) | Value::U64(_) | Value::F32(_) | Value::F64(_) => 2,
            Value::Char(_) | Value::String(_) => 3,
            Value::Bytes(_) => 4,
            Value::NitriteId(_) => 5,
            Value::Array(_) => 6,
            Value::Document(_) => 7,
        }
    }

    fn as_number(&self) -> Option<Number> {
        match self {
            Value::I32(v) => Some(Number::Int(*v as i128)),
            Value::I64(v) => Some(Number::Int(*v as i128)),
            Value::U64(v) => Some(Number::Int(*v as i128)),
            Value::F32(v) => Some(Number::Float(*v as f64)),
            Value::F64(v) => Some(Number::Float(*v)),
            _ => None,
        }
    }

    fn text(&self) -> Option<std::borrow::Cow<'_, str>> {
        match self {
            Value::String(s) => Some(std::borrow::Cow::Borrowed(s.as_str())),
            Value::Char(c) => Some(std::borrow::Cow::Owned(c.to_string())),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_number(&self) -> bool {
        self.family_rank() == 2
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_document(&self) -> bool {
        matches!(self, Value::Document(_))
    }

    pub fn is_nitrite_id(&self) -> bool {
        matches!(self, Value::NitriteId(_))
    }

    pub fn as_string(&self) -> Option<&String> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as an `i64` if it is an integral number that fits.
    pub fn as_i64(&self) -> Option<i64> {
        match self.as_number()? {
            Number::Int(i) => i64::try_from(i).ok(),
            Number::Float(f) if f.fract() == 0.0 && f.abs() < 9.2e18 => Some(f as i64),
            Number::Float(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.as_number()? {
            Number::Int(i) => Some(i as f64),
            Number::Float(f) => Some(f),
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_nitrite_id(&self) -> Option<&NitriteId> {
        match self {
            Value::NitriteId(id) => Some(id),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        let rank = self.family_rank().cmp(&other.family_rank());
        if rank != Ordering::Equal {
            return rank;
        }

        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return cmp_numbers(a, b);
        }
        if let (Some(a), Some(b)) = (self.text(), other.text()) {
            return a.cmp(&b);
        }

        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (Value::NitriteId(a), Value::NitriteId(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => a.cmp(b),
            (Value::Document(a), Value::Document(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.family_rank().hash(state);
        if let Some(number) = self.as_number() {
            match number {
                Number::Int(i) => i.hash(state),
                Number::Float(f) if f.is_nan() => "nan".hash(state),
                Number::Float(f) if f.fract() == 0.0 && f.abs() < I128_BOUND => {
                    (f as i128).hash(state)
                }
                Number::Float(f) => f.to_bits().hash(state),
            }
            return;
        }
        if let Some(text) = self.text() {
            text.hash(state);
            return;
        }

        match self {
            Value::Bool(b) => b.hash(state),
            Value::Bytes(b) => b.hash(state),
            Value::NitriteId(id) => id.hash(state),
            Value::Array(a) => a.hash(state),
            Value::Document(d) => d.hash(state),
            _ => {}
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::I32(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::U64(v) => write!(f, "{}", v),
            Value::F32(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::Char(v) => write!(f, "\"{}\"", v),
            Value::String(v) => write!(f, "\"{}\"", v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Document(v) => write!(f, "{}", v),
            Value::Array(v) => write!(f, "[{}]", v.iter().join(", ")),
            Value::NitriteId(v) => write!(f, "{}", v),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::I32(v) => write!(f, "{}i32", v),
            Value::I64(v) => write!(f, "{}i64", v),
            Value::U64(v) => write!(f, "{}u64", v),
            Value::F32(v) => write!(f, "{}f32", v),
            Value::F64(v) => write!(f, "{}f64", v),
            Value::NitriteId(v) => write!(f, "NitriteId({})", v),
            other => write!(f, "{}", other),
        }
    }
}

macro_rules! value_from {
    ($($source:ty => $variant:ident as $target:ty),* $(,)?) => {
        $(
            impl From<$source> for Value {
                fn from(value: $source) -> Self {
                    Value::$variant(value as $target)
                }
            }
        )*
    };
}

value_from! {
    i8 => I32 as i32,
    i16 => I32 as i32,
    i32 => I32 as i32,
    u8 => I32 as i32,
    u16 => I32 as i32,
    i64 => I64 as i64,
    isize => I64 as i64,
    u32 => I64 as i64,
    u64 => U64 as u64,
    usize => U64 as u64,
    f32 => F32 as f32,
    f64 => F64 as f64,
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<char> for Value {
    fn from(value: char) -> Self {
        Value::Char(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::String(value.clone())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<Document> for Value {
    fn from(value: Document) -> Self {
        Value::Document(value)
    }
}

impl From<NitriteId> for Value {
    fn from(value: NitriteId) -> Self {
        Value::NitriteId(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}
