//! Owned record values produced and consumed by [`RecordLayout`](crate::RecordLayout)

use serde::{Deserialize, Serialize};
use std::ops::Index;

/// One decoded field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    /// `?`
    Bool(bool),
    /// `b`
    I8(i8),
    /// `B`
    U8(u8),
    /// `h`
    I16(i16),
    /// `H`
    U16(u16),
    /// `i` / `l`
    I32(i32),
    /// `I` / `L`
    U32(u32),
    /// `q`
    I64(i64),
    /// `Q`
    U64(u64),
    /// `f`
    F32(f32),
    /// `d`
    F64(f64),
    /// `Ns`
    Bytes(Vec<u8>),
}

impl FieldValue {
    /// Short type name used in shape mismatch reports
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Bool(_) => "bool",
            FieldValue::I8(_) => "i8",
            FieldValue::U8(_) => "u8",
            FieldValue::I16(_) => "i16",
            FieldValue::U16(_) => "u16",
            FieldValue::I32(_) => "i32",
            FieldValue::U32(_) => "u32",
            FieldValue::I64(_) => "i64",
            FieldValue::U64(_) => "u64",
            FieldValue::F32(_) => "f32",
            FieldValue::F64(_) => "f64",
            FieldValue::Bytes(_) => "bytes",
        }
    }

    /// Integer value widened to `i64`, if it fits
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            FieldValue::Bool(v) => Some(v as i64),
            FieldValue::I8(v) => Some(v.into()),
            FieldValue::U8(v) => Some(v.into()),
            FieldValue::I16(v) => Some(v.into()),
            FieldValue::U16(v) => Some(v.into()),
            FieldValue::I32(v) => Some(v.into()),
            FieldValue::U32(v) => Some(v.into()),
            FieldValue::I64(v) => Some(v),
            FieldValue::U64(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Floating point value widened to `f64`
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            FieldValue::F32(v) => Some(v.into()),
            FieldValue::F64(v) => Some(v),
            _ => None,
        }
    }

    /// Raw bytes of a byte-array field
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Bytes(v) => Some(v),
            _ => None,
        }
    }
}

macro_rules! impl_from_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(value: $ty) -> Self {
                    FieldValue::$variant(value)
                }
            }
        )*
    };
}

impl_from_primitive! {
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Vec<u8> => Bytes,
}

impl From<&[u8]> for FieldValue {
    fn from(value: &[u8]) -> Self {
        FieldValue::Bytes(value.to_vec())
    }
}

/// An ordered list of field values, one per non-padding layout field
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    values: Vec<FieldValue>,
}

impl Record {
    /// Record from explicit values
    pub fn new(values: Vec<FieldValue>) -> Self {
        Self { values }
    }

    /// Record holding a single value
    pub fn single(value: impl Into<FieldValue>) -> Self {
        Self {
            values: vec![value.into()],
        }
    }

    /// Field values in layout order
    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    /// Number of values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the record has no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at `index`
    pub fn get(&self, index: usize) -> Option<&FieldValue> {
        self.values.get(index)
    }

    /// Consume into the value list
    pub fn into_values(self) -> Vec<FieldValue> {
        self.values
    }

    /// Comma-separated type names, used in shape reports
    pub(crate) fn shape(&self) -> String {
        let names: Vec<&str> = self.values.iter().map(FieldValue::type_name).collect();
        format!("({})", names.join(", "))
    }
}

impl From<Vec<FieldValue>> for Record {
    fn from(values: Vec<FieldValue>) -> Self {
        Self::new(values)
    }
}

impl FromIterator<FieldValue> for Record {
    fn from_iter<I: IntoIterator<Item = FieldValue>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Index<usize> for Record {
    type Output = FieldValue;

    fn index(&self, index: usize) -> &Self::Output {
        &self.values[index]
    }
}

impl IntoIterator for Record {
    type Item = FieldValue;
    type IntoIter = std::vec::IntoIter<FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}
