//! Fixed-width record layouts and their struct-style format strings
//!
//! A [`RecordLayout`] is an ordered list of typed fields plus a byte order.
//! Fields are packed back to back with no alignment padding, so the byte
//! width of a record is the sum of its field widths. Layouts serialize with
//! serde so they can travel inside a [`SegmentHandle`](crate::SegmentHandle).
//!
//! Layouts can also be written as compact format strings:
//!
//! | Code | Field | Bytes |
//! |------|-------|-------|
//! | `x` | padding | 1 |
//! | `?` | bool | 1 |
//! | `b` / `B` | i8 / u8 | 1 |
//! | `h` / `H` | i16 / u16 | 2 |
//! | `i` `l` / `I` `L` | i32 / u32 | 4 |
//! | `q` / `Q` | i64 / u64 | 8 |
//! | `f` / `d` | f32 / f64 | 4 / 8 |
//! | `Ns` | N raw bytes | N |
//!
//! An optional first character selects the byte order: `@` or `=` native,
//! `<` little-endian, `>` or `!` big-endian. A decimal count before a code
//! repeats it (`3d` is three `f64`s), except for `s` and `x` where it is the
//! byte length.

use crate::error::{ShmError, ShmResult};
use crate::record::{FieldValue, Record};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upper bound on the number of fields in one layout
pub const MAX_LAYOUT_FIELDS: usize = 4096;

/// Byte order of multi-byte fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    /// Host byte order
    #[default]
    Native,
    /// Little-endian
    Little,
    /// Big-endian
    Big,
}

/// Type of one fixed-width field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Padding bytes, written as zero and skipped on read
    Pad(usize),
    /// One byte, non-zero reads as `true`
    Bool,
    /// Signed 8-bit integer
    I8,
    /// Unsigned 8-bit integer
    U8,
    /// Signed 16-bit integer
    I16,
    /// Unsigned 16-bit integer
    U16,
    /// Signed 32-bit integer
    I32,
    /// Unsigned 32-bit integer
    U32,
    /// Signed 64-bit integer
    I64,
    /// Unsigned 64-bit integer
    U64,
    /// IEEE 754 single precision
    F32,
    /// IEEE 754 double precision
    F64,
    /// Fixed-length byte array
    Bytes(usize),
}

impl FieldKind {
    /// Encoded width in bytes
    pub fn width(&self) -> usize {
        match *self {
            FieldKind::Pad(n) | FieldKind::Bytes(n) => n,
            FieldKind::Bool | FieldKind::I8 | FieldKind::U8 => 1,
            FieldKind::I16 | FieldKind::U16 => 2,
            FieldKind::I32 | FieldKind::U32 | FieldKind::F32 => 4,
            FieldKind::I64 | FieldKind::U64 | FieldKind::F64 => 8,
        }
    }

    /// Whether the field produces a value (everything except padding)
    pub fn has_value(&self) -> bool {
        !matches!(self, FieldKind::Pad(_))
    }

    /// Short type name used in shape mismatch reports
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::Pad(_) => "pad",
            FieldKind::Bool => "bool",
            FieldKind::I8 => "i8",
            FieldKind::U8 => "u8",
            FieldKind::I16 => "i16",
            FieldKind::U16 => "u16",
            FieldKind::I32 => "i32",
            FieldKind::U32 => "u32",
            FieldKind::I64 => "i64",
            FieldKind::U64 => "u64",
            FieldKind::F32 => "f32",
            FieldKind::F64 => "f64",
            FieldKind::Bytes(_) => "bytes",
        }
    }

    fn code(&self) -> char {
        match self {
            FieldKind::Pad(_) => 'x',
            FieldKind::Bool => '?',
            FieldKind::I8 => 'b',
            FieldKind::U8 => 'B',
            FieldKind::I16 => 'h',
            FieldKind::U16 => 'H',
            FieldKind::I32 => 'i',
            FieldKind::U32 => 'I',
            FieldKind::I64 => 'q',
            FieldKind::U64 => 'Q',
            FieldKind::F32 => 'f',
            FieldKind::F64 => 'd',
            FieldKind::Bytes(_) => 's',
        }
    }

    fn from_code(code: char) -> Option<Self> {
        let kind = match code {
            '?' => FieldKind::Bool,
            'b' => FieldKind::I8,
            'B' => FieldKind::U8,
            'h' => FieldKind::I16,
            'H' => FieldKind::U16,
            'i' | 'l' => FieldKind::I32,
            'I' | 'L' => FieldKind::U32,
            'q' => FieldKind::I64,
            'Q' => FieldKind::U64,
            'f' => FieldKind::F32,
            'd' => FieldKind::F64,
            _ => return None,
        };
        Some(kind)
    }
}

/// Descriptor of one fixed-width record shape
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "LayoutDescriptor", into = "LayoutDescriptor")]
pub struct RecordLayout {
    byte_order: ByteOrder,
    fields: Vec<FieldKind>,
    byte_width: usize,
}

/// Wire form of a layout; the byte width is derived, never transmitted
#[derive(Serialize, Deserialize)]
struct LayoutDescriptor {
    #[serde(default)]
    byte_order: ByteOrder,
    fields: Vec<FieldKind>,
}

impl TryFrom<LayoutDescriptor> for RecordLayout {
    type Error = ShmError;

    fn try_from(descriptor: LayoutDescriptor) -> ShmResult<Self> {
        Self::new(descriptor.byte_order, descriptor.fields)
    }
}

impl From<RecordLayout> for LayoutDescriptor {
    fn from(layout: RecordLayout) -> Self {
        Self {
            byte_order: layout.byte_order,
            fields: layout.fields,
        }
    }
}

impl RecordLayout {
    /// Layout from explicit fields
    ///
    /// Fails with [`ShmError::InvalidLayout`] when there are more than
    /// [`MAX_LAYOUT_FIELDS`] fields or the total width overflows `usize`.
    pub fn new(byte_order: ByteOrder, fields: Vec<FieldKind>) -> ShmResult<Self> {
        if fields.len() > MAX_LAYOUT_FIELDS {
            return Err(invalid_layout(format!(
                "{} fields exceed the limit of {MAX_LAYOUT_FIELDS}",
                fields.len()
            )));
        }
        let byte_width = fields
            .iter()
            .try_fold(0usize, |total, kind| total.checked_add(kind.width()))
            .ok_or_else(|| invalid_layout("record width overflows usize".to_string()))?;
        Ok(Self {
            byte_order,
            fields,
            byte_width,
        })
    }

    /// Native-order layout with a single field
    pub fn single(kind: FieldKind) -> Self {
        Self {
            byte_order: ByteOrder::Native,
            fields: vec![kind],
            byte_width: kind.width(),
        }
    }

    /// Parse a struct-style format string such as `"<3d"` or `"BBB"`
    pub fn parse(format: &str) -> ShmResult<Self> {
        let mut chars = format.chars().peekable();

        let byte_order = match chars.peek() {
            Some('@') | Some('=') => {
                chars.next();
                ByteOrder::Native
            }
            Some('<') => {
                chars.next();
                ByteOrder::Little
            }
            Some('>') | Some('!') => {
                chars.next();
                ByteOrder::Big
            }
            _ => ByteOrder::Native,
        };

        let mut fields = Vec::new();
        let mut count: Option<usize> = None;

        for c in chars {
            if c.is_whitespace() {
                if count.is_some() {
                    return Err(invalid_layout(format!(
                        "count without format code in '{format}'"
                    )));
                }
                continue;
            }

            if let Some(digit) = c.to_digit(10) {
                let next = count
                    .unwrap_or(0)
                    .checked_mul(10)
                    .and_then(|n| n.checked_add(digit as usize))
                    .ok_or_else(|| invalid_layout(format!("count too large in '{format}'")))?;
                count = Some(next);
                continue;
            }

            let n = count.take().unwrap_or(1);
            match c {
                's' => fields.push(FieldKind::Bytes(n)),
                'x' => {
                    if n > 0 {
                        fields.push(FieldKind::Pad(n));
                    }
                }
                other => {
                    let kind = FieldKind::from_code(other).ok_or_else(|| {
                        invalid_layout(format!("unknown format code '{other}' in '{format}'"))
                    })?;
                    if n > MAX_LAYOUT_FIELDS.saturating_sub(fields.len()) {
                        return Err(invalid_layout(format!(
                            "more than {MAX_LAYOUT_FIELDS} fields in '{format}'"
                        )));
                    }
                    fields.extend(std::iter::repeat_n(kind, n));
                }
            }
        }

        if count.is_some() {
            return Err(invalid_layout(format!(
                "trailing count without format code in '{format}'"
            )));
        }

        Self::new(byte_order, fields)
    }

    /// Canonical format string; parsing it yields an equal layout
    pub fn format(&self) -> String {
        let mut out = String::new();
        match self.byte_order {
            ByteOrder::Native => {}
            ByteOrder::Little => out.push('<'),
            ByteOrder::Big => out.push('>'),
        }

        let mut fields = self.fields.iter().peekable();
        while let Some(kind) = fields.next() {
            match *kind {
                FieldKind::Pad(n) | FieldKind::Bytes(n) => {
                    if n != 1 || matches!(kind, FieldKind::Bytes(_)) {
                        out.push_str(&n.to_string());
                    }
                    out.push(kind.code());
                }
                _ => {
                    let mut run = 1;
                    while fields.next_if_eq(&kind).is_some() {
                        run += 1;
                    }
                    if run > 1 {
                        out.push_str(&run.to_string());
                    }
                    out.push(kind.code());
                }
            }
        }
        out
    }

    /// Byte order of multi-byte fields
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Fields in order, padding included
    pub fn fields(&self) -> &[FieldKind] {
        &self.fields
    }

    /// Bytes per record
    pub fn byte_width(&self) -> usize {
        self.byte_width
    }

    /// Number of values in a record (fields minus padding)
    pub fn value_count(&self) -> usize {
        self.fields.iter().filter(|kind| kind.has_value()).count()
    }

    /// Check `record` against this layout without writing anything
    pub fn check_shape(&self, record: &Record) -> ShmResult<()> {
        let matches = record.len() == self.value_count()
            && self
                .fields
                .iter()
                .filter(|kind| kind.has_value())
                .zip(record.values())
                .all(|(kind, value)| kind_accepts(kind, value));

        if matches {
            Ok(())
        } else {
            Err(ShmError::ShapeMismatch {
                expected: self.shape(),
                found: record.shape(),
            })
        }
    }

    /// Encode `record` into `dst`, which must be exactly `byte_width` long
    pub fn pack_into(&self, record: &Record, dst: &mut [u8]) -> ShmResult<()> {
        if dst.len() != self.byte_width {
            return Err(ShmError::InvalidSize { size: dst.len() });
        }
        self.check_shape(record)?;

        let mut offset = 0;
        let mut values = record.values().iter();
        for kind in &self.fields {
            let width = kind.width();
            let out = &mut dst[offset..offset + width];
            offset += width;

            if let FieldKind::Pad(_) = kind {
                out.fill(0);
                continue;
            }

            // check_shape guarantees one value per non-padding field.
            let Some(value) = values.next() else {
                break;
            };
            write_value(self.byte_order, value, out);
        }

        Ok(())
    }

    /// Decode one record from `src`, which must be exactly `byte_width` long
    pub fn unpack_from(&self, src: &[u8]) -> ShmResult<Record> {
        if src.len() != self.byte_width {
            return Err(ShmError::InvalidSize { size: src.len() });
        }

        let mut offset = 0;
        let mut values = Vec::with_capacity(self.value_count());
        for kind in &self.fields {
            let width = kind.width();
            let bytes = &src[offset..offset + width];
            offset += width;

            if kind.has_value() {
                values.push(read_value(self.byte_order, *kind, bytes));
            }
        }

        Ok(Record::new(values))
    }

    fn shape(&self) -> String {
        let names: Vec<String> = self
            .fields
            .iter()
            .filter(|kind| kind.has_value())
            .map(|kind| match kind {
                FieldKind::Bytes(n) => format!("bytes[{n}]"),
                other => other.type_name().to_string(),
            })
            .collect();
        format!("({})", names.join(", "))
    }
}

impl FromStr for RecordLayout {
    type Err = ShmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RecordLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

fn invalid_layout(reason: String) -> ShmError {
    ShmError::InvalidLayout { reason }
}

fn kind_accepts(kind: &FieldKind, value: &FieldValue) -> bool {
    matches!(
        (kind, value),
        (FieldKind::Bool, FieldValue::Bool(_))
            | (FieldKind::I8, FieldValue::I8(_))
            | (FieldKind::U8, FieldValue::U8(_))
            | (FieldKind::I16, FieldValue::I16(_))
            | (FieldKind::U16, FieldValue::U16(_))
            | (FieldKind::I32, FieldValue::I32(_))
            | (FieldKind::U32, FieldValue::U32(_))
            | (FieldKind::I64, FieldValue::I64(_))
            | (FieldKind::U64, FieldValue::U64(_))
            | (FieldKind::F32, FieldValue::F32(_))
            | (FieldKind::F64, FieldValue::F64(_))
    ) || matches!((kind, value), (FieldKind::Bytes(n), FieldValue::Bytes(b)) if b.len() == *n)
}

macro_rules! encode {
    ($order:expr, $value:expr) => {
        match $order {
            ByteOrder::Native => $value.to_ne_bytes(),
            ByteOrder::Little => $value.to_le_bytes(),
            ByteOrder::Big => $value.to_be_bytes(),
        }
    };
}

macro_rules! decode {
    ($order:expr, $ty:ty, $bytes:expr) => {{
        let mut raw = [0u8; std::mem::size_of::<$ty>()];
        raw.copy_from_slice($bytes);
        match $order {
            ByteOrder::Native => <$ty>::from_ne_bytes(raw),
            ByteOrder::Little => <$ty>::from_le_bytes(raw),
            ByteOrder::Big => <$ty>::from_be_bytes(raw),
        }
    }};
}

fn write_value(order: ByteOrder, value: &FieldValue, out: &mut [u8]) {
    match value {
        FieldValue::Bool(v) => out[0] = u8::from(*v),
        FieldValue::I8(v) => out.copy_from_slice(&v.to_ne_bytes()),
        FieldValue::U8(v) => out[0] = *v,
        FieldValue::I16(v) => out.copy_from_slice(&encode!(order, v)),
        FieldValue::U16(v) => out.copy_from_slice(&encode!(order, v)),
        FieldValue::I32(v) => out.copy_from_slice(&encode!(order, v)),
        FieldValue::U32(v) => out.copy_from_slice(&encode!(order, v)),
        FieldValue::I64(v) => out.copy_from_slice(&encode!(order, v)),
        FieldValue::U64(v) => out.copy_from_slice(&encode!(order, v)),
        FieldValue::F32(v) => out.copy_from_slice(&encode!(order, v)),
        FieldValue::F64(v) => out.copy_from_slice(&encode!(order, v)),
        FieldValue::Bytes(v) => out.copy_from_slice(v),
    }
}

fn read_value(order: ByteOrder, kind: FieldKind, bytes: &[u8]) -> FieldValue {
    match kind {
        FieldKind::Bool => FieldValue::Bool(bytes[0] != 0),
        FieldKind::I8 => FieldValue::I8(i8::from_ne_bytes([bytes[0]])),
        FieldKind::U8 => FieldValue::U8(bytes[0]),
        FieldKind::I16 => FieldValue::I16(decode!(order, i16, bytes)),
        FieldKind::U16 => FieldValue::U16(decode!(order, u16, bytes)),
        FieldKind::I32 => FieldValue::I32(decode!(order, i32, bytes)),
        FieldKind::U32 => FieldValue::U32(decode!(order, u32, bytes)),
        FieldKind::I64 => FieldValue::I64(decode!(order, i64, bytes)),
        FieldKind::U64 => FieldValue::U64(decode!(order, u64, bytes)),
        FieldKind::F32 => FieldValue::F32(decode!(order, f32, bytes)),
        FieldKind::F64 => FieldValue::F64(decode!(order, f64, bytes)),
        FieldKind::Bytes(_) | FieldKind::Pad(_) => FieldValue::Bytes(bytes.to_vec()),
    }
}
