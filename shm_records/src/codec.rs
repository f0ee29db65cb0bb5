//! Packing and unpacking of record values
//!
//! [`RecordCodec`] is the seam between a record view and the bytes it
//! manages. [`RecordLayout`] is the general-purpose codec; [`Scalar`] covers
//! the common single-primitive case without going through [`Record`]. Custom
//! codecs implement the trait directly and are dispatched statically.

use crate::error::{ShmError, ShmResult};
use crate::layout::{FieldKind, RecordLayout};
use crate::record::Record;
use std::marker::PhantomData;

/// Converts between typed record values and their fixed-width byte encoding
pub trait RecordCodec: Send + Sync {
    /// Decoded record type
    type Value;

    /// Serializable description of the encoding, carried by handles
    fn layout(&self) -> RecordLayout;

    /// Bytes per record; must equal `layout().byte_width()`
    fn byte_width(&self) -> usize;

    /// Encode `value` into `dst` (exactly `byte_width` bytes).
    ///
    /// Must fail with `ShapeMismatch` before writing if the value does not
    /// fit the encoding.
    fn pack(&self, value: &Self::Value, dst: &mut [u8]) -> ShmResult<()>;

    /// Decode one record from `src` (exactly `byte_width` bytes)
    fn unpack(&self, src: &[u8]) -> ShmResult<Self::Value>;
}

impl RecordCodec for RecordLayout {
    type Value = Record;

    fn layout(&self) -> RecordLayout {
        self.clone()
    }

    fn byte_width(&self) -> usize {
        RecordLayout::byte_width(self)
    }

    fn pack(&self, value: &Record, dst: &mut [u8]) -> ShmResult<()> {
        self.pack_into(value, dst)
    }

    fn unpack(&self, src: &[u8]) -> ShmResult<Record> {
        self.unpack_from(src)
    }
}

/// Primitive that can stand alone as a native-order record
pub trait ScalarField: Copy + Send + Sync + 'static {
    /// Matching layout field
    const KIND: FieldKind;

    /// Native-order encoding into exactly `size_of::<Self>()` bytes
    fn write_ne(self, dst: &mut [u8]);

    /// Native-order decoding from exactly `size_of::<Self>()` bytes
    fn read_ne(src: &[u8]) -> Self;
}

macro_rules! impl_scalar_field {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl ScalarField for $ty {
                const KIND: FieldKind = FieldKind::$kind;

                fn write_ne(self, dst: &mut [u8]) {
                    dst.copy_from_slice(&self.to_ne_bytes());
                }

                fn read_ne(src: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(src);
                    <$ty>::from_ne_bytes(raw)
                }
            }
        )*
    };
}

impl_scalar_field! {
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
}

/// Codec for records made of a single native-order primitive
#[derive(Debug, Clone, Copy, Default)]
pub struct Scalar<T>(PhantomData<fn() -> T>);

impl<T: ScalarField> Scalar<T> {
    /// Codec instance
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: ScalarField> RecordCodec for Scalar<T> {
    type Value = T;

    fn layout(&self) -> RecordLayout {
        RecordLayout::single(T::KIND)
    }

    fn byte_width(&self) -> usize {
        std::mem::size_of::<T>()
    }

    fn pack(&self, value: &T, dst: &mut [u8]) -> ShmResult<()> {
        if dst.len() != self.byte_width() {
            return Err(ShmError::InvalidSize { size: dst.len() });
        }
        value.write_ne(dst);
        Ok(())
    }

    fn unpack(&self, src: &[u8]) -> ShmResult<T> {
        if src.len() != self.byte_width() {
            return Err(ShmError::InvalidSize { size: src.len() });
        }
        Ok(T::read_ne(src))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldValue;

    #[test]
    fn test_scalar_matches_layout_encoding() {
        let scalar = Scalar::<i64>::new();
        let layout = scalar.layout();
        assert_eq!(scalar.byte_width(), layout.byte_width());

        let mut via_scalar = [0u8; 8];
        scalar.pack(&-42, &mut via_scalar).unwrap();

        let mut via_layout = [0u8; 8];
        layout
            .pack_into(&Record::single(-42i64), &mut via_layout)
            .unwrap();

        assert_eq!(via_scalar, via_layout);
        assert_eq!(scalar.unpack(&via_layout).unwrap(), -42);
    }

    #[test]
    fn test_layout_codec_delegates() {
        let layout = RecordLayout::parse("Bd").unwrap();
        let record = Record::new(vec![FieldValue::U8(9), FieldValue::F64(0.5)]);

        let mut buf = vec![0u8; RecordCodec::byte_width(&layout)];
        layout.pack(&record, &mut buf).unwrap();
        assert_eq!(layout.unpack(&buf).unwrap(), record);
    }

    #[test]
    fn test_scalar_rejects_wrong_length() {
        let scalar = Scalar::<u32>::new();
        assert!(matches!(
            scalar.unpack(&[0u8; 2]),
            Err(ShmError::InvalidSize { size: 2 })
        ));
    }
}
