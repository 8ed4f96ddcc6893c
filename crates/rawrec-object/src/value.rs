//! Values accepted by the synthesized setters.

use rawrec_core::ScalarKind;

use crate::handle::RecordHandle;

/// A scalar payload tagged with its kind.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScalarValue {
    /// Boolean, stored as one byte (0 or 1).
    Bool(bool),
    /// Signed 8-bit integer.
    I8(i8),
    /// Signed 16-bit integer.
    I16(i16),
    /// Signed 32-bit integer.
    I32(i32),
    /// Signed 64-bit integer.
    I64(i64),
    /// Unsigned 8-bit integer.
    U8(u8),
    /// Unsigned 16-bit integer.
    U16(u16),
    /// Unsigned 32-bit integer.
    U32(u32),
    /// Unsigned 64-bit integer.
    U64(u64),
    /// 32-bit float.
    F32(f32),
    /// 64-bit float.
    F64(f64),
}

impl ScalarValue {
    /// The kind tag of this value.
    #[must_use]
    pub fn kind(&self) -> ScalarKind {
        match self {
            Self::Bool(_) => ScalarKind::Bool,
            Self::I8(_) => ScalarKind::I8,
            Self::I16(_) => ScalarKind::I16,
            Self::I32(_) => ScalarKind::I32,
            Self::I64(_) => ScalarKind::I64,
            Self::U8(_) => ScalarKind::U8,
            Self::U16(_) => ScalarKind::U16,
            Self::U32(_) => ScalarKind::U32,
            Self::U64(_) => ScalarKind::U64,
            Self::F32(_) => ScalarKind::F32,
            Self::F64(_) => ScalarKind::F64,
        }
    }
}

macro_rules! scalar_from {
    ($($prim:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$prim> for ScalarValue {
                fn from(v: $prim) -> Self {
                    Self::$variant(v)
                }
            }

            impl From<$prim> for Value<'_, '_> {
                fn from(v: $prim) -> Self {
                    Value::Scalar(ScalarValue::$variant(v))
                }
            }
        )*
    };
}

scalar_from! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
}

/// A value handed to a setter.
///
/// `'s` is the lifetime of a borrowed string payload (copied during the
/// call, never retained); `'al` ties an adopted record to the same
/// allocator lifetime as its new parent.
#[derive(Debug)]
pub enum Value<'s, 'al> {
    /// Clear an owned pointer slot, freeing its current target.
    Null,
    /// A scalar payload.
    Scalar(ScalarValue),
    /// A string payload, deep-copied into allocator-owned storage.
    Str(&'s str),
    /// A standalone record to adopt, transferring ownership.
    Record(RecordHandle<'al>),
}

impl<'s> From<&'s str> for Value<'s, '_> {
    fn from(s: &'s str) -> Self {
        Value::Str(s)
    }
}

impl From<ScalarValue> for Value<'_, '_> {
    fn from(v: ScalarValue) -> Self {
        Value::Scalar(v)
    }
}

impl<'al> From<RecordHandle<'al>> for Value<'_, 'al> {
    fn from(rec: RecordHandle<'al>) -> Self {
        Value::Record(rec)
    }
}
