//! Built-in scalar kinds and their storage geometry.

use std::fmt;

/// A built-in scalar type.
///
/// Scalars are plain values: they own nothing, so the free planner skips
/// them entirely. Strings are *not* scalars here — a string owns a backing
/// buffer and has its own shape variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// `bool`, one byte.
    Bool,
    /// `i8`.
    I8,
    /// `i16`.
    I16,
    /// `i32`.
    I32,
    /// `i64`.
    I64,
    /// `u8`.
    U8,
    /// `u16`.
    U16,
    /// `u32`.
    U32,
    /// `u64`.
    U64,
    /// `f32`.
    F32,
    /// `f64`.
    F64,
}

impl ScalarKind {
    /// Storage size in bytes.
    pub fn size(self) -> usize {
        match self {
            Self::Bool | Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    /// Required alignment in bytes. Equal to the size for every kind.
    pub fn align(self) -> usize {
        self.size()
    }

    /// Resolve a built-in type name to a scalar kind.
    ///
    /// Accepts both the short spellings (`i32`, `f64`) and the long ones
    /// declarations commonly carry (`int32`, `float64`). Returns `None`
    /// for names that are not built-in scalars (record references and
    /// strings are handled elsewhere).
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "bool" => Self::Bool,
            "i8" | "int8" => Self::I8,
            "i16" | "int16" => Self::I16,
            "i32" | "int32" => Self::I32,
            "i64" | "int64" => Self::I64,
            "u8" | "uint8" | "byte" => Self::U8,
            "u16" | "uint16" => Self::U16,
            "u32" | "uint32" => Self::U32,
            "u64" | "uint64" => Self::U64,
            "f32" | "float32" => Self::F32,
            "f64" | "float64" => Self::F64,
            _ => return None,
        })
    }

    /// Canonical type name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
