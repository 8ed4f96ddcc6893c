//! Schema-time error types.
//!
//! Classification errors are ordinary values: one error names exactly one
//! record/field pair and why it was rejected. Runtime memory faults are
//! not represented here — those are unrecoverable and panic at the site
//! of detection.

use std::error::Error;
use std::fmt;

/// Why a declared field type falls outside the supported taxonomy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnsupportedReason {
    /// An inline anonymous struct in field position.
    InlineStruct,
    /// An inline interface in field position.
    InlineInterface,
    /// A map type.
    Map,
    /// A variadic (`[...]T`) array declaration.
    VariadicArray,
    /// An array whose element is itself an array.
    MultiDimensionalArray,
    /// A pointer whose target is again a pointer.
    DoublePointer,
    /// A pointer array element whose target is not a leaf type.
    PointerElementTarget,
}

impl fmt::Display for UnsupportedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::InlineStruct => "inline struct fields are not supported",
            Self::InlineInterface => "inline interface fields are not supported",
            Self::Map => "map fields are not supported",
            Self::VariadicArray => "variadic array fields are not supported",
            Self::MultiDimensionalArray => "multidimensional array fields are not supported",
            Self::DoublePointer => "double pointer fields are not supported",
            Self::PointerElementTarget => "unsupported array-of-pointers element type",
        };
        f.write_str(msg)
    }
}

/// Errors detected while classifying a schema.
///
/// Every variant names the record (and where applicable the field) that
/// failed, so callers can report precisely and continue with the records
/// that classified cleanly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SchemaError {
    /// A field's declared type is outside the supported taxonomy.
    UnsupportedField {
        /// Record the field belongs to.
        record: String,
        /// Offending field name(s), comma-joined for multi-name decls.
        field: String,
        /// Why the type was rejected.
        reason: UnsupportedReason,
    },
    /// A named type is neither a built-in nor a declared record.
    UnknownType {
        /// Record the field belongs to.
        record: String,
        /// Offending field name(s).
        field: String,
        /// The unresolved type name.
        type_name: String,
    },
    /// A record embeds itself inline (directly or via other records),
    /// which would make it infinitely sized. Recursion through pointers
    /// is fine; inline recursion is not.
    InlineCycle {
        /// A record on the cycle.
        record: String,
    },
    /// A record was dropped because a record it references failed
    /// classification.
    DroppedDependency {
        /// The dropped record.
        record: String,
        /// The failed record it depends on.
        depends_on: String,
    },
    /// Two records were declared with the same name.
    DuplicateRecord {
        /// The duplicated name.
        name: String,
    },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedField {
                record,
                field,
                reason,
            } => {
                write!(f, "[{record}/{field}] {reason}")
            }
            Self::UnknownType {
                record,
                field,
                type_name,
            } => {
                write!(f, "[{record}/{field}] unknown type '{type_name}'")
            }
            Self::InlineCycle { record } => {
                write!(f, "[{record}] inline record embedding is cyclic")
            }
            Self::DroppedDependency { record, depends_on } => {
                write!(
                    f,
                    "[{record}] dropped: depends on failed record '{depends_on}'"
                )
            }
            Self::DuplicateRecord { name } => {
                write!(f, "record '{name}' declared more than once")
            }
        }
    }
}

impl Error for SchemaError {}
