//! The canonical field-shape taxonomy.
//!
//! Every supported field declaration resolves to exactly one [`Shape`].
//! The planner and the object runtime pattern-match these enums
//! exhaustively, so adding a taxonomy entry is a compile error at every
//! site that has not been taught about it.

use crate::id::RecordId;
use crate::scalar::ScalarKind;

/// What an owned pointer (or a pointer array element) points at.
///
/// Single-level indirection only: a target is always a leaf value, never
/// another pointer or array. The classifier rejects anything deeper.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    /// A heap-allocated scalar value.
    Scalar(ScalarKind),
    /// A heap-allocated string (header and bytes share one block).
    Str,
    /// Another record type; implicitly owned and freed recursively.
    Record(RecordId),
}

/// Element description for fixed and dynamic arrays.
///
/// `by_pointer` is the orthogonal elements-are-pointers flag: when set,
/// each element is an owned nullable pointer to `target` rather than an
/// inline value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Elem {
    /// The element value (or pointee) type.
    pub target: Target,
    /// Elements are pointers to `target` rather than inline values.
    pub by_pointer: bool,
}

impl Elem {
    /// Inline element of the given target type.
    pub fn inline(target: Target) -> Self {
        Self {
            target,
            by_pointer: false,
        }
    }

    /// Pointer element to the given target type.
    pub fn pointer(target: Target) -> Self {
        Self {
            target,
            by_pointer: true,
        }
    }

    /// Whether this element owns anything a free pass must visit.
    ///
    /// Inline plain scalars own nothing; everything else does.
    pub fn owns_anything(&self) -> bool {
        self.by_pointer || !matches!(self.target, Target::Scalar(_))
    }
}

/// The resolved shape of one field slot.
///
/// Ownership rules per variant:
///
/// - [`Scalar`](Shape::Scalar): owns nothing.
/// - [`Str`](Shape::Str): owns its backing buffer; the inline header
///   `{ptr, len}` itself is part of the record and never freed separately.
/// - [`Record`](Shape::Record): nested record embedded inline; its
///   children are owned, its block is the parent's.
/// - [`Pointer`](Shape::Pointer): owns the pointed-to allocation (and,
///   for record targets, everything the record owns).
/// - [`FixedArray`](Shape::FixedArray): `len` inline elements; element
///   storage is part of the record.
/// - [`DynamicArray`](Shape::DynamicArray): inline `{ptr, len}` header;
///   owns the backing element block.
/// - [`FixedArrayPtr`](Shape::FixedArrayPtr): owned pointer to a block of
///   `len` elements.
/// - [`DynamicArrayPtr`](Shape::DynamicArrayPtr): owned pointer to a
///   single block holding the array header and the elements.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    /// A plain scalar value.
    Scalar(ScalarKind),
    /// An owned string: inline header, owned backing buffer.
    Str,
    /// A nested record embedded inline.
    Record(RecordId),
    /// An owned nullable pointer to a leaf value.
    Pointer(Target),
    /// A fixed-size inline array.
    FixedArray {
        /// Number of elements.
        len: usize,
        /// Element description.
        elem: Elem,
    },
    /// A dynamically sized array (inline header, owned backing block).
    DynamicArray {
        /// Element description.
        elem: Elem,
    },
    /// An owned pointer to a fixed-size array block.
    FixedArrayPtr {
        /// Number of elements.
        len: usize,
        /// Element description.
        elem: Elem,
    },
    /// An owned pointer to a dynamic array block (header + elements in
    /// one allocation, freed as a unit).
    DynamicArrayPtr {
        /// Element description.
        elem: Elem,
    },
}

impl Shape {
    /// Whether a free pass has any work to do for this shape.
    pub fn owns_anything(&self) -> bool {
        match self {
            Self::Scalar(_) => false,
            Self::Str | Self::Record(_) | Self::Pointer(_) => true,
            Self::FixedArray { elem, .. } => elem.owns_anything(),
            // Dynamic arrays own their backing block even when the
            // elements are plain scalars.
            Self::DynamicArray { .. } => true,
            Self::FixedArrayPtr { .. } | Self::DynamicArrayPtr { .. } => true,
        }
    }

    /// The record types this shape embeds *inline* (not via pointers or
    /// heap blocks). Used for the infinite-size cycle check.
    pub fn inline_record(&self) -> Option<RecordId> {
        match self {
            Self::Record(id) => Some(*id),
            Self::FixedArray { elem, .. } if !elem.by_pointer => match elem.target {
                Target::Record(id) => Some(id),
                _ => None,
            },
            _ => None,
        }
    }

    /// Every record type this shape references, by any route.
    pub fn referenced_record(&self) -> Option<RecordId> {
        let target = match self {
            Self::Scalar(_) | Self::Str => return None,
            Self::Record(id) => return Some(*id),
            Self::Pointer(t) => *t,
            Self::FixedArray { elem, .. }
            | Self::DynamicArray { elem }
            | Self::FixedArrayPtr { elem, .. }
            | Self::DynamicArrayPtr { elem } => elem.target,
        };
        match target {
            Target::Record(id) => Some(id),
            _ => None,
        }
    }
}
