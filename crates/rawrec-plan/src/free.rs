//! Recursive free-plan synthesis.
//!
//! [`plan_free`] walks a record's classified fields in declaration order
//! and produces one [`FreeStep`] per field that owns anything, plus a
//! final release-self step. The plan is purely structural: executing it
//! involves no branching beyond null checks, and children are always
//! released before the container that holds them.

use rawrec_core::{Elem, FieldId, RecordId, Schema, Shape, Target};

/// What an owned pointer slot's target requires at free time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetFree {
    /// One raw block: scalar targets, and string targets (whose header
    /// and bytes share a single allocation).
    RawBlock,
    /// A record: recurse into its own free plan, which releases its
    /// block as its final step.
    Record(RecordId),
}

/// Per-element free behavior for array shapes.
///
/// Inline plain scalars never appear here — nothing to release.
/// Pointer elements to scalar or string targets free the raw block
/// directly, never through a record free path: the classifier guarantees
/// such pointers cannot reach a record, so the raw free is complete.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElemFree {
    /// Inline string element: free its backing buffer if non-null. The
    /// element header itself lives in the array storage.
    StrBuf,
    /// Inline record element: recurse; the element's storage belongs to
    /// the array.
    Record(RecordId),
    /// Pointer element to a scalar or string: free the block if
    /// non-null.
    PointerRaw,
    /// Pointer element to a record: recurse if non-null.
    PointerRecord(RecordId),
}

impl ElemFree {
    /// Derive the element free behavior, if the element owns anything.
    pub fn of(elem: Elem) -> Option<Self> {
        if elem.by_pointer {
            Some(match elem.target {
                Target::Record(id) => Self::PointerRecord(id),
                Target::Scalar(_) | Target::Str => Self::PointerRaw,
            })
        } else {
            match elem.target {
                Target::Str => Some(Self::StrBuf),
                Target::Record(id) => Some(Self::Record(id)),
                Target::Scalar(_) => None,
            }
        }
    }
}

/// The free action for one field slot.
///
/// Array variants carry `Option<ElemFree>`: `None` means the elements
/// need no per-element work but (for the dynamic and pointer forms) the
/// backing block must still be released.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FreeAction {
    /// Inline string: free the backing buffer if non-null. The inline
    /// header is part of the record and is never freed separately.
    StrBuf,
    /// Inline nested record: recurse into its children; its storage is
    /// the parent's.
    Record(RecordId),
    /// Owned pointer: free the target if non-null, then clear the slot.
    Pointer(TargetFree),
    /// Fixed inline array: per-element action only; storage is inline.
    /// Only emitted when the elements own something.
    FixedArray {
        /// Element count.
        len: usize,
        /// Per-element action.
        elem: ElemFree,
    },
    /// Dynamic array: per-element action, then free the backing block.
    DynamicArray {
        /// Per-element action, if the elements own anything.
        elem: Option<ElemFree>,
    },
    /// Pointer to fixed array: per-element action, free the block,
    /// clear the pointer.
    FixedArrayPtr {
        /// Element count.
        len: usize,
        /// Per-element action, if any.
        elem: Option<ElemFree>,
    },
    /// Pointer to dynamic array: per-element action, then free the one
    /// block holding header and elements, clear the pointer.
    DynamicArrayPtr {
        /// Per-element action, if any.
        elem: Option<ElemFree>,
    },
}

/// One step of a free plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FreeStep {
    /// Release everything the field owns.
    Field {
        /// The field slot.
        field: FieldId,
        /// What to release.
        action: FreeAction,
    },
    /// Final step: release the record's own block if it was allocated
    /// standalone; for embedded records, only reset the re-entrancy
    /// guard and leave the block to the owner.
    ReleaseSelf,
}

/// An ordered free plan for one record type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FreePlan {
    record: RecordId,
    steps: Vec<FreeStep>,
}

impl FreePlan {
    /// The record this plan frees.
    pub fn record(&self) -> RecordId {
        self.record
    }

    /// The steps, in execution order. Always ends with
    /// [`FreeStep::ReleaseSelf`].
    pub fn steps(&self) -> &[FreeStep] {
        &self.steps
    }
}

/// Synthesize the free plan for `record`.
///
/// Fields are visited in declaration order; scalar fields and fixed
/// arrays of plain scalars contribute no step.
pub fn plan_free(schema: &Schema, record: RecordId) -> FreePlan {
    let def = schema.record(record);
    let mut steps = Vec::new();

    for slot in def.slots() {
        let action = match slot.shape {
            Shape::Scalar(_) => None,
            Shape::Str => Some(FreeAction::StrBuf),
            Shape::Record(id) => Some(FreeAction::Record(id)),
            Shape::Pointer(target) => Some(FreeAction::Pointer(match target {
                Target::Record(id) => TargetFree::Record(id),
                Target::Scalar(_) | Target::Str => TargetFree::RawBlock,
            })),
            Shape::FixedArray { len, elem } => {
                ElemFree::of(elem).map(|elem| FreeAction::FixedArray { len, elem })
            }
            Shape::DynamicArray { elem } => Some(FreeAction::DynamicArray {
                elem: ElemFree::of(elem),
            }),
            Shape::FixedArrayPtr { len, elem } => Some(FreeAction::FixedArrayPtr {
                len,
                elem: ElemFree::of(elem),
            }),
            Shape::DynamicArrayPtr { elem } => Some(FreeAction::DynamicArrayPtr {
                elem: ElemFree::of(elem),
            }),
        };
        if let Some(action) = action {
            steps.push(FreeStep::Field {
                field: slot.field,
                action,
            });
        }
    }

    steps.push(FreeStep::ReleaseSelf);
    FreePlan { record, steps }
}
