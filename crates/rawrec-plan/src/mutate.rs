//! Mutator-operation synthesis.
//!
//! [`plan_mutators`] derives, per field, the mutation operations the
//! object runtime exposes: whole-value setters, indexed element setters,
//! capacity changes for dynamic arrays, and create/destroy for
//! pointer-to-fixed-array fields. Plain scalar fields and elements get
//! no synthesized operation — they are directly readable and writable
//! through the runtime's scalar accessors, owning nothing.

use rawrec_core::{Elem, FieldId, RecordId, ScalarKind, Schema, Shape, Target};

/// What an indexed element setter replaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElemSet {
    /// Inline string element: free the old buffer, duplicate the new
    /// value into allocator-owned storage.
    Str,
    /// Inline record element: free the old element's children, adopt
    /// the new record by value (ownership transfer).
    Record(RecordId),
    /// Pointer element: free-then-replace with the pointer setter
    /// semantics of the target.
    Pointer(Target),
}

impl ElemSet {
    /// Derive the element setter behavior, if one is synthesized.
    pub fn of(elem: Elem) -> Option<Self> {
        if elem.by_pointer {
            Some(Self::Pointer(elem.target))
        } else {
            match elem.target {
                Target::Str => Some(Self::Str),
                Target::Record(id) => Some(Self::Record(id)),
                // Plain scalar elements are stored directly.
                Target::Scalar(_) => None,
            }
        }
    }
}

/// One synthesized mutation operation.
///
/// Shared contract: whenever an operation replaces a value that owns
/// memory, the displaced value is freed *before* the new one is
/// installed, so no mutation sequence can leak. Indexed operations
/// treat the bounds as a caller precondition; the runtime enforces it
/// with a deterministic panic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutatorOp {
    /// Whole-value setter for an inline string field: free the old
    /// buffer, deep-duplicate the new value.
    SetStr {
        /// The field slot.
        field: FieldId,
    },
    /// Whole-value setter for an inline nested record: free the old
    /// children, adopt the new record by value.
    SetRecord {
        /// The field slot.
        field: FieldId,
        /// The nested record type.
        record: RecordId,
    },
    /// Whole-value setter for an owned pointer field. Scalar and string
    /// targets are deep-duplicated into allocator-owned storage (scalar
    /// targets reuse an existing allocation in place); record targets
    /// are adopted by reference, transferring ownership.
    SetPointer {
        /// The field slot.
        field: FieldId,
        /// The pointer target.
        target: Target,
    },
    /// Indexed element setter for any array shape whose elements own
    /// something.
    SetElem {
        /// The field slot.
        field: FieldId,
        /// Element replacement semantics.
        elem: ElemSet,
    },
    /// Capacity setter for a dynamic array field: allocate a new
    /// backing block, preserve up to `min(old, new)` elements on
    /// request, free displaced owned elements, default-initialize added
    /// owned-record slots.
    SetCapacity {
        /// The field slot.
        field: FieldId,
        /// Element description (stride and ownership come from here).
        elem: Elem,
        /// The array header lives behind an owned pointer
        /// ([`Shape::DynamicArrayPtr`]) rather than inline.
        via_pointer: bool,
    },
    /// Allocate and zero-initialize the block of a
    /// pointer-to-fixed-array field, destroying any existing block
    /// first. Nested owned records are default-initialized.
    CreateArray {
        /// The field slot.
        field: FieldId,
        /// Element count.
        len: usize,
        /// Element description.
        elem: Elem,
    },
    /// Free a pointer-to-fixed-array field's elements and block, then
    /// clear the pointer.
    DestroyArray {
        /// The field slot.
        field: FieldId,
        /// Element count.
        len: usize,
        /// Element description.
        elem: Elem,
    },
}

impl MutatorOp {
    /// The field this operation mutates.
    pub fn field(&self) -> FieldId {
        match self {
            Self::SetStr { field }
            | Self::SetRecord { field, .. }
            | Self::SetPointer { field, .. }
            | Self::SetElem { field, .. }
            | Self::SetCapacity { field, .. }
            | Self::CreateArray { field, .. }
            | Self::DestroyArray { field, .. } => *field,
        }
    }
}

/// Synthesize the mutation operations for `record`, in field order.
pub fn plan_mutators(schema: &Schema, record: RecordId) -> Vec<MutatorOp> {
    let def = schema.record(record);
    let mut ops = Vec::new();

    for slot in def.slots() {
        let field = slot.field;
        match slot.shape {
            // Directly accessible; nothing synthesized.
            Shape::Scalar(_) => {}

            Shape::Str => ops.push(MutatorOp::SetStr { field }),

            Shape::Record(id) => ops.push(MutatorOp::SetRecord { field, record: id }),

            Shape::Pointer(target) => ops.push(MutatorOp::SetPointer { field, target }),

            Shape::FixedArray { elem, .. } => {
                if let Some(elem) = ElemSet::of(elem) {
                    ops.push(MutatorOp::SetElem { field, elem });
                }
            }

            Shape::DynamicArray { elem } => {
                ops.push(MutatorOp::SetCapacity {
                    field,
                    elem,
                    via_pointer: false,
                });
                if let Some(elem) = ElemSet::of(elem) {
                    ops.push(MutatorOp::SetElem { field, elem });
                }
            }

            Shape::FixedArrayPtr { len, elem } => {
                ops.push(MutatorOp::CreateArray { field, len, elem });
                ops.push(MutatorOp::DestroyArray { field, len, elem });
                if let Some(elem) = ElemSet::of(elem) {
                    ops.push(MutatorOp::SetElem { field, elem });
                }
            }

            Shape::DynamicArrayPtr { elem } => {
                ops.push(MutatorOp::SetCapacity {
                    field,
                    elem,
                    via_pointer: true,
                });
                if let Some(elem) = ElemSet::of(elem) {
                    ops.push(MutatorOp::SetElem { field, elem });
                }
            }
        }
    }

    ops
}

/// Convenience: the scalar kind of a field that needs no synthesized
/// setter, if it is a plain scalar.
pub fn direct_scalar(shape: Shape) -> Option<ScalarKind> {
    match shape {
        Shape::Scalar(kind) => Some(kind),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rawrec_core::{RawType, SchemaBuilder};

    fn schema() -> (Schema, RecordId) {
        let mut b = SchemaBuilder::new();
        let sub = b.declare("Sub");
        let main = b.declare("Main");
        b.field(sub, &["n"], RawType::named("i32"));

        b.field(main, &["id"], RawType::named("u64"));
        b.field(main, &["name"], RawType::named("str"));
        b.field(main, &["sub"], RawType::named("Sub"));
        b.field(main, &["score"], RawType::pointer(RawType::named("f64")));
        b.field(main, &["tags"], RawType::array(3, RawType::named("str")));
        b.field(main, &["data"], RawType::slice(RawType::named("u8")));
        b.field(main, &["subs"], RawType::slice(RawType::named("Sub")));
        b.field(
            main,
            &["grid"],
            RawType::pointer(RawType::array(16, RawType::named("i32"))),
        );
        b.field(
            main,
            &["refs"],
            RawType::pointer(RawType::slice(RawType::pointer(RawType::named("Sub")))),
        );

        let (schema, errors) = b.build();
        assert!(errors.is_empty(), "{errors:?}");
        let main = schema.id_of("Main").unwrap();
        (schema, main)
    }

    #[test]
    fn scalar_fields_get_no_ops() {
        let (schema, main) = schema();
        let def = schema.record(main);
        let id_field = def.field_named("id").unwrap();
        let ops = plan_mutators(&schema, main);
        assert!(ops.iter().all(|op| op.field() != id_field));
        assert_eq!(direct_scalar(def.slot(id_field).shape), Some(ScalarKind::U64));
    }

    #[test]
    fn dynamic_scalar_arrays_get_capacity_but_no_element_setter() {
        let (schema, main) = schema();
        let def = schema.record(main);
        let data = def.field_named("data").unwrap();
        let ops: Vec<_> = plan_mutators(&schema, main)
            .into_iter()
            .filter(|op| op.field() == data)
            .collect();
        assert_eq!(
            ops,
            vec![MutatorOp::SetCapacity {
                field: data,
                elem: Elem::inline(Target::Scalar(ScalarKind::U8)),
                via_pointer: false,
            }]
        );
    }

    #[test]
    fn owned_shapes_get_their_full_op_families() {
        let (schema, main) = schema();
        let def = schema.record(main);
        let sub = schema.id_of("Sub").unwrap();
        let ops = plan_mutators(&schema, main);
        let of = |name: &str| -> Vec<MutatorOp> {
            let field = def.field_named(name).unwrap();
            ops.iter().copied().filter(|op| op.field() == field).collect()
        };

        assert_eq!(of("name"), vec![MutatorOp::SetStr {
            field: def.field_named("name").unwrap(),
        }]);
        assert!(matches!(of("sub")[..], [MutatorOp::SetRecord { record, .. }] if record == sub));
        assert!(matches!(
            of("score")[..],
            [MutatorOp::SetPointer {
                target: Target::Scalar(ScalarKind::F64),
                ..
            }]
        ));
        assert!(matches!(of("tags")[..], [MutatorOp::SetElem { elem: ElemSet::Str, .. }]));
        assert!(matches!(
            of("subs")[..],
            [
                MutatorOp::SetCapacity { via_pointer: false, .. },
                MutatorOp::SetElem { elem: ElemSet::Record(r), .. },
            ] if r == sub
        ));
        assert!(matches!(
            of("grid")[..],
            [
                MutatorOp::CreateArray { len: 16, .. },
                MutatorOp::DestroyArray { len: 16, .. },
            ]
        ));
        assert!(matches!(
            of("refs")[..],
            [
                MutatorOp::SetCapacity { via_pointer: true, .. },
                MutatorOp::SetElem { elem: ElemSet::Pointer(Target::Record(r)), .. },
            ] if r == sub
        ));
    }
}
