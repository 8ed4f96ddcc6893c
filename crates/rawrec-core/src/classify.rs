//! The field shape classifier.
//!
//! Pure and total over the supported grammar: every [`RawType`] either
//! maps to exactly one [`Shape`] or is rejected with a [`SchemaError`]
//! naming the offending record and field. Nothing unsupported survives
//! into a schema, so the planner and runtime never re-validate.

use crate::error::{SchemaError, UnsupportedReason};
use crate::id::RecordId;
use crate::raw::{ArrayLen, InlineKind, RawType};
use crate::scalar::ScalarKind;
use crate::shape::{Elem, Shape, Target};

/// Resolves record type names during classification.
///
/// Implemented by the schema builder over its name table; kept as a trait
/// so classification can be driven from other registries (tests use a
/// closure-backed map).
pub trait ResolveRecord {
    /// Map a declared type name to a record id, if one is declared.
    fn record(&self, name: &str) -> Option<RecordId>;
}

impl<F> ResolveRecord for F
where
    F: Fn(&str) -> Option<RecordId>,
{
    fn record(&self, name: &str) -> Option<RecordId> {
        self(name)
    }
}

/// Classify a declared field type into its canonical shape.
///
/// `record` and `field` are used only for error reporting. See the module
/// docs for the rejection set.
pub fn classify(
    record: &str,
    field: &str,
    raw: &RawType,
    resolver: &dyn ResolveRecord,
) -> Result<Shape, SchemaError> {
    let cx = Cx {
        record,
        field,
        resolver,
    };
    cx.shape(raw)
}

/// Classification context: error coordinates plus the name resolver.
struct Cx<'a> {
    record: &'a str,
    field: &'a str,
    resolver: &'a dyn ResolveRecord,
}

impl Cx<'_> {
    fn shape(&self, raw: &RawType) -> Result<Shape, SchemaError> {
        match raw {
            RawType::Named(name) => Ok(match self.leaf(name)? {
                Target::Scalar(kind) => Shape::Scalar(kind),
                Target::Str => Shape::Str,
                Target::Record(id) => Shape::Record(id),
            }),

            RawType::Slice(elem) => Ok(Shape::DynamicArray {
                elem: self.elem(elem)?,
            }),

            RawType::Array {
                len: ArrayLen::Variadic,
                ..
            } => Err(self.unsupported(UnsupportedReason::VariadicArray)),

            RawType::Array {
                len: ArrayLen::Fixed(len),
                elem,
            } => Ok(Shape::FixedArray {
                len: *len,
                elem: self.elem(elem)?,
            }),

            RawType::Pointer(inner) => self.pointer(inner),

            RawType::Inline(kind) => Err(self.inline(*kind)),
        }
    }

    /// Classify the target of a single-level pointer.
    fn pointer(&self, inner: &RawType) -> Result<Shape, SchemaError> {
        match inner {
            RawType::Named(name) => Ok(Shape::Pointer(self.leaf(name)?)),

            RawType::Pointer(_) => Err(self.unsupported(UnsupportedReason::DoublePointer)),

            RawType::Array {
                len: ArrayLen::Variadic,
                ..
            } => Err(self.unsupported(UnsupportedReason::VariadicArray)),

            RawType::Array {
                len: ArrayLen::Fixed(len),
                elem,
            } => Ok(Shape::FixedArrayPtr {
                len: *len,
                elem: self.elem(elem)?,
            }),

            RawType::Slice(elem) => Ok(Shape::DynamicArrayPtr {
                elem: self.elem(elem)?,
            }),

            RawType::Inline(kind) => Err(self.inline(*kind)),
        }
    }

    /// Classify an array/slice element declaration.
    fn elem(&self, raw: &RawType) -> Result<Elem, SchemaError> {
        match raw {
            RawType::Named(name) => Ok(Elem::inline(self.leaf(name)?)),

            // One more level of indirection is allowed inside arrays:
            // the element may be a pointer to a leaf, nothing deeper.
            RawType::Pointer(inner) => match inner.as_ref() {
                RawType::Named(name) => Ok(Elem::pointer(self.leaf(name)?)),
                _ => Err(self.unsupported(UnsupportedReason::PointerElementTarget)),
            },

            RawType::Array { .. } | RawType::Slice(_) => {
                Err(self.unsupported(UnsupportedReason::MultiDimensionalArray))
            }

            RawType::Inline(kind) => Err(self.inline(*kind)),
        }
    }

    /// Resolve a leaf type name: built-in scalar, string, or record.
    fn leaf(&self, name: &str) -> Result<Target, SchemaError> {
        if let Some(kind) = ScalarKind::from_name(name) {
            return Ok(Target::Scalar(kind));
        }
        if name == "str" || name == "string" {
            return Ok(Target::Str);
        }
        match self.resolver.record(name) {
            Some(id) => Ok(Target::Record(id)),
            None => Err(SchemaError::UnknownType {
                record: self.record.to_string(),
                field: self.field.to_string(),
                type_name: name.to_string(),
            }),
        }
    }

    fn unsupported(&self, reason: UnsupportedReason) -> SchemaError {
        SchemaError::UnsupportedField {
            record: self.record.to_string(),
            field: self.field.to_string(),
            reason,
        }
    }

    fn inline(&self, kind: InlineKind) -> SchemaError {
        self.unsupported(match kind {
            InlineKind::Struct => UnsupportedReason::InlineStruct,
            InlineKind::Interface => UnsupportedReason::InlineInterface,
            InlineKind::Map => UnsupportedReason::Map,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(name: &str) -> Option<RecordId> {
        match name {
            "Sub" => Some(RecordId(1)),
            _ => None,
        }
    }

    fn run(raw: RawType) -> Result<Shape, SchemaError> {
        classify("Sample", "f", &raw, &resolver)
    }

    #[test]
    fn leaf_shapes() {
        assert_eq!(
            run(RawType::named("i32")),
            Ok(Shape::Scalar(ScalarKind::I32))
        );
        assert_eq!(run(RawType::named("str")), Ok(Shape::Str));
        assert_eq!(run(RawType::named("string")), Ok(Shape::Str));
        assert_eq!(run(RawType::named("Sub")), Ok(Shape::Record(RecordId(1))));
    }

    #[test]
    fn pointer_shapes() {
        assert_eq!(
            run(RawType::pointer(RawType::named("u64"))),
            Ok(Shape::Pointer(Target::Scalar(ScalarKind::U64)))
        );
        assert_eq!(
            run(RawType::pointer(RawType::named("Sub"))),
            Ok(Shape::Pointer(Target::Record(RecordId(1))))
        );
    }

    #[test]
    fn array_and_slice_shapes() {
        assert_eq!(
            run(RawType::array(4, RawType::named("str"))),
            Ok(Shape::FixedArray {
                len: 4,
                elem: Elem::inline(Target::Str),
            })
        );
        assert_eq!(
            run(RawType::slice(RawType::pointer(RawType::named("Sub")))),
            Ok(Shape::DynamicArray {
                elem: Elem::pointer(Target::Record(RecordId(1))),
            })
        );
        assert_eq!(
            run(RawType::pointer(RawType::array(8, RawType::named("u8")))),
            Ok(Shape::FixedArrayPtr {
                len: 8,
                elem: Elem::inline(Target::Scalar(ScalarKind::U8)),
            })
        );
        assert_eq!(
            run(RawType::pointer(RawType::slice(RawType::pointer(
                RawType::named("str")
            )))),
            Ok(Shape::DynamicArrayPtr {
                elem: Elem::pointer(Target::Str),
            })
        );
    }

    #[test]
    fn rejects_unsupported_declarations() {
        let cases = [
            (
                RawType::Inline(InlineKind::Struct),
                UnsupportedReason::InlineStruct,
            ),
            (
                RawType::Inline(InlineKind::Interface),
                UnsupportedReason::InlineInterface,
            ),
            (RawType::Inline(InlineKind::Map), UnsupportedReason::Map),
            (
                RawType::Array {
                    len: ArrayLen::Variadic,
                    elem: Box::new(RawType::named("i32")),
                },
                UnsupportedReason::VariadicArray,
            ),
            (
                RawType::array(2, RawType::array(2, RawType::named("i32"))),
                UnsupportedReason::MultiDimensionalArray,
            ),
            (
                RawType::slice(RawType::slice(RawType::named("i32"))),
                UnsupportedReason::MultiDimensionalArray,
            ),
            (
                RawType::pointer(RawType::pointer(RawType::named("i32"))),
                UnsupportedReason::DoublePointer,
            ),
            (
                RawType::slice(RawType::pointer(RawType::pointer(RawType::named("i32")))),
                UnsupportedReason::PointerElementTarget,
            ),
            (
                RawType::pointer(RawType::Inline(InlineKind::Map)),
                UnsupportedReason::Map,
            ),
            (
                RawType::pointer(RawType::Array {
                    len: ArrayLen::Variadic,
                    elem: Box::new(RawType::named("u8")),
                }),
                UnsupportedReason::VariadicArray,
            ),
        ];
        for (raw, reason) in cases {
            assert_eq!(
                run(raw.clone()),
                Err(SchemaError::UnsupportedField {
                    record: "Sample".into(),
                    field: "f".into(),
                    reason,
                }),
                "case {raw:?}"
            );
        }
    }

    #[test]
    fn unknown_names_are_reported() {
        assert_eq!(
            run(RawType::named("Widget")),
            Err(SchemaError::UnknownType {
                record: "Sample".into(),
                field: "f".into(),
                type_name: "Widget".into(),
            })
        );
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn raw_type_strategy() -> impl Strategy<Value = RawType> {
            let leaf = prop_oneof![
                Just(RawType::named("i32")),
                Just(RawType::named("u8")),
                Just(RawType::named("str")),
                Just(RawType::named("Sub")),
                Just(RawType::named("Mystery")),
                Just(RawType::Inline(InlineKind::Struct)),
                Just(RawType::Inline(InlineKind::Interface)),
                Just(RawType::Inline(InlineKind::Map)),
            ];
            leaf.prop_recursive(4, 24, 2, |inner| {
                prop_oneof![
                    inner.clone().prop_map(RawType::pointer),
                    inner.clone().prop_map(RawType::slice),
                    (0usize..4, inner.clone()).prop_map(|(n, t)| RawType::array(n, t)),
                    inner.prop_map(|t| RawType::Array {
                        len: ArrayLen::Variadic,
                        elem: Box::new(t),
                    }),
                ]
            })
        }

        proptest! {
            // Classification is total over the grammar: every tree either
            // yields a shape or an error naming the offending field.
            #[test]
            fn classification_is_total(raw in raw_type_strategy()) {
                match run(raw) {
                    Ok(_) => {}
                    Err(SchemaError::UnsupportedField { record, field, .. }) => {
                        prop_assert_eq!(record, "Sample");
                        prop_assert_eq!(field, "f");
                    }
                    Err(SchemaError::UnknownType { type_name, .. }) => {
                        prop_assert_eq!(type_name, "Mystery");
                    }
                    Err(other) => prop_assert!(false, "unexpected error: {other:?}"),
                }
            }

            // Pure function: equal inputs classify identically.
            #[test]
            fn classification_is_deterministic(raw in raw_type_strategy()) {
                prop_assert_eq!(run(raw.clone()), run(raw));
            }
        }
    }
}
