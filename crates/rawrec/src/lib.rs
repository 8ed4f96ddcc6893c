//! Rawrec: schema-driven records over pluggable allocators.
//!
//! Declare record types in a small type grammar, classify every field
//! into a canonical ownership shape, and compile the schema into an
//! executable object model: construction, typed setters and accessors,
//! dynamic array capacity changes, and recursive teardown, all against
//! an allocator you supply. A guarded debug allocator verifies that
//! every mutation sequence returns every byte.
//!
//! This is the top-level facade crate that re-exports the public API
//! from all rawrec sub-crates. For most users, adding `rawrec` as a
//! single dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use rawrec::prelude::*;
//!
//! // Declare two record types.
//! let mut builder = SchemaBuilder::new();
//! let item = builder.declare("Item");
//! let order = builder.declare("Order");
//! builder.field(item, &["name"], RawType::named("string"));
//! builder.field(item, &["quantity"], RawType::named("uint32"));
//! builder.field(order, &["reference"], RawType::named("string"));
//! builder.field(order, &["lines"], RawType::slice(RawType::named("Item")));
//! let (schema, errors) = builder.build();
//! assert!(errors.is_empty());
//!
//! // Compile and run against a guarded allocator.
//! let model = ObjectModel::emit(schema);
//! let alloc = DebugAllocator::new();
//! let mut order_rec = model.construct(order, &alloc);
//! let reference = model.schema().record(order).field_named("reference").unwrap();
//! let lines = model.schema().record(order).field_named("lines").unwrap();
//! let name = model.schema().record(item).field_named("name").unwrap();
//!
//! model.set(&mut order_rec, reference, "PO-4471");
//! model.set_capacity(&mut order_rec, lines, 2, false);
//! let mut line = model.record_at(&order_rec, lines, 0);
//! model.set(&mut line, name, "widget");
//!
//! assert_eq!(model.str_value(&order_rec, reference), "PO-4471");
//! assert_eq!(model.str_value(&model.record_at(&order_rec, lines, 0), name), "widget");
//!
//! // Teardown is recursive; the guarded allocator proves nothing leaked.
//! model.free(&mut order_rec);
//! assert_eq!(alloc.usage(), 0);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in
//! the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`schema`] | `rawrec-core` | Type grammar, shapes, classifier, schema builder |
//! | [`alloc`] | `rawrec-alloc` | Allocator capability, system and guarded allocators |
//! | [`plan`] | `rawrec-plan` | Free plans and synthesized mutator operations |
//! | [`object`] | `rawrec-object` | Layouts and the executable object runtime |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Schema model, shape taxonomy, and field classifier (`rawrec-core`).
///
/// Declare fields through [`schema::SchemaBuilder`]; every declared
/// type either classifies into a [`schema::Shape`] or is rejected with
/// a [`schema::SchemaError`] naming the offending field.
pub use rawrec_core as schema;

/// Allocator capability and implementations (`rawrec-alloc`).
///
/// [`alloc::SystemAllocator`] delegates to the C heap;
/// [`alloc::DebugAllocator`] wraps any strategy with guard bytes and a
/// live-byte counter.
pub use rawrec_alloc as alloc;

/// Free-plan and mutator-operation synthesis (`rawrec-plan`).
///
/// Purely structural artifacts derived from a schema, consumed by the
/// object runtime and inspectable on their own.
pub use rawrec_plan as plan;

/// Byte layouts and the executable object runtime (`rawrec-object`).
///
/// [`object::ObjectModel`] is the main entry point; it compiles a
/// schema and interprets every synthesized operation against raw
/// allocator-owned blocks.
pub use rawrec_object as object;

/// Common imports for typical rawrec usage.
///
/// ```rust
/// use rawrec::prelude::*;
/// ```
pub mod prelude {
    // Schema declaration and classification
    pub use rawrec_core::{
        FieldDecl, FieldId, RawType, RecordId, ScalarKind, Schema, SchemaBuilder, SchemaError,
        Shape,
    };

    // Allocators
    pub use rawrec_alloc::{AllocStrategy, DebugAllocator, SystemAllocator};

    // Runtime
    pub use rawrec_object::{ObjectModel, RecordHandle, ScalarValue, Value};
}
