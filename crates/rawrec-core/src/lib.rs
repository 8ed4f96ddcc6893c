//! Schema model and field classifier for the rawrec object system.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the ownership taxonomy ([`Shape`]), the declared-type grammar the
//! classifier consumes ([`RawType`]), record/field definitions, the
//! schema registry, and the two-phase [`SchemaBuilder`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod builder;
pub mod classify;
pub mod error;
pub mod id;
pub mod raw;
pub mod scalar;
pub mod schema;
pub mod shape;

pub use builder::{FieldDecl, SchemaBuilder};
pub use classify::{classify, ResolveRecord};
pub use error::{SchemaError, UnsupportedReason};
pub use id::{FieldId, RecordId};
pub use raw::{ArrayLen, InlineKind, RawType};
pub use scalar::ScalarKind;
pub use schema::{FieldSpec, RecordDef, Schema, Slot};
pub use shape::{Elem, Shape, Target};
