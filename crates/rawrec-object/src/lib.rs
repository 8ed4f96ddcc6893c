//! Executable object runtime for rawrec schemas.
//!
//! [`ObjectModel::emit`] compiles a classified schema into byte layouts
//! and then interprets the synthesized plans against raw
//! allocator-owned blocks: construction, typed setters and accessors,
//! dynamic array capacity changes, and recursive teardown.
//!
//! This is the one crate in the workspace that touches raw memory. The
//! unsafe surface is confined to the layout arithmetic and the plan
//! interpreter. Mutating operations take their [`RecordHandle`]
//! exclusively, so accessor borrows cannot span a mutation; navigation
//! views follow the aliasing contract documented on [`RecordHandle`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod handle;
mod heap;
pub mod layout;
pub mod model;
pub mod value;

pub use handle::RecordHandle;
pub use layout::{LayoutTable, RecordLayout};
pub use model::ObjectModel;
pub use value::{ScalarValue, Value};
