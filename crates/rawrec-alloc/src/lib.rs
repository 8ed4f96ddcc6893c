//! Allocator strategies for the rawrec object system.
//!
//! Defines the [`AllocStrategy`] capability contract plus two concrete
//! strategies: the plain [`SystemAllocator`] over the C heap, and the
//! guarded, accounting [`DebugAllocator`] that detects buffer overruns
//! and double frees and tracks live bytes for leak assertions. Both
//! satisfy the same contract, so callers are agnostic.
//!
//! This crate contains `unsafe` code, bounded to raw block layout and
//! guard-byte arithmetic; the offsets live in one set of constants in
//! [`debug`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod debug;
pub mod math;
pub mod strategy;
pub mod system;

pub use debug::DebugAllocator;
pub use math::{add_size, mul_size};
pub use strategy::AllocStrategy;
pub use system::SystemAllocator;
