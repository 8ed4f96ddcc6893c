//! Ownership-aware operation synthesis for rawrec schemas.
//!
//! Consumes a classified [`Schema`](rawrec_core::Schema) and produces,
//! per record type, an ordered recursive free plan and a set of mutator
//! operation specs. Both are plain data: the object runtime interprets
//! them, and the invariants live here — every owned sub-object is
//! visited exactly once, children before containers, displaced values
//! freed before replacements are installed.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod free;
pub mod mutate;

pub use free::{plan_free, ElemFree, FreeAction, FreePlan, FreeStep, TargetFree};
pub use mutate::{direct_scalar, plan_mutators, ElemSet, MutatorOp};
