//! Opaque handles over live record blocks.

use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

use rawrec_alloc::AllocStrategy;
use rawrec_core::RecordId;

/// A typed handle to a live record block.
///
/// The lifetime parameter pins the allocator the record was constructed
/// against: a handle cannot outlive the strategy that owns its memory.
/// Handles are not `Clone` — a handle is the ownership token for a
/// standalone record, and passing one by value into an adopting setter
/// transfers that ownership.
///
/// Views obtained from the object model's navigation accessors alias
/// storage the parent owns, and the borrow checker does not tie them to
/// the parent handle. The contract is the parent's: a view is valid
/// only while the parent keeps the aliased storage alive. Mutating,
/// resizing, or freeing the slot a view points into — or freeing the
/// parent itself — invalidates the view, and using it afterwards is
/// unspecified. Mutating operations take their handle as `&mut`, so
/// borrows handed out by the accessors cannot span a mutation of the
/// same handle; the view surface is the one place where keeping things
/// alive is the caller's responsibility.
///
/// After a completed standalone free the handle is *cleared*: its
/// pointer is dropped and any further free through it is a no-op.
pub struct RecordHandle<'a> {
    ptr: Option<NonNull<u8>>,
    record: RecordId,
    _alloc: PhantomData<&'a dyn AllocStrategy>,
}

impl<'a> RecordHandle<'a> {
    pub(crate) fn new(ptr: NonNull<u8>, record: RecordId) -> Self {
        Self {
            ptr: Some(ptr),
            record,
            _alloc: PhantomData,
        }
    }

    /// The record type this handle points at.
    #[must_use]
    pub fn record(&self) -> RecordId {
        self.record
    }

    /// True once the record behind this handle has been released.
    #[must_use]
    pub fn is_freed(&self) -> bool {
        self.ptr.is_none()
    }

    /// Base address of the live block.
    ///
    /// # Panics
    ///
    /// Panics if the record has already been freed through this handle.
    pub(crate) fn ptr(&self) -> NonNull<u8> {
        match self.ptr {
            Some(ptr) => ptr,
            None => panic!("record {} has already been freed", self.record),
        }
    }

    pub(crate) fn ptr_opt(&self) -> Option<NonNull<u8>> {
        self.ptr
    }

    /// Clears the handle after its block has been released.
    pub(crate) fn take(&mut self) {
        self.ptr = None;
    }
}

impl fmt::Debug for RecordHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordHandle")
            .field("record", &self.record)
            .field("freed", &self.ptr.is_none())
            .finish()
    }
}
