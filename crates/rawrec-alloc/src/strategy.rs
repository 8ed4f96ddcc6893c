//! The allocator capability contract.

use std::ptr::NonNull;

/// A pluggable allocator capability.
///
/// Every record is constructed against one strategy and borrows it for
/// its whole lifetime; the strategy owns none of the memory it hands
/// out — callers own everything they allocate and must pair every
/// successful [`allocate`](AllocStrategy::allocate) with exactly one
/// [`free`](AllocStrategy::free).
///
/// Implementations must return zero-filled payloads from `allocate`.
pub trait AllocStrategy {
    /// Allocate `size` bytes, zero-filled.
    ///
    /// `size` must be non-zero. Returns `None` when the underlying
    /// allocator is out of memory; callers treat that as fatal.
    fn allocate(&self, size: usize) -> Option<NonNull<u8>>;

    /// Release a block previously returned by `allocate`.
    ///
    /// # Safety
    ///
    /// `ptr` must have come from `allocate` on this same strategy and
    /// must not have been freed already.
    unsafe fn free(&self, ptr: NonNull<u8>);

    /// Zero-fill `size` bytes starting at `ptr`.
    ///
    /// # Safety
    ///
    /// The range `ptr..ptr+size` must be writable memory owned by the
    /// caller.
    unsafe fn zero(&self, ptr: NonNull<u8>, size: usize);

    /// Copy `size` bytes from `src` to `dest`. The ranges must not
    /// overlap.
    ///
    /// # Safety
    ///
    /// Both ranges must be valid for the access, and non-overlapping.
    unsafe fn copy(&self, dest: NonNull<u8>, src: NonNull<u8>, size: usize);
}
