//! The plain malloc-backed strategy.

use std::ptr::NonNull;

use crate::strategy::AllocStrategy;

/// Allocator strategy over the C heap (`malloc`/`free`).
///
/// No headers, no guards, no accounting — the production variant.
/// Payloads are zero-filled on allocation, like every strategy.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemAllocator;

impl SystemAllocator {
    /// Create a system allocator. Stateless; all instances are
    /// interchangeable.
    pub fn new() -> Self {
        Self
    }
}

impl AllocStrategy for SystemAllocator {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        debug_assert!(size > 0);
        // malloc alignment (16 on the supported targets) covers every
        // field representation rawrec lays out.
        let ptr = NonNull::new(unsafe { libc::malloc(size) }.cast::<u8>())?;
        unsafe { self.zero(ptr, size) };
        Some(ptr)
    }

    unsafe fn free(&self, ptr: NonNull<u8>) {
        libc::free(ptr.as_ptr().cast());
    }

    unsafe fn zero(&self, ptr: NonNull<u8>, size: usize) {
        libc::memset(ptr.as_ptr().cast(), 0, size);
    }

    unsafe fn copy(&self, dest: NonNull<u8>, src: NonNull<u8>, size: usize) {
        libc::memcpy(dest.as_ptr().cast(), src.as_ptr().cast(), size);
    }
}
