//! The guarded, accounting debug allocator.
//!
//! Every allocation is wrapped in one contiguous block:
//!
//! ```text
//! [lead guard (8B)][size (8B u64)][payload (size B)][trail guard (8B)]
//! ```
//!
//! Guard regions hold a fixed non-zero repeating pattern; any mismatch
//! at free time means the caller wrote outside its payload and is fatal.
//! A live-byte counter is maintained with atomic add/subtract so that
//! concurrent allocate/free calls across threads keep a correct
//! aggregate; an underflow (counter going negative) signals a double
//! free or a corrupted size header and is equally fatal.
//!
//! The block layout lives in the constants below and nowhere else; the
//! three access points (allocate, free checks, size read) all derive
//! their offsets from them.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::math::add_size;
use crate::strategy::AllocStrategy;
use crate::system::SystemAllocator;

/// Width of each guard region.
const GUARD_LEN: usize = 8;
/// Width of the stored size field.
const SIZE_LEN: usize = std::mem::size_of::<u64>();
/// Payload offset from block start: lead guard + size field. Keeps the
/// payload on the raw allocator's 16-byte alignment.
const PAYLOAD_OFFSET: usize = GUARD_LEN + SIZE_LEN;
/// Total per-allocation overhead.
const OVERHEAD: usize = PAYLOAD_OFFSET + GUARD_LEN;
/// The guard fill byte. Non-zero, so a zeroing overrun is caught too.
const GUARD_BYTE: u8 = 0xA5;

/// An [`AllocStrategy`] that wraps another strategy with guard regions
/// and live-byte accounting.
///
/// Functionally identical to the wrapped strategy from the caller's
/// point of view: zero-filled payloads, same ownership rules. Intended
/// for tests and debugging builds; [`usage`](DebugAllocator::usage)
/// reports the live payload bytes, which must return to zero after a
/// full free cycle.
#[derive(Debug, Default)]
pub struct DebugAllocator<A: AllocStrategy = SystemAllocator> {
    inner: A,
    usage: AtomicI64,
}

impl DebugAllocator<SystemAllocator> {
    /// A debug allocator over the system heap.
    pub fn new() -> Self {
        Self::with_inner(SystemAllocator::new())
    }
}

impl<A: AllocStrategy> DebugAllocator<A> {
    /// Wrap an arbitrary inner strategy.
    pub fn with_inner(inner: A) -> Self {
        Self {
            inner,
            usage: AtomicI64::new(0),
        }
    }

    /// Current live payload bytes.
    pub fn usage(&self) -> i64 {
        self.usage.load(Ordering::Acquire)
    }

    unsafe fn check_guard(block: *const u8, offset: usize, which: &str) {
        for i in 0..GUARD_LEN {
            if *block.add(offset + i) != GUARD_BYTE {
                panic!("heap corruption: {which} guard bytes overwritten ({which}-overflow)");
            }
        }
    }
}

impl<A: AllocStrategy> AllocStrategy for DebugAllocator<A> {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        let block_size = add_size(size, OVERHEAD);
        let block = self.inner.allocate(block_size)?;
        unsafe {
            let p = block.as_ptr();
            p.write_bytes(GUARD_BYTE, GUARD_LEN);
            p.add(GUARD_LEN).cast::<u64>().write(size as u64);
            p.add(PAYLOAD_OFFSET + size).write_bytes(GUARD_BYTE, GUARD_LEN);
        }
        self.usage.fetch_add(size as i64, Ordering::AcqRel);
        // Payload was zero-filled by the inner allocation.
        Some(unsafe { NonNull::new_unchecked(block.as_ptr().add(PAYLOAD_OFFSET)) })
    }

    unsafe fn free(&self, ptr: NonNull<u8>) {
        let block = ptr.as_ptr().sub(PAYLOAD_OFFSET);

        Self::check_guard(block, 0, "pre");

        let stored = block.add(GUARD_LEN).cast::<u64>().read();
        // A stored size past the counter's range would wrap negative in
        // the subtraction below and sail through the underflow check,
        // then send the trailing-guard read to a wild address. No
        // legitimate allocation is that large; fault on the header.
        if stored > i64::MAX as u64 {
            panic!(
                "allocation accounting underflow: stored size {stored} exceeds the counter \
                 range (corrupted size header)"
            );
        }
        let size = stored as usize;
        let prev = self.usage.fetch_sub(size as i64, Ordering::AcqRel);
        if prev - (size as i64) < 0 {
            panic!(
                "allocation accounting underflow: freed {size} bytes with only {prev} live \
                 (double free or corrupted size header)"
            );
        }

        Self::check_guard(block, PAYLOAD_OFFSET + size, "post");

        self.inner.free(NonNull::new_unchecked(block));
    }

    unsafe fn zero(&self, ptr: NonNull<u8>, size: usize) {
        self.inner.zero(ptr, size);
    }

    unsafe fn copy(&self, dest: NonNull<u8>, src: NonNull<u8>, size: usize) {
        self.inner.copy(dest, src, size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_tracks_live_bytes() {
        let alloc = DebugAllocator::new();
        assert_eq!(alloc.usage(), 0);

        let a = alloc.allocate(100).unwrap();
        let b = alloc.allocate(28).unwrap();
        assert_eq!(alloc.usage(), 128);

        unsafe { alloc.free(a) };
        assert_eq!(alloc.usage(), 28);
        unsafe { alloc.free(b) };
        assert_eq!(alloc.usage(), 0);
    }

    #[test]
    fn payload_is_zeroed_and_writable_to_the_last_byte() {
        let alloc = DebugAllocator::new();
        let p = alloc.allocate(33).unwrap();
        unsafe {
            let bytes = std::slice::from_raw_parts_mut(p.as_ptr(), 33);
            assert!(bytes.iter().all(|&b| b == 0));
            bytes.fill(0xFF);
            alloc.free(p);
        }
        assert_eq!(alloc.usage(), 0);
    }

    #[test]
    #[should_panic(expected = "post-overflow")]
    fn writing_past_the_payload_faults_on_free() {
        let alloc = DebugAllocator::new();
        let p = alloc.allocate(16).unwrap();
        unsafe {
            *p.as_ptr().add(16) = 0;
            alloc.free(p);
        }
    }

    #[test]
    #[should_panic(expected = "pre-overflow")]
    fn writing_before_the_payload_faults_on_free() {
        let alloc = DebugAllocator::new();
        let p = alloc.allocate(16).unwrap();
        unsafe {
            *p.as_ptr().sub(PAYLOAD_OFFSET) = 0;
            alloc.free(p);
        }
    }

    #[test]
    #[should_panic(expected = "accounting underflow")]
    fn oversized_size_header_faults_as_underflow() {
        let alloc = DebugAllocator::new();
        let p = alloc.allocate(8).unwrap();
        unsafe {
            // Corrupt the stored size upward; the live counter only has
            // 8 bytes, so free must detect the mismatch.
            p.as_ptr().sub(SIZE_LEN).cast::<u64>().write(1 << 20);
            alloc.free(p);
        }
    }

    #[test]
    #[should_panic(expected = "accounting underflow")]
    fn size_header_past_counter_range_faults_before_any_guard_read() {
        let alloc = DebugAllocator::new();
        let p = alloc.allocate(8).unwrap();
        unsafe {
            // A size this large would wrap negative as i64; free must
            // fault on the header instead of chasing a wild trailing
            // guard address.
            p.as_ptr().sub(SIZE_LEN).cast::<u64>().write(1 << 63);
            alloc.free(p);
        }
    }

    #[test]
    fn concurrent_allocate_free_keeps_accurate_usage() {
        use std::sync::Arc;

        let alloc = Arc::new(DebugAllocator::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let alloc = Arc::clone(&alloc);
            handles.push(std::thread::spawn(move || {
                for _ in 0..200 {
                    let p = alloc.allocate(64).unwrap();
                    unsafe { alloc.free(p) };
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(alloc.usage(), 0);
    }
}
