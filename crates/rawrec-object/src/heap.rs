//! Small allocation helpers shared by construction and mutation.
//!
//! Everything here goes through a borrowed [`AllocStrategy`]; allocation
//! failure is fatal and reported with a deterministic panic rather than
//! an error value, matching the contract of the synthesized operations.

use std::mem::size_of;
use std::ptr::NonNull;

use rawrec_alloc::{add_size, mul_size, AllocStrategy};

use crate::layout::BufRepr;

/// Allocate `size` zero-filled bytes or panic.
pub(crate) fn zero_alloc(alloc: &dyn AllocStrategy, size: usize) -> NonNull<u8> {
    match alloc.allocate(size) {
        Some(ptr) => ptr,
        None => panic!("cannot allocate {size} bytes"),
    }
}

/// Duplicate a string into allocator-owned storage.
///
/// The empty string costs nothing: it is represented as a null buffer
/// of length zero and no allocation takes place.
pub(crate) fn dup_str(alloc: &dyn AllocStrategy, s: &str) -> BufRepr {
    if s.is_empty() {
        return BufRepr::EMPTY;
    }
    let buf = zero_alloc(alloc, s.len());
    unsafe {
        std::ptr::copy_nonoverlapping(s.as_ptr(), buf.as_ptr(), s.len());
    }
    BufRepr {
        ptr: buf.as_ptr(),
        len: s.len(),
    }
}

/// Free the backing buffer of a string slot and reset it to empty.
///
/// # Safety
///
/// `slot` must point at a valid [`BufRepr`] whose buffer, if non-null,
/// was allocated from `alloc`.
pub(crate) unsafe fn release_str_slot(alloc: &dyn AllocStrategy, slot: *mut BufRepr) {
    let repr = slot.read();
    if let Some(buf) = NonNull::new(repr.ptr) {
        alloc.free(buf);
    }
    slot.write(BufRepr::EMPTY);
}

/// Duplicate a string into a single out-of-line block: a [`BufRepr`]
/// header followed by the bytes. Returns the block's base address.
///
/// The empty string still gets a block (header only, null data) so the
/// owning pointer slot reads as non-null, distinguishing "set to empty"
/// from "never set".
pub(crate) fn dup_str_block(alloc: &dyn AllocStrategy, s: &str) -> NonNull<u8> {
    let size = add_size(size_of::<BufRepr>(), s.len());
    let block = zero_alloc(alloc, size);
    let repr = if s.is_empty() {
        BufRepr::EMPTY
    } else {
        let data = unsafe { block.as_ptr().add(size_of::<BufRepr>()) };
        unsafe {
            std::ptr::copy_nonoverlapping(s.as_ptr(), data, s.len());
        }
        BufRepr {
            ptr: data,
            len: s.len(),
        }
    };
    unsafe {
        block.as_ptr().cast::<BufRepr>().write(repr);
    }
    block
}

/// Read the string stored in an out-of-line string block.
///
/// # Safety
///
/// `block` must have come from [`dup_str_block`] and still be live;
/// the returned borrow must not outlive the block.
pub(crate) unsafe fn read_str_block<'b>(block: NonNull<u8>) -> &'b str {
    let repr = block.as_ptr().cast::<BufRepr>().read();
    read_str_repr(repr)
}

/// Turn a [`BufRepr`] back into a `&str`.
///
/// # Safety
///
/// The buffer must hold `repr.len` bytes of valid UTF-8 (writes only
/// ever copy from `&str`) and must outlive the returned borrow.
pub(crate) unsafe fn read_str_repr<'b>(repr: BufRepr) -> &'b str {
    if repr.len == 0 {
        return "";
    }
    let bytes = std::slice::from_raw_parts(repr.ptr, repr.len);
    std::str::from_utf8_unchecked(bytes)
}

/// Allocate a zero-filled array payload of `len` elements of `stride`
/// bytes each.
pub(crate) fn alloc_elem_block(
    alloc: &dyn AllocStrategy,
    stride: usize,
    len: usize,
) -> NonNull<u8> {
    zero_alloc(alloc, mul_size(stride, len))
}

/// Allocate a dynamic array block for a pointer-held array: one
/// allocation carrying a [`BufRepr`] header followed by the payload.
/// The header is filled in to point at the payload.
pub(crate) fn alloc_slice_block(
    alloc: &dyn AllocStrategy,
    stride: usize,
    len: usize,
) -> NonNull<u8> {
    let size = add_size(size_of::<BufRepr>(), mul_size(stride, len));
    let block = zero_alloc(alloc, size);
    let data = unsafe { block.as_ptr().add(size_of::<BufRepr>()) };
    unsafe {
        block.as_ptr().cast::<BufRepr>().write(BufRepr { ptr: data, len });
    }
    block
}
