//! Overflow-checked size arithmetic.
//!
//! A wrapped size would produce an undersized allocation and a
//! subsequent out-of-bounds write, so every size computation in rawrec
//! goes through these helpers and overflow is fatal.

/// `elem_size * count`, or a fatal fault on overflow.
///
/// # Panics
///
/// Panics if the product does not fit in `usize`.
pub fn mul_size(elem_size: usize, count: usize) -> usize {
    match elem_size.checked_mul(count) {
        Some(v) => v,
        None => panic!("size computation overflowed: {elem_size} * {count}"),
    }
}

/// `data_size + header_size`, or a fatal fault on overflow.
///
/// # Panics
///
/// Panics if the sum does not fit in `usize`.
pub fn add_size(data_size: usize, header_size: usize) -> usize {
    match data_size.checked_add(header_size) {
        Some(v) => v,
        None => panic!("size computation overflowed: {data_size} + {header_size}"),
    }
}
