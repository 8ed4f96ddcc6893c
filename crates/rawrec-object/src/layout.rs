//! Byte layouts for records and their fields.
//!
//! A record occupies a single contiguous block: a [`RecordHeader`] followed
//! by one slot per field, in declaration order, each aligned to its natural
//! alignment. Inline nested records embed their full layout (header
//! included), so a nested record pointer is indistinguishable from a
//! standalone one once you have its base address.

use std::mem::{align_of, size_of};

use rawrec_alloc::{add_size, mul_size, AllocStrategy};
use rawrec_core::{Elem, FieldId, RecordId, Schema, Shape, Target};

/// Prefix of every record block.
///
/// `alloc` is the strategy the block (and everything it owns) was carved
/// from. `embedded` marks records that live inside another record's block
/// and therefore must not be released on their own. `freeing` breaks
/// reference cycles while a teardown is in progress.
#[repr(C)]
pub(crate) struct RecordHeader {
    pub alloc: *const dyn AllocStrategy,
    pub embedded: bool,
    pub freeing: bool,
}

/// In-memory form of an owned string or dynamic array slot: a data pointer
/// and an element (or byte) count. A null pointer with length zero is the
/// canonical empty value.
#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct BufRepr {
    pub ptr: *mut u8,
    pub len: usize,
}

impl BufRepr {
    pub(crate) const EMPTY: BufRepr = BufRepr {
        ptr: std::ptr::null_mut(),
        len: 0,
    };
}

/// Resolved byte layout of one record type.
#[derive(Debug, Clone)]
pub struct RecordLayout {
    size: usize,
    align: usize,
    offsets: Vec<usize>,
}

impl RecordLayout {
    /// Total block size in bytes, header included and padded to [`Self::align`].
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Alignment of the record block.
    #[must_use]
    pub fn align(&self) -> usize {
        self.align
    }

    /// Byte offset of a field's slot from the start of the block.
    ///
    /// # Panics
    ///
    /// Panics if `field` is out of range for this record.
    #[must_use]
    pub fn offset(&self, field: FieldId) -> usize {
        self.offsets[field.0 as usize]
    }
}

/// Layouts for every record in a schema, indexed by [`RecordId`].
#[derive(Debug, Clone)]
pub struct LayoutTable {
    records: Vec<RecordLayout>,
}

impl LayoutTable {
    /// Computes the layout of every record in `schema`.
    ///
    /// Inline nesting is resolved recursively; the schema builder has
    /// already rejected inline cycles, so recursion terminates.
    #[must_use]
    pub fn build(schema: &Schema) -> Self {
        let mut memo: Vec<Option<RecordLayout>> = vec![None; schema.len()];
        for id in 0..schema.len() {
            compute_record(schema, RecordId(id as u32), &mut memo);
        }
        let records = memo
            .into_iter()
            .map(|layout| layout.unwrap_or_else(|| unreachable!("layout computed for every record")))
            .collect();
        LayoutTable { records }
    }

    /// Layout of one record type.
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range.
    #[must_use]
    pub fn record(&self, id: RecordId) -> &RecordLayout {
        &self.records[id.0 as usize]
    }

    /// Distance in bytes between consecutive elements of an array field.
    pub(crate) fn elem_stride(&self, elem: &Elem) -> usize {
        elem_geometry(elem, |id| self.record(id)).0
    }
}

fn shape_geometry<'l>(
    shape: &Shape,
    lookup: impl Fn(RecordId) -> &'l RecordLayout + Copy,
) -> (usize, usize) {
    match shape {
        Shape::Scalar(kind) => (kind.size(), kind.align()),
        Shape::Str | Shape::DynamicArray { .. } => (size_of::<BufRepr>(), align_of::<BufRepr>()),
        Shape::Record(id) => {
            let layout = lookup(*id);
            (layout.size(), layout.align())
        }
        Shape::Pointer(_) | Shape::FixedArrayPtr { .. } | Shape::DynamicArrayPtr { .. } => {
            (size_of::<*mut u8>(), align_of::<*mut u8>())
        }
        Shape::FixedArray { len, elem } => {
            let (stride, align) = elem_geometry(elem, lookup);
            (mul_size(stride, *len), align)
        }
    }
}

fn elem_geometry<'l>(
    elem: &Elem,
    lookup: impl Fn(RecordId) -> &'l RecordLayout,
) -> (usize, usize) {
    if elem.by_pointer {
        return (size_of::<*mut u8>(), align_of::<*mut u8>());
    }
    match &elem.target {
        Target::Scalar(kind) => (kind.size(), kind.align()),
        Target::Str => (size_of::<BufRepr>(), align_of::<BufRepr>()),
        Target::Record(id) => {
            let layout = lookup(*id);
            (layout.size(), layout.align())
        }
    }
}

fn compute_record(schema: &Schema, id: RecordId, memo: &mut Vec<Option<RecordLayout>>) {
    if memo[id.0 as usize].is_some() {
        return;
    }
    // Resolve inline dependencies first so geometry lookups succeed. The
    // builder has already rejected inline cycles.
    let def = schema.record(id);
    for slot in def.slots() {
        if let Some(dep) = inline_dependency(&slot.shape) {
            compute_record(schema, dep, memo);
        }
    }

    let mut cursor = size_of::<RecordHeader>();
    let mut align = align_of::<RecordHeader>();
    let mut offsets = Vec::with_capacity(def.slot_count());
    for slot in def.slots() {
        let (size, field_align) = shape_geometry(&slot.shape, |dep: RecordId| {
            memo[dep.0 as usize]
                .as_ref()
                .unwrap_or_else(|| unreachable!("inline dependencies resolved first"))
        });
        cursor = align_up(cursor, field_align);
        offsets.push(cursor);
        cursor = add_size(cursor, size);
        align = align.max(field_align);
    }
    let size = align_up(cursor, align);
    memo[id.0 as usize] = Some(RecordLayout {
        size,
        align,
        offsets,
    });
}

fn inline_dependency(shape: &Shape) -> Option<RecordId> {
    match shape {
        Shape::Record(id) => Some(*id),
        Shape::FixedArray { elem, .. } if !elem.by_pointer => match &elem.target {
            Target::Record(id) => Some(*id),
            _ => None,
        },
        _ => None,
    }
}

fn align_up(n: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    add_size(n, align - 1) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rawrec_core::{FieldDecl, RawType, SchemaBuilder};

    fn schema_of(records: &[(&str, Vec<FieldDecl>)]) -> Schema {
        let mut builder = SchemaBuilder::new();
        let ids: Vec<_> = records
            .iter()
            .map(|(name, _)| builder.declare(*name))
            .collect();
        for ((_, fields), id) in records.iter().zip(ids) {
            for field in fields.clone() {
                builder.push_field(id, field);
            }
        }
        let (schema, errors) = builder.build();
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        schema
    }

    #[test]
    fn header_precedes_first_field() {
        let schema = schema_of(&[(
            "Point",
            vec![
                FieldDecl::new(&["x"], RawType::named("int32")),
                FieldDecl::new(&["y"], RawType::named("int32")),
            ],
        )]);
        let layouts = LayoutTable::build(&schema);
        let layout = layouts.record(RecordId(0));
        assert_eq!(layout.offset(FieldId(0)), size_of::<RecordHeader>());
        assert_eq!(layout.offset(FieldId(1)), size_of::<RecordHeader>() + 4);
    }

    #[test]
    fn fields_align_naturally() {
        let schema = schema_of(&[(
            "Mixed",
            vec![
                FieldDecl::new(&["flag"], RawType::named("bool")),
                FieldDecl::new(&["count"], RawType::named("uint64")),
                FieldDecl::new(&["tail"], RawType::named("uint8")),
            ],
        )]);
        let layouts = LayoutTable::build(&schema);
        let layout = layouts.record(RecordId(0));
        let base = size_of::<RecordHeader>();
        assert_eq!(layout.offset(FieldId(0)), base);
        assert_eq!(layout.offset(FieldId(1)), base + 8);
        assert_eq!(layout.offset(FieldId(2)), base + 16);
        // Padded out to 8-byte alignment for the u64.
        assert_eq!(layout.size(), base + 24);
        assert_eq!(layout.align(), 8);
    }

    #[test]
    fn inline_record_embeds_full_layout() {
        let schema = schema_of(&[
            (
                "Inner",
                vec![FieldDecl::new(&["v"], RawType::named("uint64"))],
            ),
            (
                "Outer",
                vec![
                    FieldDecl::new(&["inner"], RawType::named("Inner")),
                    FieldDecl::new(&["after"], RawType::named("uint32")),
                ],
            ),
        ]);
        let layouts = LayoutTable::build(&schema);
        let inner = layouts.record(schema.id_of("Inner").unwrap());
        let outer = layouts.record(schema.id_of("Outer").unwrap());
        assert_eq!(inner.size(), size_of::<RecordHeader>() + 8);
        assert_eq!(
            outer.offset(FieldId(1)),
            size_of::<RecordHeader>() + inner.size()
        );
    }

    #[test]
    fn string_and_dynamic_array_slots_are_two_words() {
        let schema = schema_of(&[(
            "Buffers",
            vec![
                FieldDecl::new(&["name"], RawType::named("string")),
                FieldDecl::new(&["data"], RawType::slice(RawType::named("uint8"))),
            ],
        )]);
        let layouts = LayoutTable::build(&schema);
        let layout = layouts.record(RecordId(0));
        let base = size_of::<RecordHeader>();
        assert_eq!(layout.offset(FieldId(1)) - base, size_of::<BufRepr>());
    }

    #[test]
    fn fixed_array_stride_is_element_size() {
        let schema = schema_of(&[(
            "Grid",
            vec![FieldDecl::new(
                &["cells"],
                RawType::array(5, RawType::named("int16")),
            )],
        )]);
        let layouts = LayoutTable::build(&schema);
        let layout = layouts.record(RecordId(0));
        assert_eq!(layout.size(), size_of::<RecordHeader>() + 5 * 2 + 6);
    }
}
