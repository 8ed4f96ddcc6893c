//! The executable object model.
//!
//! [`ObjectModel::emit`] turns a classified schema into layouts, free
//! plans, and mutator operations, and then interprets those artifacts
//! against raw allocator-owned blocks: construction, whole-value and
//! indexed setters, capacity changes, and recursive teardown.
//!
//! Faults are deterministic panics: type/kind mismatches, out-of-range
//! indices, operations a field does not support, and allocation failure
//! all panic with a message naming the record and field involved.
//!
//! Mutating operations take their handle exclusively, so borrows handed
//! out by the accessors can never span a mutation of the record they
//! point into. Navigation views ([`ObjectModel::nested`],
//! [`ObjectModel::deref_record`], [`ObjectModel::record_at`]) alias
//! storage the parent owns; the aliasing contract is documented on
//! [`RecordHandle`].

use std::ptr::NonNull;

use rawrec_alloc::AllocStrategy;
use rawrec_core::{Elem, FieldId, RecordId, ScalarKind, Schema, Shape, Target};
use rawrec_plan::{
    direct_scalar, plan_free, plan_mutators, ElemFree, ElemSet, FreeAction, FreePlan, FreeStep,
    MutatorOp, TargetFree,
};

use crate::handle::RecordHandle;
use crate::heap;
use crate::layout::{BufRepr, LayoutTable, RecordHeader, RecordLayout};
use crate::value::{ScalarValue, Value};

/// A schema compiled into executable form.
pub struct ObjectModel {
    schema: Schema,
    layouts: LayoutTable,
    free_plans: Vec<FreePlan>,
    mutators: Vec<Vec<MutatorOp>>,
}

/// Resolved view of an array field's storage.
struct ArrayView {
    data: *mut u8,
    len: usize,
    stride: usize,
}

unsafe fn header(base: NonNull<u8>) -> *mut RecordHeader {
    base.as_ptr().cast()
}

unsafe fn alloc_of<'al>(base: NonNull<u8>) -> &'al dyn AllocStrategy {
    &*(*header(base)).alloc
}

impl ObjectModel {
    /// Compiles `schema` into layouts, free plans, and mutator
    /// operations.
    #[must_use]
    pub fn emit(schema: Schema) -> Self {
        let layouts = LayoutTable::build(&schema);
        let free_plans = (0..schema.len())
            .map(|i| plan_free(&schema, RecordId(i as u32)))
            .collect();
        let mutators = (0..schema.len())
            .map(|i| plan_mutators(&schema, RecordId(i as u32)))
            .collect();
        Self {
            schema,
            layouts,
            free_plans,
            mutators,
        }
    }

    /// The schema this model was compiled from.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The byte layout of one record type.
    ///
    /// # Panics
    ///
    /// Panics if `record` is out of range.
    #[must_use]
    pub fn layout(&self, record: RecordId) -> &RecordLayout {
        self.layouts.record(record)
    }

    /// The free plan of one record type.
    ///
    /// # Panics
    ///
    /// Panics if `record` is out of range.
    #[must_use]
    pub fn free_plan(&self, record: RecordId) -> &FreePlan {
        &self.free_plans[record.0 as usize]
    }

    /// The synthesized mutator operations of one record type.
    ///
    /// # Panics
    ///
    /// Panics if `record` is out of range.
    #[must_use]
    pub fn mutators(&self, record: RecordId) -> &[MutatorOp] {
        &self.mutators[record.0 as usize]
    }

    /// Allocates and initializes a standalone record.
    ///
    /// The whole block is zero-filled, so scalars start at zero, strings
    /// empty, pointers null, and dynamic arrays with no storage. Inline
    /// nested records are initialized recursively against the same
    /// allocator.
    ///
    /// # Panics
    ///
    /// Panics if the allocator reports exhaustion.
    #[must_use]
    pub fn construct<'al>(
        &self,
        record: RecordId,
        alloc: &'al dyn AllocStrategy,
    ) -> RecordHandle<'al> {
        let layout = self.layouts.record(record);
        let block = heap::zero_alloc(alloc, layout.size());
        unsafe {
            write_header(block, alloc, false);
            self.init_children(block, record, alloc);
        }
        RecordHandle::new(block, record)
    }

    /// Initializes a record inside caller-provided storage.
    ///
    /// The record is marked embedded: freeing it releases what it owns
    /// but never the storage itself. Returns a view handle.
    ///
    /// # Safety
    ///
    /// `ptr` must reference at least [`RecordLayout::size`] zero-filled
    /// bytes, aligned to [`RecordLayout::align`], that outlive the
    /// returned handle.
    pub unsafe fn init_embedded<'al>(
        &self,
        ptr: NonNull<u8>,
        record: RecordId,
        alloc: &'al dyn AllocStrategy,
    ) -> RecordHandle<'al> {
        write_header(ptr, alloc, true);
        self.init_children(ptr, record, alloc);
        RecordHandle::new(ptr, record)
    }

    /// The allocator a record was constructed against.
    ///
    /// # Panics
    ///
    /// Panics if the record has already been freed.
    #[must_use]
    pub fn allocator_of<'al>(&self, rec: &RecordHandle<'al>) -> &'al dyn AllocStrategy {
        unsafe { alloc_of(rec.ptr()) }
    }

    /// Recursively releases everything a record owns, then the record's
    /// own block if it is standalone.
    ///
    /// Freeing an already-freed handle is a no-op. Freeing a view of an
    /// embedded record releases its owned children and leaves the
    /// storage to the owner.
    pub fn free(&self, rec: &mut RecordHandle<'_>) {
        let Some(base) = rec.ptr_opt() else {
            return;
        };
        let released = unsafe { self.free_record(base, rec.record()) };
        if released {
            rec.take();
        }
    }

    /// Whole-value setter.
    ///
    /// Scalar fields accept a matching [`Value::Scalar`]. String fields
    /// free the old buffer and deep-copy the new value. Inline record
    /// fields and pointer fields follow the adoption and duplication
    /// rules of their synthesized operation; pointer fields also accept
    /// [`Value::Null`] to clear.
    ///
    /// # Panics
    ///
    /// Panics on a value/field mismatch, when the field has no
    /// whole-value setter (arrays), or when an adopted record is of the
    /// wrong type, already freed, or embedded.
    ///
    /// The handle is borrowed exclusively, so a value borrowed out of
    /// the record cannot survive a mutation of it:
    ///
    /// ```compile_fail,E0502
    /// use rawrec_alloc::DebugAllocator;
    /// use rawrec_core::{RawType, SchemaBuilder};
    /// use rawrec_object::ObjectModel;
    ///
    /// let mut builder = SchemaBuilder::new();
    /// let tag = builder.declare("Tag");
    /// builder.field(tag, &["name"], RawType::named("string"));
    /// let (schema, _) = builder.build();
    /// let model = ObjectModel::emit(schema);
    ///
    /// let alloc = DebugAllocator::new();
    /// let mut rec = model.construct(tag, &alloc);
    /// let name = model.schema().record(tag).field_named("name").unwrap();
    /// model.set(&mut rec, name, "first");
    /// let held = model.str_value(&rec, name);
    /// model.set(&mut rec, name, "second"); // rec is still borrowed by `held`
    /// assert_eq!(held, "first");
    /// ```
    pub fn set<'s, 'al>(
        &self,
        rec: &mut RecordHandle<'al>,
        field: FieldId,
        value: impl Into<Value<'s, 'al>>,
    ) {
        let value = value.into();
        let base = rec.ptr();
        let record = rec.record();
        let op = self.ops(record).iter().find(|op| {
            op.field() == field
                && matches!(
                    op,
                    MutatorOp::SetStr { .. } | MutatorOp::SetRecord { .. } | MutatorOp::SetPointer { .. }
                )
        });
        unsafe {
            let slot = self.field_ptr(base, record, field);
            let alloc = alloc_of(base);
            match op {
                Some(MutatorOp::SetStr { .. }) => {
                    let got = describe(&value);
                    let Value::Str(s) = value else {
                        self.mismatch(record, field, "a string value", got);
                    };
                    heap::release_str_slot(alloc, slot.cast());
                    slot.cast::<BufRepr>().write(heap::dup_str(alloc, s));
                }
                Some(MutatorOp::SetRecord { record: nested, .. }) => {
                    self.adopt_into(slot, *nested, value, record, field);
                }
                Some(MutatorOp::SetPointer { target, .. }) => {
                    self.set_pointer(slot, *target, value, alloc, record, field);
                }
                _ => match direct_scalar(self.slot_shape(record, field)) {
                    Some(kind) => self.write_scalar_checked(slot, kind, value, record, field),
                    None => panic!(
                        "field '{}' of record '{}' has no whole-value setter",
                        self.field_name(record, field),
                        self.schema.record(record).name(),
                    ),
                },
            }
        }
    }

    /// Indexed element setter for array fields.
    ///
    /// Scalar elements are written directly; string, record, and
    /// pointer elements follow the same displacement rules as the
    /// whole-value setters.
    ///
    /// # Panics
    ///
    /// Panics when `idx` is out of range, on a value/element mismatch,
    /// when the field is not an array, or when a pointer-held array has
    /// not been created.
    pub fn set_at<'s, 'al>(
        &self,
        rec: &mut RecordHandle<'al>,
        field: FieldId,
        idx: usize,
        value: impl Into<Value<'s, 'al>>,
    ) {
        let value = value.into();
        let base = rec.ptr();
        let record = rec.record();
        let shape = self.slot_shape(record, field);
        let op = self.ops(record).iter().find_map(|op| match op {
            MutatorOp::SetElem { field: f, elem } if *f == field => Some(*elem),
            _ => None,
        });
        unsafe {
            let slot = self.field_ptr(base, record, field);
            let alloc = alloc_of(base);
            let view = self.array_view(slot, &shape, record, field);
            if idx >= view.len {
                panic!(
                    "index {idx} out of bounds for field '{}' of record '{}' (len {})",
                    self.field_name(record, field),
                    self.schema.record(record).name(),
                    view.len,
                );
            }
            let elem_ptr = view.data.add(idx * view.stride);
            match op {
                Some(ElemSet::Str) => {
                    let got = describe(&value);
                    let Value::Str(s) = value else {
                        self.mismatch(record, field, "a string value", got);
                    };
                    heap::release_str_slot(alloc, elem_ptr.cast());
                    elem_ptr.cast::<BufRepr>().write(heap::dup_str(alloc, s));
                }
                Some(ElemSet::Record(id)) => {
                    self.adopt_into(elem_ptr, id, value, record, field);
                }
                Some(ElemSet::Pointer(target)) => {
                    self.set_pointer(elem_ptr, target, value, alloc, record, field);
                }
                None => match scalar_elem(&shape) {
                    Some(kind) => self.write_scalar_checked(elem_ptr, kind, value, record, field),
                    None => panic!(
                        "field '{}' of record '{}' has no element setter",
                        self.field_name(record, field),
                        self.schema.record(record).name(),
                    ),
                },
            }
        }
    }

    /// Resizes a dynamic array field to `new_len` elements.
    ///
    /// A fresh zero-filled block is allocated (none for a length of
    /// zero). With `preserve`, up to `min(old, new)` elements move to
    /// the new block; everything displaced is freed by the element
    /// rules, and added inline record slots are default-initialized.
    ///
    /// # Panics
    ///
    /// Panics when the field has no capacity operation or the allocator
    /// reports exhaustion.
    pub fn set_capacity(
        &self,
        rec: &mut RecordHandle<'_>,
        field: FieldId,
        new_len: usize,
        preserve: bool,
    ) {
        let base = rec.ptr();
        let record = rec.record();
        let Some((elem, via_pointer)) = self.ops(record).iter().find_map(|op| match op {
            MutatorOp::SetCapacity {
                field: f,
                elem,
                via_pointer,
            } if *f == field => Some((*elem, *via_pointer)),
            _ => None,
        }) else {
            panic!(
                "field '{}' of record '{}' has no capacity operation",
                self.field_name(record, field),
                self.schema.record(record).name(),
            );
        };
        let stride = self.layouts.elem_stride(&elem);
        unsafe {
            let slot = self.field_ptr(base, record, field);
            let alloc = alloc_of(base);
            if via_pointer {
                self.resize_via_pointer(slot, elem, stride, new_len, preserve, alloc);
            } else {
                self.resize_inline(slot, elem, stride, new_len, preserve, alloc);
            }
        }
    }

    /// Allocates the block of a pointer-to-fixed-array field, zeroed,
    /// destroying any existing block first. Inline record elements are
    /// default-initialized.
    ///
    /// # Panics
    ///
    /// Panics when the field has no create operation or the allocator
    /// reports exhaustion.
    pub fn create_array(&self, rec: &mut RecordHandle<'_>, field: FieldId) {
        let base = rec.ptr();
        let record = rec.record();
        let Some((len, elem)) = self.ops(record).iter().find_map(|op| match op {
            MutatorOp::CreateArray {
                field: f,
                len,
                elem,
            } if *f == field => Some((*len, *elem)),
            _ => None,
        }) else {
            panic!(
                "field '{}' of record '{}' has no create operation",
                self.field_name(record, field),
                self.schema.record(record).name(),
            );
        };
        let stride = self.layouts.elem_stride(&elem);
        unsafe {
            let slot = self.field_ptr(base, record, field);
            let alloc = alloc_of(base);
            self.destroy_array_slot(slot, len, elem, stride, alloc);
            let block = heap::alloc_elem_block(alloc, stride, len);
            if let Some(id) = inline_record_elem(&elem) {
                for idx in 0..len {
                    self.init_embedded_at(block.as_ptr().add(idx * stride), id, alloc);
                }
            }
            slot.cast::<*mut u8>().write(block.as_ptr());
        }
    }

    /// Frees the elements and block of a pointer-to-fixed-array field
    /// and clears the pointer. A null field is a no-op.
    ///
    /// # Panics
    ///
    /// Panics when the field has no destroy operation.
    pub fn destroy_array(&self, rec: &mut RecordHandle<'_>, field: FieldId) {
        let base = rec.ptr();
        let record = rec.record();
        let Some((len, elem)) = self.ops(record).iter().find_map(|op| match op {
            MutatorOp::DestroyArray {
                field: f,
                len,
                elem,
            } if *f == field => Some((*len, *elem)),
            _ => None,
        }) else {
            panic!(
                "field '{}' of record '{}' has no destroy operation",
                self.field_name(record, field),
                self.schema.record(record).name(),
            );
        };
        let stride = self.layouts.elem_stride(&elem);
        unsafe {
            let slot = self.field_ptr(base, record, field);
            let alloc = alloc_of(base);
            self.destroy_array_slot(slot, len, elem, stride, alloc);
        }
    }

    /// Reads a scalar field.
    ///
    /// # Panics
    ///
    /// Panics if the field is not a plain scalar.
    #[must_use]
    pub fn scalar(&self, rec: &RecordHandle<'_>, field: FieldId) -> ScalarValue {
        let record = rec.record();
        let Some(kind) = direct_scalar(self.slot_shape(record, field)) else {
            panic!(
                "field '{}' of record '{}' is not a scalar",
                self.field_name(record, field),
                self.schema.record(record).name(),
            );
        };
        unsafe { read_scalar(self.field_ptr(rec.ptr(), record, field), kind) }
    }

    /// Reads a string field. An inline string reads back as what was
    /// set; a null pointer-to-string reads as the empty string.
    ///
    /// # Panics
    ///
    /// Panics if the field holds neither an inline string nor a pointer
    /// to one.
    #[must_use]
    pub fn str_value<'r>(&self, rec: &'r RecordHandle<'_>, field: FieldId) -> &'r str {
        let record = rec.record();
        unsafe {
            let slot = self.field_ptr(rec.ptr(), record, field);
            match self.slot_shape(record, field) {
                Shape::Str => heap::read_str_repr(slot.cast::<BufRepr>().read()),
                Shape::Pointer(Target::Str) => match NonNull::new(slot.cast::<*mut u8>().read()) {
                    Some(block) => heap::read_str_block(block),
                    None => "",
                },
                _ => panic!(
                    "field '{}' of record '{}' is not a string",
                    self.field_name(record, field),
                    self.schema.record(record).name(),
                ),
            }
        }
    }

    /// Reads a pointer-to-scalar field, `None` when null.
    ///
    /// # Panics
    ///
    /// Panics if the field is not a pointer to a scalar.
    #[must_use]
    pub fn deref_scalar(&self, rec: &RecordHandle<'_>, field: FieldId) -> Option<ScalarValue> {
        let record = rec.record();
        let Shape::Pointer(Target::Scalar(kind)) = self.slot_shape(record, field) else {
            panic!(
                "field '{}' of record '{}' is not a pointer to a scalar",
                self.field_name(record, field),
                self.schema.record(record).name(),
            );
        };
        unsafe {
            let slot = self.field_ptr(rec.ptr(), record, field);
            NonNull::new(slot.cast::<*mut u8>().read())
                .map(|block| read_scalar(block.as_ptr(), kind))
        }
    }

    /// Current element count of an array field. Fixed-length arrays
    /// (inline or pointer-held) report their declared length; dynamic
    /// arrays report their allocated length, zero when unallocated.
    ///
    /// # Panics
    ///
    /// Panics if the field is not an array.
    #[must_use]
    pub fn len_of(&self, rec: &RecordHandle<'_>, field: FieldId) -> usize {
        let record = rec.record();
        let shape = self.slot_shape(record, field);
        match shape {
            Shape::FixedArray { len, .. } | Shape::FixedArrayPtr { len, .. } => len,
            Shape::DynamicArray { .. } | Shape::DynamicArrayPtr { .. } => unsafe {
                let slot = self.field_ptr(rec.ptr(), record, field);
                self.array_view(slot, &shape, record, field).len
            },
            _ => panic!(
                "field '{}' of record '{}' is not an array",
                self.field_name(record, field),
                self.schema.record(record).name(),
            ),
        }
    }

    /// True when an owned pointer field (single pointer or pointer-held
    /// array) is null.
    ///
    /// # Panics
    ///
    /// Panics if the field is not pointer-held.
    #[must_use]
    pub fn is_null(&self, rec: &RecordHandle<'_>, field: FieldId) -> bool {
        let record = rec.record();
        match self.slot_shape(record, field) {
            Shape::Pointer(_) | Shape::FixedArrayPtr { .. } | Shape::DynamicArrayPtr { .. } => unsafe {
                self.field_ptr(rec.ptr(), record, field)
                    .cast::<*mut u8>()
                    .read()
                    .is_null()
            },
            _ => panic!(
                "field '{}' of record '{}' is not pointer-held",
                self.field_name(record, field),
                self.schema.record(record).name(),
            ),
        }
    }

    /// Reads a scalar array element.
    ///
    /// # Panics
    ///
    /// Panics if the field is not an array of plain scalars or `idx` is
    /// out of range.
    #[must_use]
    pub fn scalar_at(&self, rec: &RecordHandle<'_>, field: FieldId, idx: usize) -> ScalarValue {
        let record = rec.record();
        let shape = self.slot_shape(record, field);
        let Some(kind) = scalar_elem(&shape) else {
            panic!(
                "field '{}' of record '{}' is not a scalar array",
                self.field_name(record, field),
                self.schema.record(record).name(),
            );
        };
        unsafe { read_scalar(self.elem_ptr(rec, field, &shape, idx), kind) }
    }

    /// Reads an inline string array element.
    ///
    /// # Panics
    ///
    /// Panics if the field's elements are not inline strings or `idx`
    /// is out of range.
    #[must_use]
    pub fn str_at<'r>(&self, rec: &'r RecordHandle<'_>, field: FieldId, idx: usize) -> &'r str {
        let record = rec.record();
        let shape = self.slot_shape(record, field);
        if !matches!(array_elem(&shape), Some(elem) if !elem.by_pointer && elem.target == Target::Str)
        {
            panic!(
                "field '{}' of record '{}' is not a string array",
                self.field_name(record, field),
                self.schema.record(record).name(),
            );
        }
        unsafe {
            heap::read_str_repr(
                self.elem_ptr(rec, field, &shape, idx)
                    .cast::<BufRepr>()
                    .read(),
            )
        }
    }

    /// A view handle on an inline nested record field.
    ///
    /// The view aliases the parent's block; freeing it releases the
    /// nested record's owned children only. Like every navigation
    /// handle, it is valid only while the parent keeps the underlying
    /// storage alive; see [`RecordHandle`] for the contract.
    ///
    /// # Panics
    ///
    /// Panics if the field is not an inline nested record.
    #[must_use]
    pub fn nested<'al>(&self, rec: &RecordHandle<'al>, field: FieldId) -> RecordHandle<'al> {
        let record = rec.record();
        let Shape::Record(id) = self.slot_shape(record, field) else {
            panic!(
                "field '{}' of record '{}' is not an inline record",
                self.field_name(record, field),
                self.schema.record(record).name(),
            );
        };
        unsafe {
            let slot = self.field_ptr(rec.ptr(), record, field);
            RecordHandle::new(NonNull::new_unchecked(slot), id)
        }
    }

    /// A view handle on the target of a pointer-to-record field, `None`
    /// when null.
    ///
    /// The view stays valid only while the slot keeps owning its
    /// target; replacing or clearing the slot through the parent
    /// invalidates it (see [`RecordHandle`]).
    ///
    /// # Panics
    ///
    /// Panics if the field is not a pointer to a record.
    #[must_use]
    pub fn deref_record<'al>(
        &self,
        rec: &RecordHandle<'al>,
        field: FieldId,
    ) -> Option<RecordHandle<'al>> {
        let record = rec.record();
        let Shape::Pointer(Target::Record(id)) = self.slot_shape(record, field) else {
            panic!(
                "field '{}' of record '{}' is not a pointer to a record",
                self.field_name(record, field),
                self.schema.record(record).name(),
            );
        };
        unsafe {
            let slot = self.field_ptr(rec.ptr(), record, field);
            NonNull::new(slot.cast::<*mut u8>().read()).map(|target| RecordHandle::new(target, id))
        }
    }

    /// A view handle on a record array element: inline record elements
    /// directly, pointer-to-record elements through their pointer.
    ///
    /// # Panics
    ///
    /// Panics if the elements are not records, `idx` is out of range,
    /// or a pointer element is null.
    #[must_use]
    pub fn record_at<'al>(
        &self,
        rec: &RecordHandle<'al>,
        field: FieldId,
        idx: usize,
    ) -> RecordHandle<'al> {
        let record = rec.record();
        let shape = self.slot_shape(record, field);
        let Some(elem) = array_elem(&shape) else {
            panic!(
                "field '{}' of record '{}' is not an array",
                self.field_name(record, field),
                self.schema.record(record).name(),
            );
        };
        let Target::Record(id) = elem.target else {
            panic!(
                "field '{}' of record '{}' does not hold record elements",
                self.field_name(record, field),
                self.schema.record(record).name(),
            );
        };
        unsafe {
            let elem_ptr = self.elem_ptr(rec, field, &shape, idx);
            let base = if elem.by_pointer {
                match NonNull::new(elem_ptr.cast::<*mut u8>().read()) {
                    Some(target) => target,
                    None => panic!(
                        "element {idx} of field '{}' of record '{}' is null",
                        self.field_name(record, field),
                        self.schema.record(record).name(),
                    ),
                }
            } else {
                NonNull::new_unchecked(elem_ptr)
            };
            RecordHandle::new(base, id)
        }
    }

    // ---- internals -----------------------------------------------------

    fn ops(&self, record: RecordId) -> &[MutatorOp] {
        &self.mutators[record.0 as usize]
    }

    fn slot_shape(&self, record: RecordId, field: FieldId) -> Shape {
        self.schema.record(record).slot(field).shape
    }

    fn field_name(&self, record: RecordId, field: FieldId) -> &str {
        self.schema.record(record).slot(field).name
    }

    fn mismatch(&self, record: RecordId, field: FieldId, expected: &str, got: &str) -> ! {
        panic!(
            "field '{}' of record '{}' expects {expected}, got {got}",
            self.field_name(record, field),
            self.schema.record(record).name(),
        )
    }

    unsafe fn field_ptr(&self, base: NonNull<u8>, record: RecordId, field: FieldId) -> *mut u8 {
        base.as_ptr().add(self.layouts.record(record).offset(field))
    }

    unsafe fn elem_ptr(
        &self,
        rec: &RecordHandle<'_>,
        field: FieldId,
        shape: &Shape,
        idx: usize,
    ) -> *mut u8 {
        let record = rec.record();
        let slot = self.field_ptr(rec.ptr(), record, field);
        let view = self.array_view(slot, shape, record, field);
        if idx >= view.len {
            panic!(
                "index {idx} out of bounds for field '{}' of record '{}' (len {})",
                self.field_name(record, field),
                self.schema.record(record).name(),
                view.len,
            );
        }
        view.data.add(idx * view.stride)
    }

    unsafe fn array_view(
        &self,
        slot: *mut u8,
        shape: &Shape,
        record: RecordId,
        field: FieldId,
    ) -> ArrayView {
        match shape {
            Shape::FixedArray { len, elem } => ArrayView {
                data: slot,
                len: *len,
                stride: self.layouts.elem_stride(elem),
            },
            Shape::DynamicArray { elem } => {
                let repr = slot.cast::<BufRepr>().read();
                ArrayView {
                    data: repr.ptr,
                    len: repr.len,
                    stride: self.layouts.elem_stride(elem),
                }
            }
            Shape::FixedArrayPtr { len, elem } => {
                let block = slot.cast::<*mut u8>().read();
                if block.is_null() {
                    panic!(
                        "array field '{}' of record '{}' has not been created",
                        self.field_name(record, field),
                        self.schema.record(record).name(),
                    );
                }
                ArrayView {
                    data: block,
                    len: *len,
                    stride: self.layouts.elem_stride(elem),
                }
            }
            Shape::DynamicArrayPtr { elem } => {
                let stride = self.layouts.elem_stride(elem);
                match NonNull::new(slot.cast::<*mut u8>().read()) {
                    Some(block) => {
                        let repr = block.as_ptr().cast::<BufRepr>().read();
                        ArrayView {
                            data: repr.ptr,
                            len: repr.len,
                            stride,
                        }
                    }
                    None => ArrayView {
                        data: std::ptr::null_mut(),
                        len: 0,
                        stride,
                    },
                }
            }
            _ => panic!(
                "field '{}' of record '{}' is not an array",
                self.field_name(record, field),
                self.schema.record(record).name(),
            ),
        }
    }

    unsafe fn init_children(&self, base: NonNull<u8>, record: RecordId, alloc: &dyn AllocStrategy) {
        let layout = self.layouts.record(record);
        for slot in self.schema.record(record).slots() {
            let slot_ptr = base.as_ptr().add(layout.offset(slot.field));
            match &slot.shape {
                Shape::Record(id) => self.init_embedded_at(slot_ptr, *id, alloc),
                Shape::FixedArray { len, elem } => {
                    if let Some(id) = inline_record_elem(elem) {
                        let stride = self.layouts.elem_stride(elem);
                        for idx in 0..*len {
                            self.init_embedded_at(slot_ptr.add(idx * stride), id, alloc);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    unsafe fn init_embedded_at(&self, ptr: *mut u8, record: RecordId, alloc: &dyn AllocStrategy) {
        self.init_embedded(NonNull::new_unchecked(ptr), record, alloc);
    }

    /// Executes the free plan. Returns true when the record's own block
    /// was released.
    unsafe fn free_record(&self, base: NonNull<u8>, record: RecordId) -> bool {
        let hp = header(base);
        if (*hp).freeing {
            return false;
        }
        (*hp).freeing = true;
        let alloc = alloc_of(base);
        let layout = self.layouts.record(record);
        let def = self.schema.record(record);
        for step in self.free_plans[record.0 as usize].steps() {
            match step {
                FreeStep::Field { field, action } => {
                    let slot = base.as_ptr().add(layout.offset(*field));
                    let shape = def.slot(*field).shape;
                    self.free_slot(slot, &shape, action, alloc);
                }
                FreeStep::ReleaseSelf => {
                    if (*hp).embedded {
                        (*hp).freeing = false;
                        return false;
                    }
                    alloc.free(base);
                    return true;
                }
            }
        }
        unreachable!("free plan always ends with a release step")
    }

    unsafe fn free_slot(
        &self,
        slot: *mut u8,
        shape: &Shape,
        action: &FreeAction,
        alloc: &dyn AllocStrategy,
    ) {
        match *action {
            FreeAction::StrBuf => heap::release_str_slot(alloc, slot.cast()),
            FreeAction::Record(id) => {
                self.free_record(NonNull::new_unchecked(slot), id);
            }
            FreeAction::Pointer(target) => {
                let pp = slot.cast::<*mut u8>();
                if let Some(block) = NonNull::new(pp.read()) {
                    match target {
                        TargetFree::RawBlock => alloc.free(block),
                        TargetFree::Record(id) => {
                            self.free_record(block, id);
                        }
                    }
                    pp.write(std::ptr::null_mut());
                }
            }
            FreeAction::FixedArray { len, elem } => {
                let stride = self.stride_of(shape);
                for idx in 0..len {
                    self.free_elem(slot.add(idx * stride), elem, alloc);
                }
            }
            FreeAction::DynamicArray { elem } => {
                let hdr = slot.cast::<BufRepr>();
                let repr = hdr.read();
                if let Some(elem) = elem {
                    let stride = self.stride_of(shape);
                    for idx in 0..repr.len {
                        self.free_elem(repr.ptr.add(idx * stride), elem, alloc);
                    }
                }
                if let Some(buf) = NonNull::new(repr.ptr) {
                    alloc.free(buf);
                }
                hdr.write(BufRepr::EMPTY);
            }
            FreeAction::FixedArrayPtr { len, elem } => {
                let pp = slot.cast::<*mut u8>();
                if let Some(block) = NonNull::new(pp.read()) {
                    if let Some(elem) = elem {
                        let stride = self.stride_of(shape);
                        for idx in 0..len {
                            self.free_elem(block.as_ptr().add(idx * stride), elem, alloc);
                        }
                    }
                    alloc.free(block);
                    pp.write(std::ptr::null_mut());
                }
            }
            FreeAction::DynamicArrayPtr { elem } => {
                let pp = slot.cast::<*mut u8>();
                if let Some(block) = NonNull::new(pp.read()) {
                    if let Some(elem) = elem {
                        let repr = block.as_ptr().cast::<BufRepr>().read();
                        let stride = self.stride_of(shape);
                        for idx in 0..repr.len {
                            self.free_elem(repr.ptr.add(idx * stride), elem, alloc);
                        }
                    }
                    alloc.free(block);
                    pp.write(std::ptr::null_mut());
                }
            }
        }
    }

    unsafe fn free_elem(&self, elem_ptr: *mut u8, elem: ElemFree, alloc: &dyn AllocStrategy) {
        match elem {
            ElemFree::StrBuf => heap::release_str_slot(alloc, elem_ptr.cast()),
            ElemFree::Record(id) => {
                self.free_record(NonNull::new_unchecked(elem_ptr), id);
            }
            ElemFree::PointerRaw => {
                let pp = elem_ptr.cast::<*mut u8>();
                if let Some(block) = NonNull::new(pp.read()) {
                    alloc.free(block);
                    pp.write(std::ptr::null_mut());
                }
            }
            ElemFree::PointerRecord(id) => {
                let pp = elem_ptr.cast::<*mut u8>();
                if let Some(block) = NonNull::new(pp.read()) {
                    self.free_record(block, id);
                    pp.write(std::ptr::null_mut());
                }
            }
        }
    }

    fn stride_of(&self, shape: &Shape) -> usize {
        match array_elem(shape) {
            Some(elem) => self.layouts.elem_stride(&elem),
            None => unreachable!("array actions only apply to array shapes"),
        }
    }

    /// Validates an adopted record and detaches its block from the
    /// donor handle.
    fn take_standalone(
        &self,
        donor: RecordHandle<'_>,
        expected: RecordId,
        record: RecordId,
        field: FieldId,
    ) -> NonNull<u8> {
        assert_eq!(
            donor.record(),
            expected,
            "field '{}' of record '{}' adopts '{}' records, got '{}'",
            self.field_name(record, field),
            self.schema.record(record).name(),
            self.schema.record(expected).name(),
            self.schema.record(donor.record()).name(),
        );
        let ptr = donor.ptr();
        unsafe {
            assert!(
                !(*header(ptr)).embedded,
                "field '{}' of record '{}' cannot adopt an embedded record",
                self.field_name(record, field),
                self.schema.record(record).name(),
            );
        }
        ptr
    }

    /// Adopts a standalone record into inline storage: frees the slot's
    /// current children, copies the donor's payload over the slot, and
    /// releases the donor's shell without recursing into the children it
    /// no longer owns.
    unsafe fn adopt_into(
        &self,
        slot: *mut u8,
        id: RecordId,
        value: Value<'_, '_>,
        record: RecordId,
        field: FieldId,
    ) {
        let got = describe(&value);
        let Value::Record(donor) = value else {
            self.mismatch(record, field, "a record value", got);
        };
        let donor_ptr = self.take_standalone(donor, id, record, field);
        let donor_alloc = alloc_of(donor_ptr);
        self.free_record(NonNull::new_unchecked(slot), id);
        let size = self.layouts.record(id).size();
        donor_alloc.copy(NonNull::new_unchecked(slot), donor_ptr, size);
        (*header(NonNull::new_unchecked(slot))).embedded = true;
        donor_alloc.free(donor_ptr);
    }

    unsafe fn set_pointer(
        &self,
        slot: *mut u8,
        target: Target,
        value: Value<'_, '_>,
        alloc: &dyn AllocStrategy,
        record: RecordId,
        field: FieldId,
    ) {
        let pp = slot.cast::<*mut u8>();
        match (target, value) {
            (Target::Scalar(kind), Value::Scalar(v)) => {
                if v.kind() != kind {
                    panic!(
                        "field '{}' of record '{}' holds {kind}, got {}",
                        self.field_name(record, field),
                        self.schema.record(record).name(),
                        v.kind(),
                    );
                }
                // Reuse an existing target block in place.
                let block = match NonNull::new(pp.read()) {
                    Some(block) => block,
                    None => {
                        let block = heap::zero_alloc(alloc, kind.size());
                        pp.write(block.as_ptr());
                        block
                    }
                };
                write_scalar(block.as_ptr(), v);
            }
            (Target::Str, Value::Str(s)) => {
                if let Some(old) = NonNull::new(pp.read()) {
                    alloc.free(old);
                }
                pp.write(heap::dup_str_block(alloc, s).as_ptr());
            }
            (Target::Record(id), Value::Record(donor)) => {
                // Validate the donor before disturbing the slot.
                let donor_ptr = self.take_standalone(donor, id, record, field);
                if let Some(old) = NonNull::new(pp.read()) {
                    self.free_record(old, id);
                }
                pp.write(donor_ptr.as_ptr());
            }
            (target, Value::Null) => {
                if let Some(old) = NonNull::new(pp.read()) {
                    match target {
                        Target::Record(id) => {
                            self.free_record(old, id);
                        }
                        Target::Scalar(_) | Target::Str => alloc.free(old),
                    }
                    pp.write(std::ptr::null_mut());
                }
            }
            (_, value) => {
                self.mismatch(record, field, "a value matching the pointer target", describe(&value))
            }
        }
    }

    unsafe fn write_scalar_checked(
        &self,
        slot: *mut u8,
        kind: ScalarKind,
        value: Value<'_, '_>,
        record: RecordId,
        field: FieldId,
    ) {
        let got = describe(&value);
        let Value::Scalar(v) = value else {
            self.mismatch(record, field, "a scalar value", got);
        };
        if v.kind() != kind {
            panic!(
                "field '{}' of record '{}' holds {kind}, got {}",
                self.field_name(record, field),
                self.schema.record(record).name(),
                v.kind(),
            );
        }
        write_scalar(slot, v);
    }

    unsafe fn resize_inline(
        &self,
        slot: *mut u8,
        elem: Elem,
        stride: usize,
        new_len: usize,
        preserve: bool,
        alloc: &dyn AllocStrategy,
    ) {
        let hdr = slot.cast::<BufRepr>();
        let old = hdr.read();
        let new_data = if new_len > 0 {
            heap::alloc_elem_block(alloc, stride, new_len).as_ptr()
        } else {
            std::ptr::null_mut()
        };
        let kept = self.migrate_elems(old.ptr, old.len, new_data, new_len, elem, stride, preserve, alloc);
        if let Some(buf) = NonNull::new(old.ptr) {
            alloc.free(buf);
        }
        self.init_added(new_data, kept, new_len, elem, stride, alloc);
        hdr.write(if new_len > 0 {
            BufRepr {
                ptr: new_data,
                len: new_len,
            }
        } else {
            BufRepr::EMPTY
        });
    }

    unsafe fn resize_via_pointer(
        &self,
        slot: *mut u8,
        elem: Elem,
        stride: usize,
        new_len: usize,
        preserve: bool,
        alloc: &dyn AllocStrategy,
    ) {
        let pp = slot.cast::<*mut u8>();
        let old_block = pp.read();
        let (old_data, old_len) = match NonNull::new(old_block) {
            Some(block) => {
                let repr = block.as_ptr().cast::<BufRepr>().read();
                (repr.ptr, repr.len)
            }
            None => (std::ptr::null_mut(), 0),
        };
        let (new_block, new_data) = if new_len > 0 {
            let block = heap::alloc_slice_block(alloc, stride, new_len);
            let data = block.as_ptr().cast::<BufRepr>().read().ptr;
            (block.as_ptr(), data)
        } else {
            (std::ptr::null_mut(), std::ptr::null_mut())
        };
        let kept = self.migrate_elems(old_data, old_len, new_data, new_len, elem, stride, preserve, alloc);
        if let Some(block) = NonNull::new(old_block) {
            alloc.free(block);
        }
        self.init_added(new_data, kept, new_len, elem, stride, alloc);
        pp.write(new_block);
    }

    /// Moves up to `min(old_len, new_len)` elements when preserving,
    /// frees the displaced remainder of the old storage, and returns the
    /// kept count.
    #[allow(clippy::too_many_arguments)]
    unsafe fn migrate_elems(
        &self,
        old_data: *mut u8,
        old_len: usize,
        new_data: *mut u8,
        new_len: usize,
        elem: Elem,
        stride: usize,
        preserve: bool,
        alloc: &dyn AllocStrategy,
    ) -> usize {
        if old_data.is_null() {
            return 0;
        }
        let mut kept = 0;
        if preserve {
            kept = old_len.min(new_len);
            if kept > 0 {
                std::ptr::copy_nonoverlapping(old_data, new_data, kept * stride);
            }
        }
        if let Some(ef) = ElemFree::of(elem) {
            for idx in kept..old_len {
                self.free_elem(old_data.add(idx * stride), ef, alloc);
            }
        }
        kept
    }

    unsafe fn init_added(
        &self,
        new_data: *mut u8,
        from: usize,
        new_len: usize,
        elem: Elem,
        stride: usize,
        alloc: &dyn AllocStrategy,
    ) {
        if let Some(id) = inline_record_elem(&elem) {
            for idx in from..new_len {
                self.init_embedded_at(new_data.add(idx * stride), id, alloc);
            }
        }
    }

    unsafe fn destroy_array_slot(
        &self,
        slot: *mut u8,
        len: usize,
        elem: Elem,
        stride: usize,
        alloc: &dyn AllocStrategy,
    ) {
        let pp = slot.cast::<*mut u8>();
        if let Some(block) = NonNull::new(pp.read()) {
            if let Some(ef) = ElemFree::of(elem) {
                for idx in 0..len {
                    self.free_elem(block.as_ptr().add(idx * stride), ef, alloc);
                }
            }
            alloc.free(block);
            pp.write(std::ptr::null_mut());
        }
    }
}

unsafe fn write_header(base: NonNull<u8>, alloc: &dyn AllocStrategy, embedded: bool) {
    // The raw pointer erases the allocator borrow; the handle's phantom
    // lifetime keeps the borrow alive for as long as the record can be
    // reached.
    let raw: *const (dyn AllocStrategy + '_) = alloc;
    let raw: *const dyn AllocStrategy = std::mem::transmute(raw);
    header(base).write(RecordHeader {
        alloc: raw,
        embedded,
        freeing: false,
    });
}

unsafe fn read_scalar(p: *const u8, kind: ScalarKind) -> ScalarValue {
    match kind {
        ScalarKind::Bool => ScalarValue::Bool(p.read() != 0),
        ScalarKind::I8 => ScalarValue::I8(p.cast::<i8>().read()),
        ScalarKind::I16 => ScalarValue::I16(p.cast::<i16>().read()),
        ScalarKind::I32 => ScalarValue::I32(p.cast::<i32>().read()),
        ScalarKind::I64 => ScalarValue::I64(p.cast::<i64>().read()),
        ScalarKind::U8 => ScalarValue::U8(p.read()),
        ScalarKind::U16 => ScalarValue::U16(p.cast::<u16>().read()),
        ScalarKind::U32 => ScalarValue::U32(p.cast::<u32>().read()),
        ScalarKind::U64 => ScalarValue::U64(p.cast::<u64>().read()),
        ScalarKind::F32 => ScalarValue::F32(p.cast::<f32>().read()),
        ScalarKind::F64 => ScalarValue::F64(p.cast::<f64>().read()),
    }
}

unsafe fn write_scalar(p: *mut u8, v: ScalarValue) {
    match v {
        ScalarValue::Bool(b) => p.write(u8::from(b)),
        ScalarValue::I8(x) => p.cast::<i8>().write(x),
        ScalarValue::I16(x) => p.cast::<i16>().write(x),
        ScalarValue::I32(x) => p.cast::<i32>().write(x),
        ScalarValue::I64(x) => p.cast::<i64>().write(x),
        ScalarValue::U8(x) => p.write(x),
        ScalarValue::U16(x) => p.cast::<u16>().write(x),
        ScalarValue::U32(x) => p.cast::<u32>().write(x),
        ScalarValue::U64(x) => p.cast::<u64>().write(x),
        ScalarValue::F32(x) => p.cast::<f32>().write(x),
        ScalarValue::F64(x) => p.cast::<f64>().write(x),
    }
}

fn describe(value: &Value<'_, '_>) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Scalar(_) => "a scalar",
        Value::Str(_) => "a string",
        Value::Record(_) => "a record",
    }
}

fn array_elem(shape: &Shape) -> Option<Elem> {
    match shape {
        Shape::FixedArray { elem, .. }
        | Shape::DynamicArray { elem }
        | Shape::FixedArrayPtr { elem, .. }
        | Shape::DynamicArrayPtr { elem } => Some(*elem),
        _ => None,
    }
}

fn scalar_elem(shape: &Shape) -> Option<ScalarKind> {
    match array_elem(shape)? {
        Elem {
            by_pointer: false,
            target: Target::Scalar(kind),
        } => Some(kind),
        _ => None,
    }
}

fn inline_record_elem(elem: &Elem) -> Option<RecordId> {
    if elem.by_pointer {
        return None;
    }
    match elem.target {
        Target::Record(id) => Some(id),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rawrec_alloc::DebugAllocator;
    use rawrec_core::{FieldDecl, RawType, SchemaBuilder};

    fn build(records: &[(&str, Vec<FieldDecl>)]) -> ObjectModel {
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
        ObjectModel::emit(schema)
    }

    fn field(model: &ObjectModel, record: RecordId, name: &str) -> FieldId {
        model
            .schema()
            .record(record)
            .field_named(name)
            .unwrap_or_else(|| panic!("no field named {name}"))
    }

    #[test]
    fn scalars_default_to_zero_and_round_trip() {
        let model = build(&[(
            "Sensor",
            vec![
                FieldDecl::new(&["id"], RawType::named("uint32")),
                FieldDecl::new(&["reading"], RawType::named("float64")),
            ],
        )]);
        let alloc = DebugAllocator::new();
        let id = model.schema().id_of("Sensor").unwrap();
        let mut rec = model.construct(id, &alloc);
        let f_id = field(&model, id, "id");
        let f_reading = field(&model, id, "reading");
        assert_eq!(model.scalar(&rec, f_id), ScalarValue::U32(0));
        model.set(&mut rec, f_id, 42u32);
        model.set(&mut rec, f_reading, 2.5f64);
        assert_eq!(model.scalar(&rec, f_id), ScalarValue::U32(42));
        assert_eq!(model.scalar(&rec, f_reading), ScalarValue::F64(2.5));
        model.free(&mut rec);
        assert!(rec.is_freed());
        assert_eq!(alloc.usage(), 0);
    }

    #[test]
    fn string_replacement_frees_the_old_buffer() {
        let model = build(&[(
            "Named",
            vec![FieldDecl::new(&["name"], RawType::named("string"))],
        )]);
        let alloc = DebugAllocator::new();
        let id = model.schema().id_of("Named").unwrap();
        let mut rec = model.construct(id, &alloc);
        let f = field(&model, id, "name");
        assert_eq!(model.str_value(&rec, f), "");
        model.set(&mut rec, f, "first");
        assert_eq!(model.str_value(&rec, f), "first");
        let with_one = alloc.usage();
        model.set(&mut rec, f, "second!");
        assert_eq!(model.str_value(&rec, f), "second!");
        assert_eq!(alloc.usage(), with_one + 2);
        model.set(&mut rec, f, "");
        assert_eq!(model.str_value(&rec, f), "");
        model.free(&mut rec);
        assert_eq!(alloc.usage(), 0);
    }

    #[test]
    fn freeing_twice_is_a_no_op() {
        let model = build(&[(
            "Tiny",
            vec![FieldDecl::new(&["v"], RawType::named("int8"))],
        )]);
        let alloc = DebugAllocator::new();
        let id = model.schema().id_of("Tiny").unwrap();
        let mut rec = model.construct(id, &alloc);
        model.free(&mut rec);
        model.free(&mut rec);
        assert_eq!(alloc.usage(), 0);
    }

    #[test]
    #[should_panic(expected = "holds u32")]
    fn scalar_kind_mismatch_panics() {
        let model = build(&[(
            "Strict",
            vec![FieldDecl::new(&["v"], RawType::named("uint32"))],
        )]);
        let alloc = DebugAllocator::new();
        let id = model.schema().id_of("Strict").unwrap();
        let mut rec = model.construct(id, &alloc);
        model.set(&mut rec, field(&model, id, "v"), 1i32);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn indexing_an_unallocated_dynamic_array_panics() {
        let model = build(&[(
            "Buf",
            vec![FieldDecl::new(
                &["data"],
                RawType::slice(RawType::named("uint8")),
            )],
        )]);
        let alloc = DebugAllocator::new();
        let id = model.schema().id_of("Buf").unwrap();
        let mut rec = model.construct(id, &alloc);
        model.set_at(&mut rec, field(&model, id, "data"), 0, 1u8);
    }

    #[test]
    fn pointer_to_scalar_reuses_its_block() {
        let model = build(&[(
            "Opt",
            vec![FieldDecl::new(
                &["count"],
                RawType::pointer(RawType::named("int64")),
            )],
        )]);
        let alloc = DebugAllocator::new();
        let id = model.schema().id_of("Opt").unwrap();
        let mut rec = model.construct(id, &alloc);
        let f = field(&model, id, "count");
        assert!(model.is_null(&rec, f));
        assert_eq!(model.deref_scalar(&rec, f), None);
        model.set(&mut rec, f, 7i64);
        let after_first = alloc.usage();
        model.set(&mut rec, f, 8i64);
        // Same block rewritten in place.
        assert_eq!(alloc.usage(), after_first);
        assert_eq!(model.deref_scalar(&rec, f), Some(ScalarValue::I64(8)));
        model.set(&mut rec, f, Value::Null);
        assert!(model.is_null(&rec, f));
        model.free(&mut rec);
        assert_eq!(alloc.usage(), 0);
    }

    #[test]
    fn nested_record_views_share_the_parent_block() {
        let model = build(&[
            (
                "Point",
                vec![
                    FieldDecl::new(&["x"], RawType::named("int32")),
                    FieldDecl::new(&["y"], RawType::named("int32")),
                ],
            ),
            (
                "Path",
                vec![FieldDecl::new(&["origin"], RawType::named("Point"))],
            ),
        ]);
        let alloc = DebugAllocator::new();
        let path = model.schema().id_of("Path").unwrap();
        let point = model.schema().id_of("Point").unwrap();
        let mut rec = model.construct(path, &alloc);
        let mut origin = model.nested(&rec, field(&model, path, "origin"));
        model.set(&mut origin, field(&model, point, "x"), -3i32);
        assert_eq!(
            model.scalar(&origin, field(&model, point, "x")),
            ScalarValue::I32(-3)
        );
        model.free(&mut rec);
        assert_eq!(alloc.usage(), 0);
    }
}
