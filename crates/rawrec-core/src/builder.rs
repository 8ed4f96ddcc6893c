//! Two-phase schema construction.
//!
//! Phase one declares record names (so mutually recursive declarations
//! can resolve each other); phase two attaches field declarations.
//! [`SchemaBuilder::build`] then classifies everything, collecting one
//! error per failure and keeping the records that classified cleanly:
//! a bad record never poisons the rest of the schema, it is dropped and
//! reported, together with any record that (transitively) depends on it.

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::classify::{classify, ResolveRecord};
use crate::error::SchemaError;
use crate::id::RecordId;
use crate::raw::RawType;
use crate::schema::{FieldSpec, RecordDef, Schema};
use crate::shape::{Shape, Target};

/// An unclassified field declaration.
#[derive(Clone, Debug)]
pub struct FieldDecl {
    /// Declared name(s). A declaration with several names produces one
    /// spec with several slots.
    pub names: SmallVec<[String; 2]>,
    /// The declared type.
    pub ty: RawType,
    /// Excluded from the record entirely: omitted fields are dropped
    /// before classification and appear in no generated operation.
    pub omit: bool,
    /// Opaque tag metadata passed through to the spec.
    pub metadata: Option<String>,
}

impl FieldDecl {
    /// A plain declaration with no tags.
    pub fn new(names: &[&str], ty: RawType) -> Self {
        Self {
            names: names.iter().map(|s| s.to_string()).collect(),
            ty,
            omit: false,
            metadata: None,
        }
    }
}

struct PendingRecord {
    name: String,
    omit: bool,
    fields: Vec<FieldDecl>,
}

/// Builds a [`Schema`] from raw declarations.
pub struct SchemaBuilder {
    pending: Vec<PendingRecord>,
}

impl SchemaBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Declare a record name, reserving its provisional id.
    ///
    /// Fields referencing the name resolve even when the referenced
    /// record's own fields have not been attached yet.
    pub fn declare(&mut self, name: impl Into<String>) -> RecordId {
        let id = RecordId(self.pending.len() as u32);
        self.pending.push(PendingRecord {
            name: name.into(),
            omit: false,
            fields: Vec::new(),
        });
        id
    }

    /// Exclude a declared record from the schema entirely.
    ///
    /// The record produces no definition and its name does not resolve;
    /// other records referencing it fail with an unknown-type error.
    pub fn omit_record(&mut self, record: RecordId) {
        self.pending[record.0 as usize].omit = true;
    }

    /// Attach a plain field declaration.
    pub fn field(&mut self, record: RecordId, names: &[&str], ty: RawType) {
        self.push_field(record, FieldDecl::new(names, ty));
    }

    /// Attach a full field declaration (omit flag, tag metadata).
    pub fn push_field(&mut self, record: RecordId, decl: FieldDecl) {
        self.pending[record.0 as usize].fields.push(decl);
    }

    /// Classify all declared records.
    ///
    /// Returns the schema of surviving records plus one error for every
    /// record that failed: unsupported or unknown field types, duplicate
    /// names, inline-embedding cycles, and cascaded drops of records
    /// depending on a failed one. Surviving ids are compacted, so the
    /// returned schema is total — every id in it resolves.
    pub fn build(self) -> (Schema, Vec<SchemaError>) {
        let mut errors = Vec::new();
        let n = self.pending.len();
        let mut failed = vec![false; n];

        // Name table over provisional ids. First declaration of a name
        // wins; later duplicates fail.
        let mut names: IndexMap<&str, RecordId> = IndexMap::new();
        for (idx, rec) in self.pending.iter().enumerate() {
            if rec.omit {
                failed[idx] = true;
                continue;
            }
            if names
                .insert(rec.name.as_str(), RecordId(idx as u32))
                .is_some()
            {
                errors.push(SchemaError::DuplicateRecord {
                    name: rec.name.clone(),
                });
                failed[idx] = true;
                // Restore the first declaration's id.
                let first = self
                    .pending
                    .iter()
                    .position(|r| r.name == rec.name)
                    .unwrap_or(idx);
                names.insert(rec.name.as_str(), RecordId(first as u32));
            }
        }
        // Omitted records must not resolve.
        let resolver = NameTable {
            names: &names,
            pending: &self.pending,
        };

        // Classify each record; the first bad field aborts that record.
        let mut classified: Vec<Vec<FieldSpec>> = Vec::with_capacity(n);
        for (idx, rec) in self.pending.iter().enumerate() {
            let mut specs = Vec::new();
            if !failed[idx] {
                for decl in &rec.fields {
                    if decl.omit {
                        continue;
                    }
                    let field_label = decl.names.join(", ");
                    match classify(&rec.name, &field_label, &decl.ty, &resolver) {
                        Ok(shape) => specs.push(FieldSpec {
                            names: decl.names.clone(),
                            shape,
                            type_name: decl.ty.display_name(),
                            metadata: decl.metadata.clone(),
                        }),
                        Err(err) => {
                            errors.push(err);
                            failed[idx] = true;
                            specs.clear();
                            break;
                        }
                    }
                }
            }
            classified.push(specs);
        }

        // Inline-embedding cycles imply infinitely sized records. Detect
        // against a snapshot so every member of a cycle is reported, not
        // just the first.
        let classified_ok = failed.clone();
        for idx in 0..n {
            if !failed[idx] && inline_cycle(RecordId(idx as u32), &classified, &classified_ok) {
                errors.push(SchemaError::InlineCycle {
                    record: self.pending[idx].name.clone(),
                });
                failed[idx] = true;
            }
        }

        // Cascade: a record referencing a failed record is dropped too.
        loop {
            let mut changed = false;
            for idx in 0..n {
                if failed[idx] {
                    continue;
                }
                let dep = classified[idx]
                    .iter()
                    .filter_map(|spec| spec.shape.referenced_record())
                    .find(|id| failed[id.0 as usize]);
                if let Some(dep) = dep {
                    errors.push(SchemaError::DroppedDependency {
                        record: self.pending[idx].name.clone(),
                        depends_on: self.pending[dep.0 as usize].name.clone(),
                    });
                    failed[idx] = true;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        // Compact surviving ids and rewrite record references.
        let mut remap = vec![None; n];
        let mut next = 0u32;
        for (idx, f) in failed.iter().enumerate() {
            if !f {
                remap[idx] = Some(RecordId(next));
                next += 1;
            }
        }
        let mut records = Vec::with_capacity(next as usize);
        for (idx, rec) in self.pending.iter().enumerate() {
            if failed[idx] {
                continue;
            }
            let specs = classified[idx]
                .iter()
                .map(|spec| FieldSpec {
                    shape: remap_shape(spec.shape, &remap),
                    ..spec.clone()
                })
                .collect();
            records.push(RecordDef::new(rec.name.clone(), specs));
        }

        (Schema::from_records(records), errors)
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct NameTable<'a> {
    names: &'a IndexMap<&'a str, RecordId>,
    pending: &'a [PendingRecord],
}

impl ResolveRecord for NameTable<'_> {
    fn record(&self, name: &str) -> Option<RecordId> {
        let id = *self.names.get(name)?;
        if self.pending[id.0 as usize].omit {
            return None;
        }
        Some(id)
    }
}

/// Whether `start` can reach itself through inline embedding.
fn inline_cycle(start: RecordId, classified: &[Vec<FieldSpec>], failed: &[bool]) -> bool {
    let mut stack: Vec<RecordId> = inline_children(start, classified, failed);
    let mut seen = vec![false; classified.len()];
    while let Some(id) = stack.pop() {
        if id == start {
            return true;
        }
        if seen[id.0 as usize] {
            continue;
        }
        seen[id.0 as usize] = true;
        stack.extend(inline_children(id, classified, failed));
    }
    false
}

fn inline_children(id: RecordId, classified: &[Vec<FieldSpec>], failed: &[bool]) -> Vec<RecordId> {
    classified[id.0 as usize]
        .iter()
        .filter_map(|spec| spec.shape.inline_record())
        .filter(|child| !failed[child.0 as usize])
        .collect()
}

fn remap_shape(shape: Shape, remap: &[Option<RecordId>]) -> Shape {
    let m = |id: RecordId| -> RecordId {
        // Cascade dropping guarantees survivors only reference survivors.
        remap[id.0 as usize]
            .unwrap_or_else(|| unreachable!("dangling record reference after cascade"))
    };
    let mt = |t: Target| match t {
        Target::Record(id) => Target::Record(m(id)),
        other => other,
    };
    match shape {
        Shape::Scalar(_) | Shape::Str => shape,
        Shape::Record(id) => Shape::Record(m(id)),
        Shape::Pointer(t) => Shape::Pointer(mt(t)),
        Shape::FixedArray { len, mut elem } => {
            elem.target = mt(elem.target);
            Shape::FixedArray { len, elem }
        }
        Shape::DynamicArray { mut elem } => {
            elem.target = mt(elem.target);
            Shape::DynamicArray { elem }
        }
        Shape::FixedArrayPtr { len, mut elem } => {
            elem.target = mt(elem.target);
            Shape::FixedArrayPtr { len, elem }
        }
        Shape::DynamicArrayPtr { mut elem } => {
            elem.target = mt(elem.target);
            Shape::DynamicArrayPtr { elem }
        }
    }
}
