//! Classified record definitions and the schema registry.

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::id::{FieldId, RecordId};
use crate::shape::Shape;

/// A classified field declaration.
///
/// One declaration may introduce several names sharing a type
/// (`x, y: f64`); the spec keeps them together, while the flattened slot
/// view on [`RecordDef`] addresses each name individually.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldSpec {
    /// The declared name(s), in source order. Never empty.
    pub names: SmallVec<[String; 2]>,
    /// The resolved shape. Exactly one per spec; unclassifiable
    /// declarations never make it into a schema.
    pub shape: Shape,
    /// The raw declared type, as written (`*[4]str`, `Point`, ...).
    pub type_name: String,
    /// Opaque tag metadata carried through from the declaration.
    /// rawrec never interprets it.
    pub metadata: Option<String>,
}

/// One name slot of a record, with its resolved shape.
#[derive(Clone, Copy, Debug)]
pub struct Slot<'a> {
    /// The slot's id (declaration order).
    pub field: FieldId,
    /// The field name.
    pub name: &'a str,
    /// The resolved shape.
    pub shape: Shape,
    /// The owning spec (for type name and metadata).
    pub spec: &'a FieldSpec,
}

/// A record type: a name plus its classified fields.
///
/// Immutable after classification. Created only by the schema builder.
#[derive(Clone, Debug)]
pub struct RecordDef {
    name: String,
    specs: Vec<FieldSpec>,
    /// Flattened (spec index, name index) per slot, declaration order.
    slots: Vec<(u32, u32)>,
}

impl RecordDef {
    pub(crate) fn new(name: String, specs: Vec<FieldSpec>) -> Self {
        let mut slots = Vec::new();
        for (spec_idx, spec) in specs.iter().enumerate() {
            for name_idx in 0..spec.names.len() {
                slots.push((spec_idx as u32, name_idx as u32));
            }
        }
        Self { name, specs, slots }
    }

    /// The record's declared name. Used for emitted operation naming
    /// and error reporting.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The field specs, in declaration order.
    pub fn specs(&self) -> &[FieldSpec] {
        &self.specs
    }

    /// Number of name slots (≥ number of specs).
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Look up a slot by id.
    ///
    /// # Panics
    ///
    /// Panics if `field` is out of range for this record.
    pub fn slot(&self, field: FieldId) -> Slot<'_> {
        let (spec_idx, name_idx) = self.slots[field.0 as usize];
        let spec = &self.specs[spec_idx as usize];
        Slot {
            field,
            name: &spec.names[name_idx as usize],
            shape: spec.shape,
            spec,
        }
    }

    /// Iterate over all slots in declaration order.
    pub fn slots(&self) -> impl Iterator<Item = Slot<'_>> {
        (0..self.slots.len() as u32).map(|i| self.slot(FieldId(i)))
    }

    /// Find a slot by field name.
    pub fn field_named(&self, name: &str) -> Option<FieldId> {
        self.slots().find(|s| s.name == name).map(|s| s.field)
    }
}

/// A registry of classified record types.
///
/// Records are addressed by stable [`RecordId`]; mutually recursive
/// schemas (A holds `*B`, B holds `*A`) are representable because shapes
/// reference records by id, never by structural embedding. Every id that
/// appears in any shape of a built schema resolves.
#[derive(Clone, Debug, Default)]
pub struct Schema {
    records: Vec<RecordDef>,
    by_name: IndexMap<String, RecordId>,
}

impl Schema {
    pub(crate) fn from_records(records: Vec<RecordDef>) -> Self {
        let by_name = records
            .iter()
            .enumerate()
            .map(|(idx, r)| (r.name().to_string(), RecordId(idx as u32)))
            .collect();
        Self { records, by_name }
    }

    /// Look up a record definition.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this schema.
    pub fn record(&self, id: RecordId) -> &RecordDef {
        &self.records[id.0 as usize]
    }

    /// Resolve a record name to its id.
    pub fn id_of(&self, name: &str) -> Option<RecordId> {
        self.by_name.get(name).copied()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the schema holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over `(id, def)` pairs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (RecordId, &RecordDef)> {
        self.records
            .iter()
            .enumerate()
            .map(|(idx, def)| (RecordId(idx as u32), def))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::ScalarKind;
    use smallvec::smallvec;

    fn spec(names: &[&str], shape: Shape) -> FieldSpec {
        FieldSpec {
            names: names.iter().map(|s| s.to_string()).collect(),
            shape,
            type_name: "test".into(),
            metadata: None,
        }
    }

    #[test]
    fn multi_name_specs_flatten_to_slots() {
        let def = RecordDef::new(
            "Point".into(),
            vec![
                spec(&["x", "y"], Shape::Scalar(ScalarKind::F64)),
                spec(&["label"], Shape::Str),
            ],
        );
        assert_eq!(def.slot_count(), 3);
        assert_eq!(def.specs().len(), 2);

        let names: Vec<&str> = def.slots().map(|s| s.name).collect();
        assert_eq!(names, ["x", "y", "label"]);
        assert_eq!(def.field_named("y"), Some(FieldId(1)));
        assert_eq!(def.field_named("z"), None);
        assert_eq!(def.slot(FieldId(2)).shape, Shape::Str);
    }

    #[test]
    fn schema_name_index() {
        let schema = Schema::from_records(vec![
            RecordDef::new("A".into(), vec![]),
            RecordDef::new(
                "B".into(),
                vec![spec(&["n"], Shape::Scalar(ScalarKind::I32))],
            ),
        ]);
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.id_of("B"), Some(RecordId(1)));
        assert_eq!(schema.record(RecordId(0)).name(), "A");
        let _ = FieldSpec {
            names: smallvec!["solo".to_string()],
            shape: Shape::Str,
            type_name: "str".into(),
            metadata: Some("json:\"solo\"".into()),
        };
    }
}
