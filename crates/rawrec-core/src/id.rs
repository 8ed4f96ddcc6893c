//! Strongly-typed identifiers for records and field slots.

use std::fmt;

/// Identifies a record type within a [`Schema`](crate::Schema).
///
/// Records are registered with the schema builder and assigned sequential
/// IDs. `RecordId(n)` corresponds to the n-th record that survived
/// classification. Mutually recursive record types reference each other
/// through `RecordId`, never by structural embedding, so recursive schemas
/// stay representable with finite types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub u32);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for RecordId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a field slot within a record type.
///
/// A declaration may introduce several names for one type (`x, y: f64`);
/// each name becomes its own slot. `FieldId(n)` is the n-th slot in
/// declaration order, which is also the order the free plan visits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub u32);

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for FieldId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}
