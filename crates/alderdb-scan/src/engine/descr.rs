//! Table and index descriptors exposed by the storage engine.

use serde::{Deserialize, Serialize};
use std::fmt;

///
/// RelationId
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct RelationId(pub u32);

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rel:{}", self.0)
    }
}

///
/// IndexId
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct IndexId(pub u32);

impl fmt::Display for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "idx:{}", self.0)
    }
}

///
/// KeyType
///
/// Value type identifier for primary-key fields, recorded into bitmap-heap
/// plan payloads and handed back to the engine when cursors are built.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum KeyType {
    Bool,
    Int,
    Text,
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Text => "text",
        };
        f.write_str(label)
    }
}

///
/// IndexDescr
///
/// Runtime-only descriptor for one engine index. Field order is the index
/// key order; `primary` marks the table's primary index.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct IndexDescr {
    pub id: IndexId,
    pub name: String,
    pub fields: Vec<(String, KeyType)>,
    pub primary: bool,
}

impl IndexDescr {
    #[must_use]
    pub fn new(
        id: IndexId,
        name: impl Into<String>,
        fields: Vec<(String, KeyType)>,
        primary: bool,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            fields,
            primary,
        }
    }
}

impl fmt::Display for IndexDescr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.fields.iter().map(|(name, _)| name.as_str()).collect();
        write!(f, "{}({})", self.name, fields.join(", "))
    }
}

///
/// TableDescr
///
/// Descriptor for one engine-backed relation: ordered column list and
/// ordered index list. Index position in `indexes` is the identity used by
/// instrumentation counters.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TableDescr {
    pub relation: RelationId,
    pub name: String,
    pub columns: Vec<String>,
    pub indexes: Vec<IndexDescr>,
}

impl TableDescr {
    /// The table's primary index, when one is declared.
    #[must_use]
    pub fn primary(&self) -> Option<&IndexDescr> {
        self.indexes.iter().find(|index| index.primary)
    }

    /// Position of `id` in the ordered index list.
    #[must_use]
    pub fn index_position(&self, id: IndexId) -> Option<usize> {
        self.indexes.iter().position(|index| index.id == id)
    }

    #[must_use]
    pub fn column_position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descr() -> TableDescr {
        TableDescr {
            relation: RelationId(1),
            name: "orders".to_string(),
            columns: vec!["id".to_string(), "dept".to_string()],
            indexes: vec![
                IndexDescr::new(
                    IndexId(10),
                    "orders_pkey",
                    vec![("id".to_string(), KeyType::Int)],
                    true,
                ),
                IndexDescr::new(
                    IndexId(11),
                    "orders_dept_idx",
                    vec![("dept".to_string(), KeyType::Text)],
                    false,
                ),
            ],
        }
    }

    #[test]
    fn primary_index_is_found_by_flag() {
        let descr = descr();
        assert_eq!(descr.primary().unwrap().name, "orders_pkey");
    }

    #[test]
    fn index_position_follows_declared_order() {
        let descr = descr();
        assert_eq!(descr.index_position(IndexId(11)), Some(1));
        assert_eq!(descr.index_position(IndexId(99)), None);
    }
}
