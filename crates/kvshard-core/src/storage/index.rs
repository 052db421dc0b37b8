//! Index and store definitions.

use serde::{Deserialize, Serialize};

use super::key::{IndexKey, KeyPart};
use crate::document::Document;

/// Compound `[age, id]` index used by range scans.
pub const AGE_INDEX: &str = "age-index";

/// Single-field index over [`Document::age_stringified`].
pub const CUSTOM_AGE_INDEX: &str = "custom-age-index";

/// Compound `[flag, timestamp]` index.
pub const BOOL_TIMESTAMP_INDEX: &str = "bool-timestamp";

/// A document field usable in a key path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Field {
    Id,
    Age,
    AgeStringified,
    Nr,
    Timestamp,
    Flag,
}

impl Field {
    /// Extract this field from a document as a key part.
    pub fn extract(&self, doc: &Document) -> KeyPart {
        match self {
            Field::Id => KeyPart::String(doc.id.clone()),
            Field::Age => KeyPart::Number(doc.age),
            Field::AgeStringified => KeyPart::String(doc.age_stringified.clone()),
            Field::Nr => KeyPart::Number(doc.nr),
            Field::Timestamp => KeyPart::Number(doc.timestamp as f64),
            Field::Flag => KeyPart::Bool(doc.flag),
        }
    }
}

/// Secondary index definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDef {
    /// Index name, unique within a store.
    pub name: String,

    /// Fields making up the index key, in comparison order.
    pub key_path: Vec<Field>,
}

impl IndexDef {
    /// Create an index definition.
    pub fn new(name: impl Into<String>, key_path: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            key_path,
        }
    }

    /// Whether the key has more than one part.
    pub fn is_compound(&self) -> bool {
        self.key_path.len() > 1
    }

    /// Number of key parts.
    pub fn arity(&self) -> usize {
        self.key_path.len()
    }

    /// Index key of a document.
    pub fn key_for(&self, doc: &Document) -> IndexKey {
        IndexKey::new(self.key_path.iter().map(|f| f.extract(doc)).collect())
    }
}

/// The indexes every benchmark store carries.
pub fn default_indexes() -> Vec<IndexDef> {
    vec![
        IndexDef::new(AGE_INDEX, vec![Field::Age, Field::Id]),
        IndexDef::new(CUSTOM_AGE_INDEX, vec![Field::AgeStringified]),
        IndexDef::new(BOOL_TIMESTAMP_INDEX, vec![Field::Flag, Field::Timestamp]),
    ]
}

/// Object store definition: name, primary key and indexes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreDef {
    /// Store name, unique within a database.
    pub name: String,

    /// Primary key field.
    pub key_path: Field,

    /// Secondary indexes maintained on write.
    pub indexes: Vec<IndexDef>,
}

impl StoreDef {
    /// Store keyed by id with the default indexes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_path: Field::Id,
            indexes: default_indexes(),
        }
    }

    /// Store keyed by id without secondary indexes.
    pub fn without_indexes(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_path: Field::Id,
            indexes: Vec::new(),
        }
    }

    /// Add an index.
    pub fn with_index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }

    /// Look up an index definition by name.
    pub fn index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.iter().find(|i| i.name == name)
    }
}
