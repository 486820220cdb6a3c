//! Static registry of every persisted record kind.
//!
//! Each [`EntityKind`] maps to one [`EntitySchema`] (table name, natural key
//! field, stored fields), and each record type implements [`Entity`] to name
//! its kind and extract its key. Debug builds check every encoded row
//! against its schema. Stores only ever see `(kind, key, bytes)`.

use serde::{Serialize, de::DeserializeOwned};

use crate::{
    error::Result,
    model::{
        DatabaseInfo,
        DirectoryRecord,
        Document,
        Property,
        PropertyValue,
        Tag,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    Tag,
    Property,
    PropertyValue,
    Document,
    Directory,
    DatabaseInfo,
}

#[derive(Debug)]
pub struct EntitySchema {
    pub kind: EntityKind,
    pub table: &'static str,
    /// Stored field holding the natural key; `None` for fixed-key records.
    pub key_field: Option<&'static str>,
    pub fields: &'static [&'static str],
}

impl EntitySchema {
    /// Whether `row`, a serialized record, has exactly the registered fields
    /// and carries `key` in the key field.
    pub fn describes(&self, row: &serde_json::Value, key: &str) -> bool {
        let Some(object) = row.as_object() else {
            return false;
        };
        let fields_match = object.len() == self.fields.len()
            && self.fields.iter().all(|f| object.contains_key(*f));
        let key_matches = self.key_field.is_none_or(|field| {
            object.get(field).and_then(serde_json::Value::as_str) == Some(key)
        });
        fields_match && key_matches
    }
}

/// Indexed by `EntityKind as usize`.
pub const SCHEMA: [EntitySchema; 6] = [
    EntitySchema {
        kind: EntityKind::Tag,
        table: "tags",
        key_field: Some("name"),
        fields: &["name"],
    },
    EntitySchema {
        kind: EntityKind::Property,
        table: "properties",
        key_field: Some("name"),
        fields: &["name", "values"],
    },
    EntitySchema {
        kind: EntityKind::PropertyValue,
        table: "property_values",
        key_field: Some("value"),
        fields: &["value"],
    },
    EntitySchema {
        kind: EntityKind::Document,
        table: "documents",
        key_field: Some("absolute_path"),
        fields: &[
            "filename",
            "absolute_path",
            "parent_path",
            "tags",
            "properties",
            "creation_date",
        ],
    },
    EntitySchema {
        kind: EntityKind::Directory,
        table: "directories",
        key_field: Some("path"),
        fields: &["path", "name", "documents", "directories"],
    },
    EntitySchema {
        kind: EntityKind::DatabaseInfo,
        table: "database_info",
        key_field: None,
        fields: &["source_path"],
    },
];

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Tag,
        EntityKind::Property,
        EntityKind::PropertyValue,
        EntityKind::Document,
        EntityKind::Directory,
        EntityKind::DatabaseInfo,
    ];

    pub fn schema(self) -> &'static EntitySchema {
        &SCHEMA[self as usize]
    }

    pub fn table_name(self) -> &'static str {
        self.schema().table
    }

    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Tag => "tag",
            EntityKind::Property => "property",
            EntityKind::PropertyValue => "property value",
            EntityKind::Document => "document",
            EntityKind::Directory => "directory",
            EntityKind::DatabaseInfo => "database info",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A record type with a natural string key.
///
/// Ordering must agree with the key: two records with the same key compare
/// equal. The set algebra in [`crate::set_ops`] relies on it.
pub trait Entity: Serialize + DeserializeOwned + Ord + Clone {
    const KIND: EntityKind;

    fn key(&self) -> &str;

    fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl Entity for Tag {
    const KIND: EntityKind = EntityKind::Tag;

    fn key(&self) -> &str {
        &self.name
    }
}

impl Entity for Property {
    const KIND: EntityKind = EntityKind::Property;

    fn key(&self) -> &str {
        &self.name
    }
}

impl Entity for PropertyValue {
    const KIND: EntityKind = EntityKind::PropertyValue;

    fn key(&self) -> &str {
        &self.value
    }
}

impl Entity for Document {
    const KIND: EntityKind = EntityKind::Document;

    fn key(&self) -> &str {
        self.absolute_path()
    }
}

impl Entity for DirectoryRecord {
    const KIND: EntityKind = EntityKind::Directory;

    fn key(&self) -> &str {
        &self.path
    }
}

impl Entity for DatabaseInfo {
    const KIND: EntityKind = EntityKind::DatabaseInfo;

    fn key(&self) -> &str {
        DatabaseInfo::KEY
    }
}

/// Encode records into `(key, bytes)` rows for [`crate::store::StoreTransaction::insert_batch`].
pub fn encode_rows<E: Entity>(entities: &[E]) -> Result<Vec<(String, Vec<u8>)>> {
    entities
        .iter()
        .map(|e| {
            let bytes = e.encode()?;
            debug_assert!(
                serde_json::from_slice(&bytes)
                    .is_ok_and(|row| E::KIND.schema().describes(&row, e.key())),
                "{} row does not match its schema",
                E::KIND,
            );
            Ok((e.key().to_string(), bytes))
        })
        .collect()
}

/// Decode raw rows of one kind.
pub fn decode_all<E: Entity>(rows: Vec<Vec<u8>>) -> Result<Vec<E>> {
    rows.iter().map(|bytes| E::decode(bytes)).collect()
}
