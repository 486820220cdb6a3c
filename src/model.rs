//! Metadata records: tags, properties, documents and the directory tree.
//!
//! Every record has a natural string key and compares by that key alone, so
//! two instances describing the same stored row are equal even if one of them
//! carries more detail.

use std::{cmp::Ordering, collections::BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Tag {
    pub name: String,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PropertyValue {
    pub value: String,
}

impl PropertyValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// A named property and every value it has been seen with.
///
/// Equality and ordering only look at `name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    values: BTreeSet<PropertyValue>,
}

impl Property {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: BTreeSet::new(),
        }
    }

    pub fn with_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut property = Self::new(name);
        property.add_value(PropertyValue::new(value));
        property
    }

    /// Add a value unless an equal one is already present.
    ///
    /// Returns whether the value was new.
    pub fn add_value(&mut self, value: PropertyValue) -> bool {
        self.values.insert(value)
    }

    pub fn values(&self) -> &BTreeSet<PropertyValue> {
        &self.values
    }
}

impl PartialEq for Property {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Property {}

impl PartialOrd for Property {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Property {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

/// One `(property, value)` assignment on a document, referencing both by key.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PropertyValueSet {
    pub property: String,
    pub value: String,
}

impl PropertyValueSet {
    pub fn new(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
        }
    }

    pub fn property(&self) -> Property {
        Property::with_value(&self.property, &self.value)
    }

    pub fn property_value(&self) -> PropertyValue {
        PropertyValue::new(&self.value)
    }
}

/// A file and its metadata, keyed by `absolute_path`.
///
/// Documents are immutable once built; the `with_*` methods are only meant
/// for construction.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use docman::Document;
///
/// let date = NaiveDate::from_ymd_opt(2021, 3, 14).unwrap();
/// let doc = Document::new("n1", "C/n1", date)
///     .with_tag("t1")
///     .with_property("author", "ada");
///
/// assert_eq!(doc.parent_path(), "C");
/// assert_eq!(doc.tags().len(), 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    filename: String,
    absolute_path: String,
    parent_path: String,
    tags: BTreeSet<Tag>,
    properties: BTreeSet<PropertyValueSet>,
    creation_date: NaiveDate,
}

impl Document {
    pub fn new(
        filename: impl Into<String>,
        absolute_path: impl Into<String>,
        creation_date: NaiveDate,
    ) -> Self {
        let filename = filename.into();
        let absolute_path = absolute_path.into();
        let parent_path = derive_parent_path(&absolute_path, &filename);
        Self {
            filename,
            absolute_path,
            parent_path,
            tags: BTreeSet::new(),
            properties: BTreeSet::new(),
            creation_date,
        }
    }

    pub fn with_tag(mut self, name: impl Into<String>) -> Self {
        self.tags.insert(Tag::new(name));
        self
    }

    pub fn with_tags<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(names.into_iter().map(Tag::new));
        self
    }

    pub fn with_property(
        mut self,
        property: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.properties
            .insert(PropertyValueSet::new(property, value));
        self
    }

    pub fn with_properties<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.properties.extend(
            pairs
                .into_iter()
                .map(|(k, v)| PropertyValueSet::new(k, v)),
        );
        self
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn absolute_path(&self) -> &str {
        &self.absolute_path
    }

    /// `absolute_path` without the trailing `/filename`, or `""` when the
    /// path does not end that way.
    pub fn parent_path(&self) -> &str {
        &self.parent_path
    }

    pub fn tags(&self) -> &BTreeSet<Tag> {
        &self.tags
    }

    pub fn properties(&self) -> &BTreeSet<PropertyValueSet> {
        &self.properties
    }

    pub fn creation_date(&self) -> NaiveDate {
        self.creation_date
    }
}

fn derive_parent_path(absolute_path: &str, filename: &str) -> String {
    absolute_path
        .strip_suffix(filename)
        .and_then(|rest| rest.strip_suffix('/'))
        .unwrap_or_default()
        .to_string()
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.absolute_path == other.absolute_path
    }
}

impl Eq for Document {}

impl PartialOrd for Document {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Document {
    fn cmp(&self, other: &Self) -> Ordering {
        self.absolute_path.cmp(&other.absolute_path)
    }
}

/// A node of a scanned directory tree. Owns its children.
#[derive(Debug, Clone, PartialEq)]
pub struct Directory {
    pub path: String,
    pub name: String,
    pub documents: Vec<Document>,
    pub directories: Vec<Directory>,
}

impl Directory {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            documents: Vec::new(),
            directories: Vec::new(),
        }
    }

    pub fn with_document(mut self, document: Document) -> Self {
        self.documents.push(document);
        self
    }

    pub fn with_directory(mut self, directory: Directory) -> Self {
        self.directories.push(directory);
        self
    }

    /// The stored shape of this node: children are referenced by key.
    pub fn to_record(&self) -> DirectoryRecord {
        DirectoryRecord {
            path: self.path.clone(),
            name: self.name.clone(),
            documents: self
                .documents
                .iter()
                .map(|d| d.absolute_path().to_string())
                .collect(),
            directories: self
                .directories
                .iter()
                .map(|d| d.path.clone())
                .collect(),
        }
    }
}

/// A persisted directory node, keyed by `path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryRecord {
    pub path: String,
    pub name: String,
    pub documents: Vec<String>,
    pub directories: Vec<String>,
}

impl From<&Directory> for DirectoryRecord {
    fn from(dir: &Directory) -> Self {
        dir.to_record()
    }
}

impl PartialEq for DirectoryRecord {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for DirectoryRecord {}

impl PartialOrd for DirectoryRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DirectoryRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.path.cmp(&other.path)
    }
}

/// Singleton describing where the stored tree was scanned from.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct DatabaseInfo {
    pub source_path: String,
}

impl DatabaseInfo {
    pub const KEY: &'static str = "0";

    pub fn new(source_path: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
    }

    #[test]
    fn parent_path_is_derived() {
        let doc = Document::new("n2", "C/sub/n2", date());
        assert_eq!(doc.parent_path(), "C/sub");
    }

    #[test]
    fn parent_path_empty_when_derivation_fails() {
        assert_eq!(Document::new("n1", "n1", date()).parent_path(), "");
        assert_eq!(Document::new("other", "C/n1", date()).parent_path(), "");
        assert_eq!(Document::new("n1", "", date()).parent_path(), "");
    }

    #[test]
    fn documents_compare_by_path_only() {
        let a = Document::new("n1", "C/n1", date()).with_tag("t1");
        let b = Document::new("n1", "C/n1", date());
        let c = Document::new("n0", "C/n0", date());
        assert_eq!(a, b);
        assert!(c < a);
    }

    #[test]
    fn duplicate_tags_and_properties_collapse() {
        let doc = Document::new("n1", "C/n1", date())
            .with_tags(["a", "b", "a"])
            .with_properties([("k", "v"), ("k", "v"), ("k", "w")]);
        assert_eq!(doc.tags().len(), 2);
        assert_eq!(doc.properties().len(), 2);
    }

    #[test]
    fn property_values_are_append_only_and_deduplicated() {
        let mut p = Property::new("author");
        assert!(p.add_value(PropertyValue::new("ada")));
        assert!(!p.add_value(PropertyValue::new("ada")));
        assert!(p.add_value(PropertyValue::new("alan")));
        assert_eq!(p.values().len(), 2);
    }

    #[test]
    fn properties_compare_by_name() {
        let a = Property::with_value("author", "ada");
        let b = Property::with_value("author", "alan");
        assert_eq!(a, b);
        assert!(Property::new("a") < Property::new("b"));
    }

    #[test]
    fn directory_record_references_children_by_key() {
        let root = Directory::new("", "C")
            .with_document(Document::new("n1", "n1", date()))
            .with_directory(Directory::new("sub", "sub"));
        let record = root.to_record();
        assert_eq!(record.documents, vec!["n1".to_string()]);
        assert_eq!(record.directories, vec!["sub".to_string()]);
    }
}
