//! Bulk reconciliation: diff a local batch against the store, then insert
//! only what is missing in one transaction.
//!
//! Every function here is a single step that either completes or returns the
//! first error. Lookups that fail are reported as [`Error::Lookup`] before
//! anything is written; failed writes are rolled back and reported as
//! [`Error::Write`].

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::{
    error::{Error, Result},
    model::{
        DatabaseInfo,
        Directory,
        DirectoryRecord,
        Document,
        Property,
        PropertyValue,
        PropertyValueSet,
        Tag,
    },
    schema::{Entity, EntityKind, decode_all, encode_rows},
    set_ops::{partition, remove_all},
    store::{Store, StoreTransaction},
    tree::{flatten_directories, flatten_documents},
};

/// The stored versions of every entity in `entities` that already exists.
///
/// Keys are looked up in chunks of at most `max_batch`.
pub fn find_existing<S, E>(
    store: &S,
    entities: &[E],
    max_batch: usize,
) -> Result<Vec<E>>
where
    S: Store,
    E: Entity,
{
    let keys: Vec<&str> = entities.iter().map(Entity::key).collect();
    let mut existing = Vec::new();
    for chunk in partition(&keys, max_batch) {
        let rows = store
            .find_by_keys(E::KIND, chunk)
            .map_err(|e| Error::lookup(E::KIND, e))?;
        existing.extend(
            decode_all::<E>(rows).map_err(|e| Error::lookup(E::KIND, e))?,
        );
    }
    Ok(existing)
}

/// Insert every entity of `entities` whose key is not stored yet.
///
/// Duplicates within `entities` are collapsed. Returns the number of rows
/// inserted; `Ok(0)` means no transaction was opened.
pub fn persist_entities<S, E>(
    store: &S,
    entities: &[E],
    max_batch: usize,
) -> Result<usize>
where
    S: Store,
    E: Entity,
{
    let existing = find_existing(store, entities, max_batch)?;
    let to_insert = remove_all(entities, &existing, true);
    if to_insert.is_empty() {
        debug!(kind = %E::KIND, requested = entities.len(), "nothing to insert");
        return Ok(0);
    }

    let rows = encode_rows(&to_insert).map_err(|e| Error::write(E::KIND, e))?;
    write_rows(store, E::KIND, &rows, max_batch)?;

    info!(
        kind = %E::KIND,
        inserted = to_insert.len(),
        skipped = existing.len(),
        "persisted"
    );
    Ok(to_insert.len())
}

/// Write `rows` in one transaction, rolling it back on the first failure.
pub(crate) fn write_rows<S: Store>(
    store: &S,
    kind: EntityKind,
    rows: &[(String, Vec<u8>)],
    max_batch: usize,
) -> Result<()> {
    let mut txn = store.begin().map_err(|e| Error::write(kind, e))?;

    let staged = partition(rows, max_batch)
        .try_for_each(|chunk| {
            debug!(%kind, rows = chunk.len(), "inserting batch");
            txn.insert_batch(kind, chunk)
        })
        .and_then(|()| txn.flush());

    if let Err(e) = staged {
        warn!(%kind, error = %e, "write failed, rolling back");
        if let Err(rollback) = txn.rollback() {
            warn!(%kind, error = %rollback, "rollback failed");
        }
        return Err(Error::write(kind, e));
    }

    txn.commit().map_err(|e| {
        warn!(%kind, error = %e, "commit failed");
        Error::write(kind, e)
    })
}

pub fn persist_tags<S: Store>(
    store: &S,
    tags: &[Tag],
    max_batch: usize,
) -> Result<usize> {
    persist_entities(store, tags, max_batch)
}

/// Properties that already exist are left as stored; their value sets are
/// not merged.
pub fn persist_properties<S: Store>(
    store: &S,
    properties: &[Property],
    max_batch: usize,
) -> Result<usize> {
    persist_entities(store, properties, max_batch)
}

pub fn persist_property_values<S: Store>(
    store: &S,
    values: &[PropertyValue],
    max_batch: usize,
) -> Result<usize> {
    persist_entities(store, values, max_batch)
}

pub fn persist_directories<S: Store>(
    store: &S,
    directories: &[DirectoryRecord],
    max_batch: usize,
) -> Result<usize> {
    persist_entities(store, directories, max_batch)
}

/// Group `(property, value)` assignments into one [`Property`] per name
/// carrying every value seen for it, plus the flat set of values.
fn group_property_values<'a>(
    sets: impl IntoIterator<Item = &'a PropertyValueSet>,
) -> (Vec<Property>, Vec<PropertyValue>) {
    let mut properties: BTreeMap<&str, Property> = BTreeMap::new();
    let mut values = BTreeSet::new();
    for set in sets {
        properties
            .entry(set.property.as_str())
            .or_insert_with(|| Property::new(&set.property))
            .add_value(set.property_value());
        values.insert(set.property_value());
    }
    (properties.into_values().collect(), values.into_iter().collect())
}

/// Persist the values, then the properties, referenced by `sets`.
///
/// Assignments with an empty property name or value are ignored. Returns the
/// number of properties and values inserted.
pub fn persist_property_value_sets<S: Store>(
    store: &S,
    sets: &[PropertyValueSet],
    max_batch: usize,
) -> Result<usize> {
    let (properties, values) = group_property_values(
        sets.iter()
            .filter(|s| !s.property.is_empty() && !s.value.is_empty()),
    );
    let inserted = persist_property_values(store, &values, max_batch)?;
    Ok(inserted + persist_properties(store, &properties, max_batch)?)
}

/// Every tag, property and property value referenced by `documents`.
pub fn extract_dependencies(
    documents: &[Document],
) -> (Vec<Tag>, Vec<Property>, Vec<PropertyValue>) {
    let tags: BTreeSet<Tag> = documents
        .iter()
        .flat_map(|d| d.tags().iter().cloned())
        .collect();
    let (properties, values) =
        group_property_values(documents.iter().flat_map(|d| d.properties()));
    (tags.into_iter().collect(), properties, values)
}

/// Persist the tags, properties and values the documents reference, then
/// the documents themselves. Stops at the first failing step.
///
/// Returns the number of documents inserted.
pub fn persist_documents<S: Store>(
    store: &S,
    documents: &[Document],
    max_batch: usize,
) -> Result<usize> {
    let (tags, properties, values) = extract_dependencies(documents);
    persist_tags(store, &tags, max_batch)?;
    persist_properties(store, &properties, max_batch)?;
    persist_property_values(store, &values, max_batch)?;
    persist_entities(store, documents, max_batch)
}

/// Insert or replace the singleton [`DatabaseInfo`].
pub fn persist_database_info<S: Store>(
    store: &S,
    info: &DatabaseInfo,
) -> Result<()> {
    let rows = encode_rows(std::slice::from_ref(info))
        .map_err(|e| Error::write(DatabaseInfo::KIND, e))?;
    write_rows(store, DatabaseInfo::KIND, &rows, 1)?;
    debug!(source_path = %info.source_path, "stored database info");
    Ok(())
}

/// Counts of rows inserted by [`persist_directory`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistSummary {
    pub documents: usize,
    pub directories: usize,
}

/// Record `source_path`, then persist every document and every directory
/// of the tree, documents first.
pub fn persist_directory<S: Store>(
    store: &S,
    root: &Directory,
    source_path: &str,
    max_batch: usize,
) -> Result<PersistSummary> {
    persist_database_info(store, &DatabaseInfo::new(source_path))?;

    let documents: Vec<Document> =
        flatten_documents(root).into_iter().cloned().collect();
    let documents = persist_documents(store, &documents, max_batch)?;

    let directories: Vec<DirectoryRecord> = flatten_directories(root)
        .into_iter()
        .map(Directory::to_record)
        .collect();
    let directories = persist_directories(store, &directories, max_batch)?;

    Ok(PersistSummary {
        documents,
        directories,
    })
}
