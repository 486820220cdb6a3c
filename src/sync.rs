//! Mirroring a local tree into a store, and copying one store into another.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::{
    error::{Error, Result},
    model::{
        DatabaseInfo,
        Directory,
        DirectoryRecord,
        Document,
        Property,
        PropertyValue,
        Tag,
    },
    persist::{
        find_existing,
        persist_database_info,
        persist_directories,
        persist_documents,
        persist_properties,
        persist_property_values,
        persist_tags,
    },
    schema::{Entity, EntityKind, decode_all, encode_rows},
    set_ops::remove_all,
    store::{Store, StoreTransaction},
    tree::{flatten_directories, flatten_documents},
};

fn local_documents(root: &Directory) -> Vec<Document> {
    flatten_documents(root).into_iter().cloned().collect()
}

fn local_directories(root: &Directory) -> Vec<DirectoryRecord> {
    flatten_directories(root)
        .into_iter()
        .map(Directory::to_record)
        .collect()
}

/// Number of distinct documents in the tree that are not stored yet.
pub fn documents_not_in<S: Store>(
    store: &S,
    root: &Directory,
    max_batch: usize,
) -> Result<usize> {
    not_stored(store, &local_documents(root), max_batch)
}

/// Number of distinct directories in the tree, root included, that are not
/// stored yet.
pub fn directories_not_in<S: Store>(
    store: &S,
    root: &Directory,
    max_batch: usize,
) -> Result<usize> {
    not_stored(store, &local_directories(root), max_batch)
}

fn not_stored<S: Store, E: Entity>(
    store: &S,
    local: &[E],
    max_batch: usize,
) -> Result<usize> {
    let existing = find_existing(store, local, max_batch)?;
    Ok(remove_all(local, &existing, true).len())
}

fn stored<S: Store, E: Entity>(store: &S) -> Result<Vec<E>> {
    store
        .scan(E::KIND)
        .and_then(decode_all::<E>)
        .map_err(|e| Error::lookup(E::KIND, e))
}

/// What [`synchronize`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub removed_documents: usize,
    pub removed_directories: usize,
    pub inserted_documents: usize,
    pub inserted_directories: usize,
    /// Directories kept whose child lists were rewritten.
    pub updated_directories: usize,
}

/// Make the stored documents and directories mirror the tree.
///
/// In one transaction, every stored document and directory missing from
/// the tree is deleted and every kept directory whose child lists differ
/// from the tree is rewritten. Then the rest of the tree is persisted. Tags,
/// properties and values are never deleted.
pub fn synchronize<S: Store>(
    store: &S,
    root: &Directory,
    max_batch: usize,
) -> Result<SyncSummary> {
    let documents = local_documents(root);
    let directories = local_directories(root);

    let stored_directories = stored::<S, DirectoryRecord>(store)?;
    let stale_documents =
        remove_all(&stored::<S, Document>(store)?, &documents, true);
    let stale_directories =
        remove_all(&stored_directories, &directories, true);
    let changed = changed_directories(&stored_directories, &directories);

    let stale_keys: Vec<(EntityKind, &str)> = stale_documents
        .iter()
        .map(|d| (Document::KIND, d.key()))
        .chain(
            stale_directories
                .iter()
                .map(|d| (DirectoryRecord::KIND, d.key())),
        )
        .collect();
    let rewrites = encode_rows(&changed)
        .map_err(|e| Error::write(DirectoryRecord::KIND, e))?;
    apply_changes(store, &stale_keys, &rewrites)?;

    let summary = SyncSummary {
        removed_documents: stale_documents.len(),
        removed_directories: stale_directories.len(),
        inserted_documents: persist_documents(store, &documents, max_batch)?,
        inserted_directories: persist_directories(
            store,
            &directories,
            max_batch,
        )?,
        updated_directories: changed.len(),
    };
    info!(
        removed_documents = summary.removed_documents,
        removed_directories = summary.removed_directories,
        inserted_documents = summary.inserted_documents,
        inserted_directories = summary.inserted_directories,
        updated_directories = summary.updated_directories,
        "synchronized"
    );
    Ok(summary)
}

/// Local records whose stored counterpart lists different children.
fn changed_directories(
    stored: &[DirectoryRecord],
    local: &[DirectoryRecord],
) -> Vec<DirectoryRecord> {
    let stored: BTreeMap<&str, &DirectoryRecord> =
        stored.iter().map(|d| (d.key(), d)).collect();
    local
        .iter()
        .filter(|record| {
            stored.get(record.key()).is_some_and(|old| {
                old.name != record.name
                    || old.documents != record.documents
                    || old.directories != record.directories
            })
        })
        .cloned()
        .collect()
}

/// [`synchronize`], then record `source_path` as the tree's origin.
pub fn synchronize_with_source<S: Store>(
    store: &S,
    root: &Directory,
    source_path: &str,
    max_batch: usize,
) -> Result<SyncSummary> {
    let summary = synchronize(store, root, max_batch)?;
    persist_database_info(store, &DatabaseInfo::new(source_path))?;
    Ok(summary)
}

/// Delete `(kind, key)` rows and rewrite directory rows in one transaction.
fn apply_changes<S: Store>(
    store: &S,
    deletes: &[(EntityKind, &str)],
    directory_rows: &[(String, Vec<u8>)],
) -> Result<()> {
    let Some(first_kind) = deletes
        .first()
        .map(|&(kind, _)| kind)
        .or_else(|| directory_rows.first().map(|_| DirectoryRecord::KIND))
    else {
        return Ok(());
    };
    let mut txn = store.begin().map_err(|e| Error::write(first_kind, e))?;

    let applied = deletes
        .iter()
        .try_for_each(|&(kind, key)| {
            txn.delete(kind, key).map_err(|e| (kind, e))
        })
        .and_then(|()| {
            if directory_rows.is_empty() {
                return Ok(());
            }
            txn.insert_batch(DirectoryRecord::KIND, directory_rows)
                .map_err(|e| (DirectoryRecord::KIND, e))
        })
        .and_then(|()| txn.flush().map_err(|e| (first_kind, e)));

    if let Err((kind, e)) = applied {
        warn!(%kind, error = %e, "sync write failed, rolling back");
        if let Err(rollback) = txn.rollback() {
            warn!(%kind, error = %rollback, "rollback failed");
        }
        return Err(Error::write(kind, e));
    }
    txn.commit().map_err(|e| Error::write(first_kind, e))
}

/// Everything a store holds, read in one go so it can be written elsewhere.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub tags: Vec<Tag>,
    pub properties: Vec<Property>,
    pub property_values: Vec<PropertyValue>,
    pub documents: Vec<Document>,
    pub directories: Vec<DirectoryRecord>,
    pub database_info: Option<DatabaseInfo>,
}

impl Snapshot {
    pub fn read<S: Store>(store: &S) -> Result<Self> {
        let database_info = store
            .find_by_key(EntityKind::DatabaseInfo, DatabaseInfo::KEY)
            .and_then(|row| row.map(|r| DatabaseInfo::decode(&r)).transpose())
            .map_err(|e| Error::lookup(EntityKind::DatabaseInfo, e))?;

        Ok(Self {
            tags: stored(store)?,
            properties: stored(store)?,
            property_values: stored(store)?,
            documents: stored(store)?,
            directories: stored(store)?,
            database_info,
        })
    }

    /// Merge into `store` through the usual reconciliation. Entries already
    /// in `store` are kept as they are.
    pub fn write_to<S: Store>(&self, store: &S, max_batch: usize) -> Result<()> {
        if let Some(info) = &self.database_info {
            persist_database_info(store, info)?;
        }
        persist_tags(store, &self.tags, max_batch)?;
        persist_properties(store, &self.properties, max_batch)?;
        persist_property_values(store, &self.property_values, max_batch)?;
        persist_documents(store, &self.documents, max_batch)?;
        persist_directories(store, &self.directories, max_batch)?;
        Ok(())
    }
}

/// Copy everything `from` holds into `to` without removing anything from
/// `to`.
pub fn copy_store_to<S: Store, T: Store>(
    from: &S,
    to: &T,
    max_batch: usize,
) -> Result<()> {
    Snapshot::read(from)?.write_to(to, max_batch)
}
