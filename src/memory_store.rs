//! In-process [`Store`] backed by ordered maps.

use std::{collections::BTreeMap, ops::Bound};

use parking_lot::RwLock;

use crate::{
    error::Result,
    schema::EntityKind,
    store::{Store, StoreTransaction},
};

type Table = BTreeMap<String, Vec<u8>>;

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<BTreeMap<EntityKind, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows of `kind`.
    pub fn len(&self, kind: EntityKind) -> usize {
        self.tables.read().get(&kind).map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.read().values().all(BTreeMap::is_empty)
    }
}

impl Store for MemoryStore {
    type Transaction<'a> = MemoryTransaction<'a>;

    fn find_by_key(
        &self,
        kind: EntityKind,
        key: &str,
    ) -> Result<Option<Vec<u8>>> {
        Ok(self
            .tables
            .read()
            .get(&kind)
            .and_then(|t| t.get(key))
            .cloned())
    }

    fn scan(&self, kind: EntityKind) -> Result<Vec<Vec<u8>>> {
        Ok(self
            .tables
            .read()
            .get(&kind)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default())
    }

    fn find_by_key_prefix(
        &self,
        kind: EntityKind,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<Vec<u8>>> {
        let tables = self.tables.read();
        let Some(table) = tables.get(&kind) else {
            return Ok(Vec::new());
        };
        Ok(table
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .take(limit)
            .map(|(_, v)| v.clone())
            .collect())
    }

    fn begin(&self) -> Result<MemoryTransaction<'_>> {
        Ok(MemoryTransaction {
            store: self,
            staged: Vec::new(),
        })
    }
}

#[derive(Debug)]
enum Op {
    Insert(EntityKind, String, Vec<u8>),
    Delete(EntityKind, String),
    DeleteAll(EntityKind),
}

/// Writes are staged and applied under a single write lock on commit.
#[derive(Debug)]
pub struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    staged: Vec<Op>,
}

impl StoreTransaction for MemoryTransaction<'_> {
    fn insert_batch(
        &mut self,
        kind: EntityKind,
        rows: &[(String, Vec<u8>)],
    ) -> Result<()> {
        self.staged.extend(
            rows.iter()
                .map(|(key, row)| Op::Insert(kind, key.clone(), row.clone())),
        );
        Ok(())
    }

    fn delete(&mut self, kind: EntityKind, key: &str) -> Result<()> {
        self.staged.push(Op::Delete(kind, key.to_string()));
        Ok(())
    }

    fn delete_all(&mut self, kind: EntityKind) -> Result<()> {
        self.staged.push(Op::DeleteAll(kind));
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn commit(self) -> Result<()> {
        let mut tables = self.store.tables.write();
        for op in self.staged {
            match op {
                Op::Insert(kind, key, row) => {
                    tables.entry(kind).or_default().insert(key, row);
                }
                Op::Delete(kind, key) => {
                    if let Some(table) = tables.get_mut(&kind) {
                        table.remove(&key);
                    }
                }
                Op::DeleteAll(kind) => {
                    tables.remove(&kind);
                }
            }
        }
        Ok(())
    }

    fn rollback(self) -> Result<()> {
        Ok(())
    }
}
