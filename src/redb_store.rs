use std::path::Path;

use redb::{
    Database,
    ReadableDatabase,
    ReadableTable,
    TableDefinition,
    WriteTransaction,
};
use tracing::debug;

use crate::{
    error::Result,
    schema::EntityKind,
    store::{Store, StoreTransaction},
};

type Rows = TableDefinition<'static, &'static str, &'static [u8]>;

const SETTINGS: TableDefinition<&str, &str> = TableDefinition::new("settings");

fn rows_table(kind: EntityKind) -> Rows {
    TableDefinition::new(kind.table_name())
}

/// Durable [`Store`] on a single redb file: one table per record kind plus
/// a string settings table.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        // Ensure all tables exist by opening them in a write transaction.
        let txn = db.begin_write()?;
        for kind in EntityKind::ALL {
            txn.open_table(rows_table(kind))?;
        }
        txn.open_table(SETTINGS)?;
        txn.commit()?;

        debug!(path = %path.display(), "opened store");
        Ok(Self { db })
    }

    // -- Settings --

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }

    /// Get a setting, returning the default if not set.
    pub fn get_setting_or(&self, key: &str, default: &str) -> Result<String> {
        Ok(self
            .get_setting(key)?
            .unwrap_or_else(|| default.to_string()))
    }
}

impl Store for RedbStore {
    type Transaction<'a> = RedbTransaction;

    fn find_by_key(
        &self,
        kind: EntityKind,
        key: &str,
    ) -> Result<Option<Vec<u8>>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(rows_table(kind))?;
        Ok(table.get(key)?.map(|v| v.value().to_vec()))
    }

    /// All keys are looked up inside one read transaction.
    fn find_by_keys(
        &self,
        kind: EntityKind,
        keys: &[&str],
    ) -> Result<Vec<Vec<u8>>> {
        let mut keys = keys.to_vec();
        keys.sort_unstable();
        keys.dedup();

        let txn = self.db.begin_read()?;
        let table = txn.open_table(rows_table(kind))?;
        let mut result = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(v) = table.get(key)? {
                result.push(v.value().to_vec());
            }
        }
        Ok(result)
    }

    fn scan(&self, kind: EntityKind) -> Result<Vec<Vec<u8>>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(rows_table(kind))?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (_k, v) = entry?;
            result.push(v.value().to_vec());
        }
        Ok(result)
    }

    fn find_by_key_prefix(
        &self,
        kind: EntityKind,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<Vec<u8>>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(rows_table(kind))?;
        let mut result = Vec::new();
        for entry in table.range(prefix..)? {
            if result.len() >= limit {
                break;
            }
            let (k, v) = entry?;
            if !k.value().starts_with(prefix) {
                break;
            }
            result.push(v.value().to_vec());
        }
        Ok(result)
    }

    fn begin(&self) -> Result<RedbTransaction> {
        Ok(RedbTransaction {
            txn: self.db.begin_write()?,
        })
    }
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

/// A redb write transaction. Dropping it without committing aborts it.
pub struct RedbTransaction {
    txn: WriteTransaction,
}

impl StoreTransaction for RedbTransaction {
    fn insert_batch(
        &mut self,
        kind: EntityKind,
        rows: &[(String, Vec<u8>)],
    ) -> Result<()> {
        let mut table = self.txn.open_table(rows_table(kind))?;
        for (key, row) in rows {
            table.insert(key.as_str(), row.as_slice())?;
        }
        Ok(())
    }

    fn delete(&mut self, kind: EntityKind, key: &str) -> Result<()> {
        let mut table = self.txn.open_table(rows_table(kind))?;
        table.remove(key)?;
        Ok(())
    }

    fn delete_all(&mut self, kind: EntityKind) -> Result<()> {
        let mut table = self.txn.open_table(rows_table(kind))?;
        let mut keys = Vec::new();
        for entry in table.iter()? {
            let (k, _v) = entry?;
            keys.push(k.value().to_string());
        }
        for key in &keys {
            table.remove(key.as_str())?;
        }
        Ok(())
    }

    /// redb has no partial flush; everything lands at commit.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn commit(self) -> Result<()> {
        self.txn.commit()?;
        Ok(())
    }

    fn rollback(self) -> Result<()> {
        self.txn.abort()?;
        Ok(())
    }
}

impl std::fmt::Debug for RedbTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbTransaction").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, RedbStore) {
        let tmp = tempfile::tempdir().unwrap();
        let db = RedbStore::open(&tmp.path().join("docman.redb")).unwrap();
        (tmp, db)
    }

    fn rows(keys: &[&str]) -> Vec<(String, Vec<u8>)> {
        keys.iter()
            .map(|k| (k.to_string(), k.as_bytes().to_vec()))
            .collect()
    }

    fn insert(db: &RedbStore, kind: EntityKind, keys: &[&str]) {
        let mut txn = db.begin().unwrap();
        txn.insert_batch(kind, &rows(keys)).unwrap();
        txn.commit().unwrap();
    }

    #[test]
    fn rows_crud() {
        let (_tmp, db) = test_db();

        assert!(db.scan(EntityKind::Tag).unwrap().is_empty());
        assert_eq!(db.find_by_key(EntityKind::Tag, "a").unwrap(), None);

        insert(&db, EntityKind::Tag, &["b", "a"]);
        assert_eq!(
            db.find_by_key(EntityKind::Tag, "a").unwrap(),
            Some(b"a".to_vec())
        );
        assert_eq!(
            db.scan(EntityKind::Tag).unwrap(),
            vec![b"a".to_vec(), b"b".to_vec()]
        );

        let mut txn = db.begin().unwrap();
        txn.delete(EntityKind::Tag, "a").unwrap();
        txn.commit().unwrap();
        assert_eq!(db.scan(EntityKind::Tag).unwrap(), vec![b"b".to_vec()]);
    }

    #[test]
    fn kinds_are_separate_tables() {
        let (_tmp, db) = test_db();
        insert(&db, EntityKind::Tag, &["x"]);
        assert!(db.scan(EntityKind::Property).unwrap().is_empty());
        assert_eq!(db.find_by_key(EntityKind::Property, "x").unwrap(), None);
    }

    #[test]
    fn rollback_discards_writes() {
        let (_tmp, db) = test_db();
        let mut txn = db.begin().unwrap();
        txn.insert_batch(EntityKind::Tag, &rows(&["a"])).unwrap();
        txn.flush().unwrap();
        txn.rollback().unwrap();
        assert!(db.scan(EntityKind::Tag).unwrap().is_empty());
    }

    #[test]
    fn delete_all_empties_one_kind() {
        let (_tmp, db) = test_db();
        insert(&db, EntityKind::Document, &["C/n1", "C/n2"]);
        insert(&db, EntityKind::Tag, &["t"]);

        let mut txn = db.begin().unwrap();
        txn.delete_all(EntityKind::Document).unwrap();
        txn.commit().unwrap();

        assert!(db.scan(EntityKind::Document).unwrap().is_empty());
        assert_eq!(db.scan(EntityKind::Tag).unwrap().len(), 1);
    }

    #[test]
    fn batched_and_prefix_lookups() {
        let (_tmp, db) = test_db();
        insert(&db, EntityKind::Tag, &["ca", "car", "cat", "catalog", "dog"]);

        assert_eq!(
            db.find_by_keys(EntityKind::Tag, &["dog", "cow", "ca"])
                .unwrap(),
            vec![b"ca".to_vec(), b"dog".to_vec()]
        );
        assert_eq!(
            db.find_by_key_prefix(EntityKind::Tag, "cat", 10).unwrap(),
            vec![b"cat".to_vec(), b"catalog".to_vec()]
        );
        assert_eq!(
            db.find_by_key_prefix(EntityKind::Tag, "c", 2).unwrap(),
            vec![b"ca".to_vec(), b"car".to_vec()]
        );
        assert!(
            db.find_by_key_prefix(EntityKind::Tag, "z", 10)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn settings_crud() {
        let (_tmp, db) = test_db();

        assert_eq!(db.get_setting("page_size").unwrap(), None);
        assert_eq!(db.get_setting_or("page_size", "100").unwrap(), "100");

        db.set_setting("page_size", "50").unwrap();
        assert_eq!(
            db.get_setting("page_size").unwrap(),
            Some("50".to_string())
        );
        assert_eq!(db.get_setting_or("page_size", "100").unwrap(), "50");
    }

    #[test]
    fn reopen_preserves_data() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("docman.redb");

        {
            let db = RedbStore::open(&path).unwrap();
            insert(&db, EntityKind::Directory, &["sub"]);
            db.set_setting("max_batch", "10").unwrap();
        }

        {
            let db = RedbStore::open(&path).unwrap();
            assert_eq!(
                db.find_by_key(EntityKind::Directory, "sub").unwrap(),
                Some(b"sub".to_vec())
            );
            assert_eq!(
                db.get_setting("max_batch").unwrap(),
                Some("10".to_string())
            );
        }
    }
}
