//! The persistence boundary.
//!
//! A [`Store`] knows nothing about record types. It holds encoded rows
//! grouped by [`EntityKind`] and keyed by the record's natural key, answers
//! key and prefix lookups, and evaluates composed document [`Query`]s. All
//! writes go through a [`StoreTransaction`].

use crate::{
    error::Result,
    model::Document,
    query::Query,
    schema::{Entity, EntityKind},
};

pub trait Store {
    type Transaction<'a>: StoreTransaction
    where
        Self: 'a;

    fn find_by_key(&self, kind: EntityKind, key: &str)
    -> Result<Option<Vec<u8>>>;

    /// Rows for every key that exists, in key order. Missing keys are
    /// skipped.
    fn find_by_keys(
        &self,
        kind: EntityKind,
        keys: &[&str],
    ) -> Result<Vec<Vec<u8>>> {
        let mut keys = keys.to_vec();
        keys.sort_unstable();
        keys.dedup();

        let mut rows = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(row) = self.find_by_key(kind, key)? {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    /// Every row of `kind`, in key order.
    fn scan(&self, kind: EntityKind) -> Result<Vec<Vec<u8>>>;

    /// At most `limit` rows whose key starts with `prefix`, in key order.
    fn find_by_key_prefix(
        &self,
        kind: EntityKind,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<Vec<u8>>>;

    /// Documents matching `query`, in key order, skipping the first `offset`
    /// matches and returning at most `limit`.
    fn query_documents(
        &self,
        query: &Query,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Document>> {
        let matcher = query.matcher()?;
        let mut found = Vec::new();
        for row in self.scan(EntityKind::Document)? {
            let doc = Document::decode(&row)?;
            if matcher.matches(&doc) {
                found.push(doc);
            }
        }
        Ok(found.into_iter().skip(offset).take(limit).collect())
    }

    fn count_documents(&self, query: &Query) -> Result<u64> {
        let matcher = query.matcher()?;
        let mut count = 0;
        for row in self.scan(EntityKind::Document)? {
            if matcher.matches(&Document::decode(&row)?) {
                count += 1;
            }
        }
        Ok(count)
    }

    fn begin(&self) -> Result<Self::Transaction<'_>>;
}

/// A unit of writes. Nothing is visible to readers until [`commit`].
///
/// Dropping a transaction without committing discards it.
///
/// [`commit`]: StoreTransaction::commit
pub trait StoreTransaction {
    /// Insert or replace rows of one kind.
    fn insert_batch(
        &mut self,
        kind: EntityKind,
        rows: &[(String, Vec<u8>)],
    ) -> Result<()>;

    fn delete(&mut self, kind: EntityKind, key: &str) -> Result<()>;

    fn delete_all(&mut self, kind: EntityKind) -> Result<()>;

    /// Push staged writes down to the store without committing.
    fn flush(&mut self) -> Result<()>;

    fn commit(self) -> Result<()>;

    fn rollback(self) -> Result<()>;
}
