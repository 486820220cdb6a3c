use crate::{
    error::{Error, Result},
    redb_store::RedbStore,
};

/// Largest number of keys sent to the store in one lookup or insert.
pub const MAX_BATCH: usize = 999;
/// Documents returned by one [`crate::search::search`] page.
pub const PAGE_SIZE: usize = 100;
/// Cap on prefix lookups used for autocomplete.
pub const FUZZY_SEARCH_LIMIT: usize = 25;

const MAX_BATCH_KEY: &str = "max_batch";
const PAGE_SIZE_KEY: &str = "page_size";
const FUZZY_LIMIT_KEY: &str = "fuzzy_limit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerConfig {
    pub max_batch: usize,
    pub page_size: usize,
    pub fuzzy_limit: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_batch: MAX_BATCH,
            page_size: PAGE_SIZE,
            fuzzy_limit: FUZZY_SEARCH_LIMIT,
        }
    }
}

impl ManagerConfig {
    /// Defaults overridden by whatever the store's settings table holds.
    pub fn from_settings(store: &RedbStore) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            max_batch: read_setting(store, MAX_BATCH_KEY, defaults.max_batch)?,
            page_size: read_setting(store, PAGE_SIZE_KEY, defaults.page_size)?,
            fuzzy_limit: read_setting(
                store,
                FUZZY_LIMIT_KEY,
                defaults.fuzzy_limit,
            )?,
        })
    }

    /// Write this configuration into the store's settings table.
    pub fn save(&self, store: &RedbStore) -> Result<()> {
        store.set_setting(MAX_BATCH_KEY, &self.max_batch.to_string())?;
        store.set_setting(PAGE_SIZE_KEY, &self.page_size.to_string())?;
        store.set_setting(FUZZY_LIMIT_KEY, &self.fuzzy_limit.to_string())?;
        Ok(())
    }
}

fn read_setting(store: &RedbStore, key: &str, default: usize) -> Result<usize> {
    let Some(raw) = store.get_setting(key)? else {
        return Ok(default);
    };
    match raw.trim().parse::<usize>() {
        Ok(0) => Err(Error::Config(format!("{key} must be greater than zero"))),
        Ok(n) => Ok(n),
        Err(e) => Err(Error::Config(format!("{key} = {raw:?}: {e}"))),
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

    #[test]
    fn defaults_when_unset() {
        let (_tmp, db) = test_db();
        let config = ManagerConfig::from_settings(&db).unwrap();
        assert_eq!(config, ManagerConfig::default());
        assert_eq!(config.max_batch, 999);
        assert_eq!(config.page_size, 100);
        assert_eq!(config.fuzzy_limit, 25);
    }

    #[test]
    fn settings_override_defaults() {
        let (_tmp, db) = test_db();
        db.set_setting("page_size", "20").unwrap();
        let config = ManagerConfig::from_settings(&db).unwrap();
        assert_eq!(config.page_size, 20);
        assert_eq!(config.max_batch, MAX_BATCH);
    }

    #[test]
    fn save_then_load() {
        let (_tmp, db) = test_db();
        let config = ManagerConfig {
            max_batch: 3,
            page_size: 7,
            fuzzy_limit: 5,
        };
        config.save(&db).unwrap();
        assert_eq!(ManagerConfig::from_settings(&db).unwrap(), config);
    }

    #[test]
    fn bad_values_are_config_errors() {
        let (_tmp, db) = test_db();
        db.set_setting("max_batch", "lots").unwrap();
        assert!(matches!(
            ManagerConfig::from_settings(&db),
            Err(Error::Config(_))
        ));

        db.set_setting("max_batch", "0").unwrap();
        assert!(matches!(
            ManagerConfig::from_settings(&db),
            Err(Error::Config(_))
        ));
    }
}
