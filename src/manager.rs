//! The public entry point: one store, one lock, every operation.

use std::path::Path;

use chrono::NaiveDate;
use parking_lot::Mutex;

use crate::{
    config::ManagerConfig,
    data_dir::DataDir,
    error::Result,
    filter::DocumentFilter,
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
    persist::{self, PersistSummary},
    redb_store::RedbStore,
    schema::{Entity, decode_all, encode_rows},
    search::{self, DocumentSearchResult},
    store::Store,
    sync::{self, Snapshot, SyncSummary},
};

/// Owns a [`Store`] and serializes every operation on it.
///
/// Each method holds the lock for its whole duration, so concurrent callers
/// run one after another.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use docman::{
///     DatabaseManager, Document, MemoryStore,
///     filter::{DocumentFilter, TagFilter},
/// };
///
/// let manager = DatabaseManager::new(MemoryStore::new());
/// let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// manager
///     .persist_documents(&[Document::new("n1", "C/n1", date).with_tag("t1")])
///     .unwrap();
///
/// let filter = DocumentFilter::new().with(TagFilter::new(["t1"]));
/// let results = manager.search(&filter, 0).unwrap();
/// assert_eq!(results[0].document.filename(), "n1");
/// ```
#[derive(Debug)]
pub struct DatabaseManager<S: Store> {
    store: Mutex<S>,
    config: ManagerConfig,
}

impl DatabaseManager<RedbStore> {
    /// Open (or create) the redb store at `path`, reading limits from its
    /// settings table.
    pub fn open(path: &Path) -> Result<Self> {
        let store = RedbStore::open(path)?;
        let config = ManagerConfig::from_settings(&store)?;
        Ok(Self::with_config(store, config))
    }

    /// Open the store inside a resolved data directory.
    pub fn open_in(data_dir: &DataDir) -> Result<Self> {
        Self::open(&data_dir.store_db())
    }
}

fn find<S: Store, E: Entity>(store: &S, key: &str) -> Result<Option<E>> {
    store
        .find_by_key(E::KIND, key)?
        .map(|row| E::decode(&row))
        .transpose()
}

fn all<S: Store, E: Entity>(store: &S) -> Result<Vec<E>> {
    decode_all(store.scan(E::KIND)?)
}

/// Add `value` to `property`, creating either as needed.
fn create_property_value_set<S: Store>(
    store: &S,
    property: &str,
    value: &str,
    max_batch: usize,
) -> Result<PropertyValueSet> {
    let value = PropertyValue::new(value);
    persist::persist_property_values(
        store,
        std::slice::from_ref(&value),
        max_batch,
    )?;

    match find::<S, Property>(store, property)? {
        Some(mut stored) => {
            if stored.add_value(value.clone()) {
                let rows = encode_rows(std::slice::from_ref(&stored))?;
                persist::write_rows(store, Property::KIND, &rows, max_batch)?;
            }
        }
        None => {
            let mut created = Property::new(property);
            created.add_value(value.clone());
            persist::persist_properties(store, &[created], max_batch)?;
        }
    }
    Ok(PropertyValueSet::new(property, value.value))
}

impl<S: Store> DatabaseManager<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, ManagerConfig::default())
    }

    pub fn with_config(store: S, config: ManagerConfig) -> Self {
        Self {
            store: Mutex::new(store),
            config,
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn into_store(self) -> S {
        self.store.into_inner()
    }

    // -- Lookups --

    pub fn tag(&self, name: &str) -> Result<Option<Tag>> {
        find(&*self.store.lock(), name)
    }

    pub fn tag_exists(&self, name: &str) -> Result<bool> {
        Ok(self.tag(name)?.is_some())
    }

    pub fn property(&self, name: &str) -> Result<Option<Property>> {
        find(&*self.store.lock(), name)
    }

    pub fn property_exists(&self, name: &str) -> Result<bool> {
        Ok(self.property(name)?.is_some())
    }

    pub fn property_value(&self, value: &str) -> Result<Option<PropertyValue>> {
        find(&*self.store.lock(), value)
    }

    pub fn property_value_exists(&self, value: &str) -> Result<bool> {
        Ok(self.property_value(value)?.is_some())
    }

    pub fn document(&self, absolute_path: &str) -> Result<Option<Document>> {
        find(&*self.store.lock(), absolute_path)
    }

    pub fn directory(&self, path: &str) -> Result<Option<DirectoryRecord>> {
        find(&*self.store.lock(), path)
    }

    pub fn database_info(&self) -> Result<Option<DatabaseInfo>> {
        find(&*self.store.lock(), DatabaseInfo::KEY)
    }

    /// The stored versions of whichever `entities` already exist.
    pub fn existing<E: Entity>(&self, entities: &[E]) -> Result<Vec<E>> {
        persist::find_existing(
            &*self.store.lock(),
            entities,
            self.config.max_batch,
        )
    }

    // -- Listing --

    pub fn all_tags(&self) -> Result<Vec<Tag>> {
        all(&*self.store.lock())
    }

    pub fn all_properties(&self) -> Result<Vec<Property>> {
        all(&*self.store.lock())
    }

    pub fn all_property_values(&self) -> Result<Vec<PropertyValue>> {
        all(&*self.store.lock())
    }

    pub fn all_documents(&self) -> Result<Vec<Document>> {
        all(&*self.store.lock())
    }

    pub fn all_directories(&self) -> Result<Vec<DirectoryRecord>> {
        all(&*self.store.lock())
    }

    // -- Autocomplete --

    /// Tags whose name starts with `prefix`, capped at the fuzzy limit.
    pub fn tags_like(&self, prefix: &str) -> Result<Vec<Tag>> {
        self.like(prefix)
    }

    pub fn properties_like(&self, prefix: &str) -> Result<Vec<Property>> {
        self.like(prefix)
    }

    pub fn property_values_like(
        &self,
        prefix: &str,
    ) -> Result<Vec<PropertyValue>> {
        self.like(prefix)
    }

    fn like<E: Entity>(&self, prefix: &str) -> Result<Vec<E>> {
        let rows = self.store.lock().find_by_key_prefix(
            E::KIND,
            prefix,
            self.config.fuzzy_limit,
        )?;
        decode_all(rows)
    }

    // -- Search --

    /// One page of documents matching `filter`, best matches first.
    pub fn search(
        &self,
        filter: &DocumentFilter,
        offset: usize,
    ) -> Result<Vec<DocumentSearchResult>> {
        search::search(
            &*self.store.lock(),
            filter,
            offset,
            self.config.page_size,
        )
    }

    /// Like [`search`](Self::search), without the scores.
    pub fn documents_by(
        &self,
        filter: &DocumentFilter,
        offset: usize,
    ) -> Result<Vec<Document>> {
        Ok(self
            .search(filter, offset)?
            .into_iter()
            .map(|r| r.document)
            .collect())
    }

    pub fn count_documents_by(&self, filter: &DocumentFilter) -> Result<u64> {
        search::count(&*self.store.lock(), filter)
    }

    // -- Persistence --

    pub fn persist_tags(&self, tags: &[Tag]) -> Result<usize> {
        persist::persist_tags(&*self.store.lock(), tags, self.config.max_batch)
    }

    pub fn persist_properties(&self, properties: &[Property]) -> Result<usize> {
        persist::persist_properties(
            &*self.store.lock(),
            properties,
            self.config.max_batch,
        )
    }

    pub fn persist_property_values(
        &self,
        values: &[PropertyValue],
    ) -> Result<usize> {
        persist::persist_property_values(
            &*self.store.lock(),
            values,
            self.config.max_batch,
        )
    }

    pub fn persist_property_value_sets(
        &self,
        sets: &[PropertyValueSet],
    ) -> Result<usize> {
        persist::persist_property_value_sets(
            &*self.store.lock(),
            sets,
            self.config.max_batch,
        )
    }

    pub fn persist_documents(&self, documents: &[Document]) -> Result<usize> {
        persist::persist_documents(
            &*self.store.lock(),
            documents,
            self.config.max_batch,
        )
    }

    /// Returns whether the document was new.
    pub fn persist_document(&self, document: &Document) -> Result<bool> {
        Ok(self.persist_documents(std::slice::from_ref(document))? > 0)
    }

    pub fn persist_directories(
        &self,
        directories: &[DirectoryRecord],
    ) -> Result<usize> {
        persist::persist_directories(
            &*self.store.lock(),
            directories,
            self.config.max_batch,
        )
    }

    pub fn persist_database_info(&self, info: &DatabaseInfo) -> Result<()> {
        persist::persist_database_info(&*self.store.lock(), info)
    }

    pub fn persist_directory(
        &self,
        root: &Directory,
        source_path: &str,
    ) -> Result<PersistSummary> {
        persist::persist_directory(
            &*self.store.lock(),
            root,
            source_path,
            self.config.max_batch,
        )
    }

    // -- Creation --

    pub fn create_tag(&self, name: &str) -> Result<Tag> {
        let tag = Tag::new(name);
        self.persist_tags(std::slice::from_ref(&tag))?;
        Ok(tag)
    }

    pub fn create_property(&self, name: &str) -> Result<Property> {
        let property = Property::new(name);
        self.persist_properties(std::slice::from_ref(&property))?;
        Ok(property)
    }

    /// Store `value` and attach it to `property`, creating both if needed.
    pub fn create_property_value_set(
        &self,
        property: &str,
        value: &str,
    ) -> Result<PropertyValueSet> {
        create_property_value_set(
            &*self.store.lock(),
            property,
            value,
            self.config.max_batch,
        )
    }

    /// Build a document and store it along with any missing tags,
    /// properties and values.
    pub fn create_document<I, K, V>(
        &self,
        filename: &str,
        path: &str,
        properties: I,
        creation_date: NaiveDate,
        tag_names: &[&str],
    ) -> Result<Document>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let store = self.store.lock();
        let max_batch = self.config.max_batch;

        let mut document = Document::new(filename, path, creation_date)
            .with_tags(tag_names.iter().copied());
        for (property, value) in properties {
            let set = create_property_value_set(
                &*store,
                property.as_ref(),
                value.as_ref(),
                max_batch,
            )?;
            document = document.with_property(set.property, set.value);
        }

        persist::persist_documents(
            &*store,
            std::slice::from_ref(&document),
            max_batch,
        )?;
        Ok(document)
    }

    // -- Synchronization --

    pub fn documents_not_in(&self, root: &Directory) -> Result<usize> {
        sync::documents_not_in(&*self.store.lock(), root, self.config.max_batch)
    }

    pub fn directories_not_in(&self, root: &Directory) -> Result<usize> {
        sync::directories_not_in(
            &*self.store.lock(),
            root,
            self.config.max_batch,
        )
    }

    /// Make the stored documents and directories mirror `root`. Destructive.
    pub fn synchronize(&self, root: &Directory) -> Result<SyncSummary> {
        sync::synchronize(&*self.store.lock(), root, self.config.max_batch)
    }

    pub fn synchronize_with_source(
        &self,
        root: &Directory,
        source_path: &str,
    ) -> Result<SyncSummary> {
        sync::synchronize_with_source(
            &*self.store.lock(),
            root,
            source_path,
            self.config.max_batch,
        )
    }

    /// Merge everything stored here into `other`.
    pub fn copy_to<T: Store>(&self, other: &DatabaseManager<T>) -> Result<()> {
        let snapshot = {
            let store = self.store.lock();
            Snapshot::read(&*store)?
        };
        snapshot.write_to(&*other.store.lock(), other.config.max_batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryStore;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 3, 3).unwrap()
    }

    fn manager() -> DatabaseManager<MemoryStore> {
        DatabaseManager::new(MemoryStore::new())
    }

    #[test]
    fn create_and_look_up() {
        let m = manager();
        m.create_tag("holiday").unwrap();
        m.create_property("author").unwrap();

        assert!(m.tag_exists("holiday").unwrap());
        assert!(!m.tag_exists("work").unwrap());
        assert!(m.property_exists("author").unwrap());
        assert!(m.property("author").unwrap().unwrap().values().is_empty());
    }

    #[test]
    fn property_value_sets_accumulate_values() {
        let m = manager();
        m.create_property_value_set("author", "ada").unwrap();
        m.create_property_value_set("author", "alan").unwrap();
        m.create_property_value_set("author", "ada").unwrap();

        let author = m.property("author").unwrap().unwrap();
        assert_eq!(author.values().len(), 2);
        assert!(m.property_value_exists("alan").unwrap());
    }

    #[test]
    fn create_document_creates_dependencies() {
        let m = manager();
        let doc = m
            .create_document(
                "n1",
                "C/n1",
                [("author", "ada"), ("author", "alan")],
                date(),
                &["t1", "t2"],
            )
            .unwrap();

        assert_eq!(doc.properties().len(), 2);
        assert_eq!(m.document("C/n1").unwrap(), Some(doc));
        assert_eq!(m.all_tags().unwrap().len(), 2);
        assert_eq!(m.all_property_values().unwrap().len(), 2);
        assert_eq!(
            m.property("author").unwrap().unwrap().values().len(),
            2
        );
    }

    #[test]
    fn prefix_lookups_respect_limit() {
        let m = DatabaseManager::with_config(
            MemoryStore::new(),
            ManagerConfig {
                fuzzy_limit: 2,
                ..ManagerConfig::default()
            },
        );
        for name in ["cat", "car", "cab", "dog"] {
            m.create_tag(name).unwrap();
        }
        let found = m.tags_like("ca").unwrap();
        assert_eq!(found, vec![Tag::new("cab"), Tag::new("car")]);
        assert!(m.properties_like("x").unwrap().is_empty());
        assert!(m.property_values_like("x").unwrap().is_empty());
    }

    #[test]
    fn persist_document_reports_novelty() {
        let m = manager();
        let doc = Document::new("n1", "C/n1", date());
        assert!(m.persist_document(&doc).unwrap());
        assert!(!m.persist_document(&doc).unwrap());
        assert_eq!(m.existing(&[doc.clone()]).unwrap(), vec![doc]);
    }

    #[test]
    fn database_info_round_trip() {
        let m = manager();
        assert_eq!(m.database_info().unwrap(), None);
        m.persist_database_info(&DatabaseInfo::new("/data")).unwrap();
        assert_eq!(
            m.database_info().unwrap(),
            Some(DatabaseInfo::new("/data"))
        );
    }

    #[test]
    fn copy_to_self_type_does_not_deadlock() {
        let a = manager();
        let b = manager();
        a.create_tag("t").unwrap();
        a.copy_to(&b).unwrap();
        b.copy_to(&a).unwrap();
        assert_eq!(b.all_tags().unwrap(), vec![Tag::new("t")]);
    }

    #[test]
    fn manager_is_shareable_across_threads() {
        let m = std::sync::Arc::new(manager());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let m = m.clone();
                std::thread::spawn(move || {
                    m.create_tag(&format!("t{i}")).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(m.all_tags().unwrap().len(), 4);
    }
}
