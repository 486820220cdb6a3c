//! docman - a metadata manager for large file collections.
//!
//! docman stores tags, key/value properties, creation dates and the
//! directory hierarchy of scanned files, and answers ranked queries over
//! them. Writes go through bulk reconciliation: every batch is diffed
//! against the store with sorted-merge set algebra and only the missing rows
//! are inserted, in one transaction per record kind.
//!
//! # Quick start
//!
//! ```no_run
//! use docman::{DataDir, DatabaseManager, scanner};
//! use docman::filter::{DocumentFilter, FilenameFilter};
//!
//! let data_dir = DataDir::resolve(None).unwrap();
//! let manager = DatabaseManager::open_in(&data_dir).unwrap();
//!
//! let tree = scanner::scan("/srv/files".as_ref()).unwrap();
//! manager.synchronize_with_source(&tree, "/srv/files").unwrap();
//!
//! let filter = DocumentFilter::new().with(FilenameFilter::containing("report"));
//! for r in manager.search(&filter, 0).unwrap() {
//!     println!("{} (accuracy: {})", r.document.absolute_path(), r.accuracy);
//! }
//! ```

pub mod config;
pub mod data_dir;
pub mod error;
pub mod filter;
pub mod logging;
pub mod manager;
pub mod memory_store;
pub mod model;
pub mod persist;
pub mod query;
pub mod redb_store;
pub mod scanner;
pub mod schema;
pub mod search;
pub mod set_ops;
pub mod store;
pub mod sync;
pub mod tree;

pub use config::ManagerConfig;
pub use data_dir::DataDir;
pub use error::{Error, Result};
pub use manager::DatabaseManager;
pub use memory_store::MemoryStore;
pub use model::{
    DatabaseInfo,
    Directory,
    DirectoryRecord,
    Document,
    Property,
    PropertyValue,
    PropertyValueSet,
    Tag,
};
pub use redb_store::RedbStore;
pub use search::DocumentSearchResult;
pub use store::{Store, StoreTransaction};
