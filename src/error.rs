use std::path::PathBuf;

use crate::schema::EntityKind;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Redb(#[from] redb::Error),

    #[error("database open error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("database storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("database transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("database table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("database commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("record encoding error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("data directory does not exist and could not be created: {0}")]
    DataDir(PathBuf),

    /// The existence check before a bulk write failed; nothing was written.
    #[error("lookup of existing {kind} records failed: {source}")]
    Lookup {
        kind: EntityKind,
        #[source]
        source: Box<Error>,
    },

    /// A bulk write failed after the transaction was rolled back.
    #[error("writing {kind} records failed: {source}")]
    Write {
        kind: EntityKind,
        #[source]
        source: Box<Error>,
    },

    #[error("store error: {0}")]
    Store(String),
}

impl Error {
    pub(crate) fn lookup(kind: EntityKind, source: Error) -> Self {
        Self::Lookup {
            kind,
            source: Box::new(source),
        }
    }

    pub(crate) fn write(kind: EntityKind, source: Error) -> Self {
        Self::Write {
            kind,
            source: Box::new(source),
        }
    }
}
