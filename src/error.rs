use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed record on line {line}: {source}")]
    MalformedInput {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("record on line {line} is missing required field `{field}`")]
    MissingField { line: usize, field: &'static str },

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

    #[error("stored metadata is corrupt: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error(
        "collection '{collection}' was built with embedder '{stored}', not '{requested}'"
    )]
    EmbedderMismatch {
        collection: String,
        stored: String,
        requested: String,
    },

    #[error("duplicate id '{id}' in a single add to collection '{collection}'")]
    DuplicateId { collection: String, id: String },

    #[error("invalid batch: {0}")]
    InvalidBatch(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("data directory does not exist and could not be created: {0}")]
    DataDir(PathBuf),
}
