//! Durable-log error types.

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to open database: {0}")]
    Open(#[from] redb::DatabaseError),
    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),
    #[error("table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("failed to encode persisted state: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("failed to decode persisted state: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("a pending batch for tick {existing} already exists; cannot begin tick {requested}")]
    BatchConflict { existing: u64, requested: u64 },
    #[error("no pending batch to {0}")]
    NoPendingBatch(&'static str),
}

pub type Result<T> = std::result::Result<T, StoreError>;
