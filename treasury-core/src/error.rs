//! Error types for the treasury ledger

use thiserror::Error;

/// Result type for treasury operations
pub type Result<T> = std::result::Result<T, Error>;

/// Treasury errors
#[derive(Error, Debug)]
pub enum Error {
    /// Zero, negative, or malformed magnitude
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// More fractional digits than the stored representation supports
    #[error("Precision error: {0}")]
    Precision(String),

    /// Division by zero in money arithmetic
    #[error("Division by zero")]
    DivisionByZero,

    /// Transaction not found
    #[error("Transaction not found: {0}")]
    NotFound(String),

    /// Transaction already consolidated; consolidated facts are immutable
    #[error("Transaction {0} is consolidated and can no longer be reverted")]
    AlreadyConsolidated(String),

    /// Transaction already reverted; no double reversal
    #[error("Transaction {0} has already been reverted")]
    AlreadyReverted(String),

    /// No in-flight transactions match the period being consolidated
    #[error("Nothing to consolidate for period {0}: no in-flight transactions")]
    NothingToConsolidate(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
