use chrono::NaiveDate;
use thiserror::Error;

/// Failures of the aggregate store. None of them is fatal for tracking, callers log them and keep
/// going with what they have.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record store is unavailable: {0}")]
    Unavailable(#[source] std::io::Error),

    #[error("Failed to write record for {day}: {source}")]
    WriteFailed {
        day: NaiveDate,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read records: {0}")]
    ReadFailed(#[source] std::io::Error),

    #[error("Record for {day} is corrupted: {source}")]
    Corrupted {
        day: NaiveDate,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode record for {day}: {source}")]
    Encoding {
        day: NaiveDate,
        #[source]
        source: serde_json::Error,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;
