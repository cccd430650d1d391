use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Failures raised by account and invite stores.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("concurrent update conflict on {0}")]
    Conflict(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("duplicate {entity}: {detail}")]
    Duplicate { entity: &'static str, detail: String },

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[cfg(feature = "database")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Unavailable(_)
            | StoreError::Timeout(_)
            | StoreError::Conflict(_) => true,
            StoreError::NotFound { .. }
            | StoreError::Duplicate { .. }
            | StoreError::Corrupt(_) => false,
            #[cfg(feature = "database")]
            StoreError::Database(err) => matches!(
                err,
                sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::Io(_)
                    | sqlx::Error::WorkerCrashed
            ),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Run a store call under `limit`, mapping expiry to [`StoreError::Timeout`].
///
/// The inner future is dropped on expiry, which rolls back any open
/// transaction it holds.
pub async fn bounded<T, F>(limit: Duration, call: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}
