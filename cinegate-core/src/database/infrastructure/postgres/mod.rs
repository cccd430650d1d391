//! `sqlx` Postgres stores. Schema lives in `cinegate-core/migrations` and is
//! applied with [`crate::MIGRATOR`].

pub mod accounts;
pub mod invites;

pub use accounts::PostgresAccountStore;
pub use invites::PostgresInviteStore;

use crate::error::StoreError;

/// Postgres SQLSTATEs that mean "the transaction lost a race, try again".
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

/// Map a driver error onto the store taxonomy.
pub(crate) fn classify(err: sqlx::Error) -> StoreError {
    if let Some(db) = err.as_database_error() {
        let code = db.code();
        if matches!(
            code.as_deref(),
            Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED)
        ) {
            return StoreError::Conflict(db.message().to_string());
        }
    }
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            StoreError::Unavailable(err.to_string())
        }
        other => StoreError::Database(other),
    }
}

pub(crate) fn to_db_count(
    value: u32,
    column: &str,
) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| {
        StoreError::Corrupt(format!("{column} out of range: {value}"))
    })
}

pub(crate) fn from_db_count(
    value: i32,
    column: &str,
) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| {
        StoreError::Corrupt(format!("{column} is negative: {value}"))
    })
}
