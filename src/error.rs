use crate::model::{ClientId, VehicleId};

/// Error types for the storage layer underneath a rental
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database error from SQLx
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    /// An insert referenced a row that does not exist
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation {
        constraint: Option<String>,
        message: String,
    },

    /// Another open transaction holds the lock on the vehicle
    #[error("Vehicle {0} is locked by another transaction")]
    LockUnavailable(VehicleId),

    /// Transaction has already been consumed (committed or rolled back)
    #[error("Transaction has already been consumed")]
    AlreadyConsumed,
}

impl StoreError {
    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(self, StoreError::ForeignKeyViolation { .. })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_foreign_key_violation() {
                return StoreError::ForeignKeyViolation {
                    constraint: db.constraint().map(str::to_owned),
                    message: db.message().to_owned(),
                };
            }
        }
        StoreError::Database(err)
    }
}

/// Outcome of a failed rental.
///
/// `NoDays` and `VehicleBusy` are raised before anything is written.
/// `ClientNotFound` and `VehicleNotFound` are derived from a foreign-key
/// violation on insert. Everything else is `Storage`.
#[derive(Debug, thiserror::Error)]
pub enum RentalError {
    #[error("rental period must cover at least one day")]
    NoDays,

    #[error("vehicle {0} is already reserved for the requested dates")]
    VehicleBusy(VehicleId),

    #[error("client {0} does not exist")]
    ClientNotFound(ClientId),

    #[error("vehicle {0} does not exist")]
    VehicleNotFound(VehicleId),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl From<sqlx::Error> for RentalError {
    fn from(err: sqlx::Error) -> Self {
        RentalError::Storage(err.into())
    }
}

/// Errors raised while reading configuration from the environment
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    Missing(&'static str),

    #[error("environment variable {name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Result type alias for storage operations
pub type Result<T> = std::result::Result<T, StoreError>;
