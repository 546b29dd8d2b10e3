//! # rental-transaction
//!
//! Vehicle rental as a single database transaction on SQLx, with automatic rollback.
//!
//! ## Features
//!
//! - **One Transaction Per Rental**: the reservation, the invoice and both invoice lines commit together or not at all
//! - **Availability Check**: inclusive interval overlap against every reservation of the vehicle
//! - **Exact Money**: charges are computed with `rust_decimal`, never floating point
//! - **Tagged Errors**: callers match on [`RentalError`] instead of inspecting database error codes
//! - **Pluggable Store**: MySQL in production, [`InMemoryStore`] in tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chrono::NaiveDate;
//! use rental_transaction::{MySqlRentalStore, RentalRequest, RentalService};
//! use sqlx::MySqlPool;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = MySqlPool::connect("mysql://localhost/alquiler").await?;
//! let service = RentalService::new(MySqlRentalStore::new(pool));
//!
//! let start = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
//! let end = NaiveDate::from_ymd_opt(2024, 1, 13).unwrap();
//! let rental = service
//!     .rent(RentalRequest::new("12345678A", "1234ABC", start, Some(end)))
//!     .await?;
//!
//! println!("invoice {} total {}", rental.invoice, rental.charges.total);
//! # Ok(())
//! # }
//! ```
//!
//! ## Default Duration
//!
//! Without an end date a rental lasts [`DEFAULT_RENTAL_DAYS`] days. Stored
//! reservations without an end date are treated the same way when checking
//! availability.
//!
//! ## Error Handling
//!
//! ```rust,no_run
//! use chrono::NaiveDate;
//! use rental_transaction::{InMemoryStore, RentalError, RentalRequest, RentalService};
//!
//! # async fn example() {
//! let service = RentalService::new(InMemoryStore::new().with_vehicle("1234ABC", 1));
//! let start = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
//!
//! match service.rent(RentalRequest::new("00000000X", "1234ABC", start, None)).await {
//!     Ok(_) => unreachable!(),
//!     Err(RentalError::NoDays) => println!("pick a later end date"),
//!     Err(RentalError::VehicleBusy(v)) => println!("{v} is taken"),
//!     Err(RentalError::ClientNotFound(c)) => println!("no client {c}"),
//!     Err(RentalError::VehicleNotFound(v)) => println!("no vehicle {v}"),
//!     Err(RentalError::Storage(e)) => eprintln!("database trouble: {e}"),
//! }
//! # }
//! ```
//!
//! ## How It Works
//!
//! 1. **RentalPeriod**: resolves the end date and rejects rentals shorter than a day before any I/O
//! 2. **with_transaction**: begins, runs the booking steps, commits, or rolls back exactly once
//! 3. **RentalTx**: the statements of a rental, implemented by [`TransactionContext`] for MySQL
//! 4. **Error Translation**: a foreign-key violation becomes `ClientNotFound` or `VehicleNotFound`
//!    after a lookup of the client
//!
//! ## Limitations
//!
//! - Only MySQL is supported as a real database
//! - The availability check does not lock anything unless [`RentalOptions::lock_vehicle`] is set;
//!   two concurrent rentals of the same vehicle can otherwise both succeed

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod memory;
pub mod model;
pub mod mysql;
pub mod service;
pub mod store;

pub use config::{Config, DatabaseConfig};
pub use context::TransactionContext;
pub use error::{ConfigError, RentalError, Result, StoreError};
pub use executor::with_transaction;
pub use memory::{InMemoryStore, StoreStats};
pub use model::{
    BookedPeriod, ClientId, Invoice, InvoiceLine, InvoiceNumber, NewReservation, Rental,
    RentalCharges, RentalPeriod, RentalRequest, Reservation, ReservationId, VehicleId,
    VehiclePricing, DEFAULT_RENTAL_DAYS,
};
pub use mysql::MySqlRentalStore;
pub use service::{RentalOptions, RentalService};
pub use store::{RentalStore, RentalTx};

/// Convenience re-exports for common use cases
pub mod prelude {
    pub use crate::error::{RentalError, StoreError};
    pub use crate::model::{ClientId, Rental, RentalRequest, VehicleId};
    pub use crate::service::{RentalOptions, RentalService};
    pub use crate::store::{RentalStore, RentalTx};
}
