//! The seam between the rental logic and whatever stores its rows.
//!
//! [`RentalStore`] hands out transactions and answers the one question that
//! must be asked outside of them. [`RentalTx`] is a single open transaction;
//! every write goes through it and nothing is visible to others until
//! [`RentalTx::commit`].

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::Result;
use crate::model::{
    BookedPeriod, ClientId, InvoiceLine, InvoiceNumber, NewReservation, ReservationId, VehicleId,
    VehiclePricing,
};

#[async_trait]
pub trait RentalStore: Send + Sync {
    /// Begins a new transaction.
    async fn begin(&self) -> Result<Box<dyn RentalTx>>;

    /// Whether a client row exists. Runs outside any rental transaction.
    async fn client_exists(&self, client: &ClientId) -> Result<bool>;
}

#[async_trait]
pub trait RentalTx: Send {
    /// Locks the vehicle row until the transaction ends.
    async fn lock_vehicle(&mut self, vehicle: &VehicleId) -> Result<()>;

    /// Every reservation held for the vehicle.
    async fn reservations_for_vehicle(&mut self, vehicle: &VehicleId) -> Result<Vec<BookedPeriod>>;

    /// Inserts a reservation under a freshly generated id.
    ///
    /// Fails with [`StoreError::ForeignKeyViolation`](crate::StoreError::ForeignKeyViolation)
    /// when the client or the vehicle does not exist.
    async fn insert_reservation(&mut self, reservation: &NewReservation) -> Result<ReservationId>;

    async fn vehicle_pricing(&mut self, vehicle: &VehicleId) -> Result<VehiclePricing>;

    async fn insert_invoice(&mut self, client: &ClientId, total: Decimal) -> Result<InvoiceNumber>;

    async fn insert_invoice_line(&mut self, line: &InvoiceLine) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;
}
