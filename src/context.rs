use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{MySql, MySqlConnection, MySqlPool, Transaction};
use std::ops::DerefMut;

use crate::error::{Result, StoreError};
use crate::model::{
    BookedPeriod, ClientId, InvoiceLine, InvoiceNumber, NewReservation, ReservationId, VehicleId,
    VehiclePricing,
};
use crate::store::RentalTx;

/// MySQL transaction with the rental statements bound to it.
///
/// This struct wraps SQLx's `Transaction` and tracks whether it has been
/// consumed. If it is dropped without calling `commit()`, SQLx rolls the
/// transaction back.
///
/// # Examples
///
/// ```rust,no_run
/// use sqlx::MySqlPool;
/// use rental_transaction::{RentalTx, TransactionContext, VehicleId};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let pool = MySqlPool::connect("mysql://localhost/alquiler").await?;
/// let mut tx = TransactionContext::begin(&pool).await?;
/// let booked = tx.reservations_for_vehicle(&VehicleId::new("1234ABC")).await?;
/// println!("{} reservations", booked.len());
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```
pub struct TransactionContext<'tx> {
    tx: Option<Transaction<'tx, MySql>>,
}

impl<'tx> TransactionContext<'tx> {
    /// Begins a new transaction from the connection pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or transaction cannot be started.
    pub async fn begin(pool: &MySqlPool) -> Result<Self> {
        Ok(Self {
            tx: Some(pool.begin().await?),
        })
    }

    /// Returns a mutable reference to the underlying connection for use as an Executor.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyConsumed`] once the transaction has been
    /// committed or rolled back.
    pub fn as_executor(&mut self) -> Result<&mut MySqlConnection> {
        self.tx
            .as_mut()
            .map(DerefMut::deref_mut)
            .ok_or(StoreError::AlreadyConsumed)
    }
}

#[async_trait]
impl<'tx> RentalTx for TransactionContext<'tx> {
    async fn lock_vehicle(&mut self, vehicle: &VehicleId) -> Result<()> {
        sqlx::query("SELECT matricula FROM vehiculos WHERE matricula = ? FOR UPDATE")
            .bind(vehicle.as_str())
            .fetch_optional(self.as_executor()?)
            .await?;
        Ok(())
    }

    async fn reservations_for_vehicle(&mut self, vehicle: &VehicleId) -> Result<Vec<BookedPeriod>> {
        let rows = sqlx::query_as::<_, BookedPeriod>(
            "SELECT fecha_ini, fecha_fin FROM reservas WHERE matricula = ?",
        )
        .bind(vehicle.as_str())
        .fetch_all(self.as_executor()?)
        .await?;
        Ok(rows)
    }

    async fn insert_reservation(&mut self, reservation: &NewReservation) -> Result<ReservationId> {
        let result = sqlx::query(
            "INSERT INTO reservas (cliente, matricula, fecha_ini, fecha_fin) VALUES (?, ?, ?, ?)",
        )
        .bind(reservation.client.as_str())
        .bind(reservation.vehicle.as_str())
        .bind(reservation.start)
        .bind(reservation.end)
        .execute(self.as_executor()?)
        .await?;
        Ok(ReservationId(result.last_insert_id() as i64))
    }

    async fn vehicle_pricing(&mut self, vehicle: &VehicleId) -> Result<VehiclePricing> {
        let pricing = sqlx::query_as::<_, VehiclePricing>(
            r#"
            SELECT m.id_modelo, m.precio_cada_dia, m.capacidad_deposito,
                   m.tipo_combustible, p.precio_por_litro
            FROM vehiculos v
            JOIN modelos m ON m.id_modelo = v.id_modelo
            JOIN precio_combustible p ON p.tipo_combustible = m.tipo_combustible
            WHERE v.matricula = ?
            "#,
        )
        .bind(vehicle.as_str())
        .fetch_one(self.as_executor()?)
        .await?;
        Ok(pricing)
    }

    async fn insert_invoice(&mut self, client: &ClientId, total: Decimal) -> Result<InvoiceNumber> {
        let result = sqlx::query("INSERT INTO facturas (importe, cliente) VALUES (?, ?)")
            .bind(total)
            .bind(client.as_str())
            .execute(self.as_executor()?)
            .await?;
        Ok(InvoiceNumber(result.last_insert_id() as i64))
    }

    async fn insert_invoice_line(&mut self, line: &InvoiceLine) -> Result<()> {
        sqlx::query("INSERT INTO lineas_factura (nroFactura, concepto, importe) VALUES (?, ?, ?)")
            .bind(line.invoice.0)
            .bind(line.description.as_str())
            .bind(line.amount)
            .execute(self.as_executor()?)
            .await?;
        Ok(())
    }

    /// Commits the transaction. The context cannot be used afterwards.
    async fn commit(&mut self) -> Result<()> {
        let tx = self.tx.take().ok_or(StoreError::AlreadyConsumed)?;
        tx.commit().await?;
        Ok(())
    }

    /// Explicitly rolls back the transaction.
    ///
    /// Dropping an uncommitted context rolls back as well; this method lets the
    /// caller observe a failed rollback.
    async fn rollback(&mut self) -> Result<()> {
        let tx = self.tx.take().ok_or(StoreError::AlreadyConsumed)?;
        tx.rollback().await?;
        Ok(())
    }
}

impl<'tx> Drop for TransactionContext<'tx> {
    fn drop(&mut self) {
        // SQLx's Transaction rolls back on drop.
        if self.tx.is_some() {
            tracing::debug!("transaction dropped without commit, rolling back");
        }
    }
}
