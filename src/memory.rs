//! In-memory [`RentalStore`] for tests and local experiments.
//!
//! Reference tables are seeded with the `with_*` builders. Writes made in a
//! transaction are staged and only become visible to other transactions on
//! commit. Foreign keys are enforced the way the relational schema does it,
//! and id sequences advance even when the transaction rolls back.
//!
//! [`RentalTx::lock_vehicle`] is exclusive per vehicle: while one open
//! transaction holds the lock, another fails with
//! [`StoreError::LockUnavailable`] instead of waiting. Locks are released on
//! commit, rollback or drop.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Result, StoreError};
use crate::model::{
    BookedPeriod, ClientId, Invoice, InvoiceLine, InvoiceNumber, NewReservation, Reservation,
    ReservationId, VehicleId, VehiclePricing,
};
use crate::store::{RentalStore, RentalTx};

/// Transaction counters, for asserting on commit and rollback behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub begun: usize,
    pub commits: usize,
    pub rollbacks: usize,
}

#[derive(Debug, Clone)]
struct ModelRow {
    price_per_day: Decimal,
    tank_capacity: i32,
    fuel_type: String,
}

#[derive(Debug, Default)]
struct Tables {
    clients: HashSet<ClientId>,
    vehicles: HashMap<VehicleId, i32>,
    models: HashMap<i32, ModelRow>,
    fuel_prices: HashMap<String, Decimal>,
    reservations: Vec<Reservation>,
    invoices: Vec<Invoice>,
    invoice_lines: Vec<InvoiceLine>,
    reservation_seq: i64,
    invoice_seq: i64,
    locked_vehicles: HashSet<VehicleId>,
    stats: StoreStats,
}

fn lock(tables: &Mutex<Tables>) -> MutexGuard<'_, Tables> {
    tables.lock().unwrap_or_else(PoisonError::into_inner)
}

fn foreign_key(constraint: &str, message: String) -> StoreError {
    StoreError::ForeignKeyViolation {
        constraint: Some(constraint.to_owned()),
        message,
    }
}

fn row_not_found() -> StoreError {
    StoreError::Database(sqlx::Error::RowNotFound)
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(self, client: impl Into<ClientId>) -> Self {
        lock(&self.tables).clients.insert(client.into());
        self
    }

    pub fn with_vehicle(self, vehicle: impl Into<VehicleId>, model_id: i32) -> Self {
        lock(&self.tables).vehicles.insert(vehicle.into(), model_id);
        self
    }

    pub fn with_model(
        self,
        model_id: i32,
        price_per_day: Decimal,
        tank_capacity: i32,
        fuel_type: impl Into<String>,
    ) -> Self {
        lock(&self.tables).models.insert(
            model_id,
            ModelRow {
                price_per_day,
                tank_capacity,
                fuel_type: fuel_type.into(),
            },
        );
        self
    }

    pub fn with_fuel_price(self, fuel_type: impl Into<String>, price_per_liter: Decimal) -> Self {
        lock(&self.tables)
            .fuel_prices
            .insert(fuel_type.into(), price_per_liter);
        self
    }

    /// Seeds an already committed reservation. Foreign keys are not checked.
    pub fn with_reservation(
        self,
        client: impl Into<ClientId>,
        vehicle: impl Into<VehicleId>,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Self {
        {
            let mut tables = lock(&self.tables);
            tables.reservation_seq += 1;
            let id = ReservationId(tables.reservation_seq);
            tables.reservations.push(Reservation {
                id,
                client: client.into(),
                vehicle: vehicle.into(),
                start,
                end,
            });
        }
        self
    }

    /// Committed reservations.
    pub fn reservations(&self) -> Vec<Reservation> {
        lock(&self.tables).reservations.clone()
    }

    /// Committed invoices.
    pub fn invoices(&self) -> Vec<Invoice> {
        lock(&self.tables).invoices.clone()
    }

    /// Committed invoice lines, in insertion order.
    pub fn invoice_lines(&self) -> Vec<InvoiceLine> {
        lock(&self.tables).invoice_lines.clone()
    }

    pub fn stats(&self) -> StoreStats {
        lock(&self.tables).stats
    }
}

#[async_trait]
impl RentalStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn RentalTx>> {
        lock(&self.tables).stats.begun += 1;
        Ok(Box::new(InMemoryTx {
            tables: Arc::clone(&self.tables),
            pending: Some(Pending::default()),
            held: HashSet::new(),
        }))
    }

    async fn client_exists(&self, client: &ClientId) -> Result<bool> {
        Ok(lock(&self.tables).clients.contains(client))
    }
}

#[derive(Debug, Default)]
struct Pending {
    reservations: Vec<Reservation>,
    invoices: Vec<Invoice>,
    invoice_lines: Vec<InvoiceLine>,
}

/// Open transaction on an [`InMemoryStore`]. Dropping it discards staged
/// writes and releases its vehicle locks.
#[derive(Debug)]
pub struct InMemoryTx {
    tables: Arc<Mutex<Tables>>,
    pending: Option<Pending>,
    held: HashSet<VehicleId>,
}

impl InMemoryTx {
    fn pending(&mut self) -> Result<&mut Pending> {
        self.pending.as_mut().ok_or(StoreError::AlreadyConsumed)
    }
}

fn release_locks(held: &mut HashSet<VehicleId>, tables: &mut Tables) {
    for vehicle in held.drain() {
        tables.locked_vehicles.remove(&vehicle);
    }
}

impl Drop for InMemoryTx {
    fn drop(&mut self) {
        if !self.held.is_empty() {
            release_locks(&mut self.held, &mut lock(&self.tables));
        }
    }
}

#[async_trait]
impl RentalTx for InMemoryTx {
    async fn lock_vehicle(&mut self, vehicle: &VehicleId) -> Result<()> {
        self.pending()?;
        if self.held.contains(vehicle) {
            return Ok(());
        }
        let mut tables = lock(&self.tables);
        if !tables.locked_vehicles.insert(vehicle.clone()) {
            return Err(StoreError::LockUnavailable(vehicle.clone()));
        }
        self.held.insert(vehicle.clone());
        Ok(())
    }

    async fn reservations_for_vehicle(&mut self, vehicle: &VehicleId) -> Result<Vec<BookedPeriod>> {
        let pending = self.pending.as_ref().ok_or(StoreError::AlreadyConsumed)?;
        let tables = lock(&self.tables);
        Ok(tables
            .reservations
            .iter()
            .chain(&pending.reservations)
            .filter(|r| &r.vehicle == vehicle)
            .map(|r| BookedPeriod {
                start: r.start,
                end: r.end,
            })
            .collect())
    }

    async fn insert_reservation(&mut self, reservation: &NewReservation) -> Result<ReservationId> {
        let pending = self.pending.as_mut().ok_or(StoreError::AlreadyConsumed)?;
        let mut tables = lock(&self.tables);
        if !tables.clients.contains(&reservation.client) {
            return Err(foreign_key(
                "fk_reservas_cliente",
                format!("client {} is not in clientes", reservation.client),
            ));
        }
        if !tables.vehicles.contains_key(&reservation.vehicle) {
            return Err(foreign_key(
                "fk_reservas_matricula",
                format!("vehicle {} is not in vehiculos", reservation.vehicle),
            ));
        }
        tables.reservation_seq += 1;
        let id = ReservationId(tables.reservation_seq);
        pending.reservations.push(Reservation {
            id,
            client: reservation.client.clone(),
            vehicle: reservation.vehicle.clone(),
            start: reservation.start,
            end: Some(reservation.end),
        });
        Ok(id)
    }

    async fn vehicle_pricing(&mut self, vehicle: &VehicleId) -> Result<VehiclePricing> {
        self.pending()?;
        let tables = lock(&self.tables);
        let model_id = *tables
            .vehicles
            .get(vehicle)
            .ok_or_else(row_not_found)?;
        let model = tables
            .models
            .get(&model_id)
            .ok_or_else(row_not_found)?;
        let price_per_liter = *tables
            .fuel_prices
            .get(&model.fuel_type)
            .ok_or_else(row_not_found)?;
        Ok(VehiclePricing {
            model_id,
            price_per_day: model.price_per_day,
            tank_capacity: model.tank_capacity,
            fuel_type: model.fuel_type.clone(),
            price_per_liter,
        })
    }

    async fn insert_invoice(&mut self, client: &ClientId, total: Decimal) -> Result<InvoiceNumber> {
        let pending = self.pending.as_mut().ok_or(StoreError::AlreadyConsumed)?;
        let mut tables = lock(&self.tables);
        if !tables.clients.contains(client) {
            return Err(foreign_key(
                "fk_facturas_cliente",
                format!("client {} is not in clientes", client),
            ));
        }
        tables.invoice_seq += 1;
        let number = InvoiceNumber(tables.invoice_seq);
        pending.invoices.push(Invoice {
            number,
            total,
            client: client.clone(),
        });
        Ok(number)
    }

    async fn insert_invoice_line(&mut self, line: &InvoiceLine) -> Result<()> {
        let pending = self.pending.as_mut().ok_or(StoreError::AlreadyConsumed)?;
        let tables = lock(&self.tables);
        let known = tables
            .invoices
            .iter()
            .chain(&pending.invoices)
            .any(|invoice| invoice.number == line.invoice);
        if !known {
            return Err(foreign_key(
                "fk_lineas_factura",
                format!("invoice {} is not in facturas", line.invoice),
            ));
        }
        pending.invoice_lines.push(line.clone());
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let pending = self.pending.take().ok_or(StoreError::AlreadyConsumed)?;
        let mut tables = lock(&self.tables);
        tables.reservations.extend(pending.reservations);
        tables.invoices.extend(pending.invoices);
        tables.invoice_lines.extend(pending.invoice_lines);
        tables.stats.commits += 1;
        release_locks(&mut self.held, &mut tables);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.pending.take().ok_or(StoreError::AlreadyConsumed)?;
        let mut tables = lock(&self.tables);
        tables.stats.rollbacks += 1;
        release_locks(&mut self.held, &mut tables);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn store() -> InMemoryStore {
        InMemoryStore::new()
            .with_client("11111111A")
            .with_vehicle("1234ABC", 1)
    }

    fn reservation(client: &str, vehicle: &str) -> NewReservation {
        NewReservation {
            client: client.into(),
            vehicle: vehicle.into(),
            start: date(2024, 3, 1),
            end: date(2024, 3, 3),
        }
    }

    #[tokio::test]
    async fn staged_writes_are_visible_inside_the_transaction_only() {
        let store = store();
        let mut tx = store.begin().await.unwrap();
        tx.insert_reservation(&reservation("11111111A", "1234ABC"))
            .await
            .unwrap();

        let seen = tx
            .reservations_for_vehicle(&VehicleId::new("1234ABC"))
            .await
            .unwrap();
        assert_eq!(seen.len(), 1);
        assert!(store.reservations().is_empty());

        tx.commit().await.unwrap();
        assert_eq!(store.reservations().len(), 1);
    }

    #[tokio::test]
    async fn rollback_discards_writes_but_not_sequence_values() {
        let store = store();
        let mut tx = store.begin().await.unwrap();
        let first = tx
            .insert_reservation(&reservation("11111111A", "1234ABC"))
            .await
            .unwrap();
        tx.rollback().await.unwrap();
        assert!(store.reservations().is_empty());

        let mut tx = store.begin().await.unwrap();
        let second = tx
            .insert_reservation(&reservation("11111111A", "1234ABC"))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn reservation_checks_client_before_vehicle() {
        let store = store();
        let mut tx = store.begin().await.unwrap();
        let err = tx
            .insert_reservation(&reservation("99999999Z", "0000XXX"))
            .await
            .unwrap_err();
        match err {
            StoreError::ForeignKeyViolation { constraint, .. } => {
                assert_eq!(constraint.as_deref(), Some("fk_reservas_cliente"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn consumed_transaction_rejects_further_use() {
        let store = store();
        let mut tx = store.begin().await.unwrap();
        tx.commit().await.unwrap();
        assert!(matches!(
            tx.rollback().await,
            Err(StoreError::AlreadyConsumed)
        ));
        assert!(matches!(
            tx.reservations_for_vehicle(&VehicleId::new("1234ABC")).await,
            Err(StoreError::AlreadyConsumed)
        ));
    }

    #[tokio::test]
    async fn vehicle_lock_is_exclusive_across_open_transactions() {
        let store = store();
        let vehicle = VehicleId::new("1234ABC");

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first.lock_vehicle(&vehicle).await.unwrap();
        first.lock_vehicle(&vehicle).await.unwrap();

        match second.lock_vehicle(&vehicle).await {
            Err(StoreError::LockUnavailable(locked)) => assert_eq!(locked, vehicle),
            other => panic!("expected LockUnavailable, got {other:?}"),
        }
        second
            .lock_vehicle(&VehicleId::new("9999ZZZ"))
            .await
            .unwrap();

        first
            .insert_reservation(&reservation("11111111A", "1234ABC"))
            .await
            .unwrap();
        first.commit().await.unwrap();

        second.lock_vehicle(&vehicle).await.unwrap();
        let booked = second.reservations_for_vehicle(&vehicle).await.unwrap();
        assert_eq!(booked.len(), 1);
        second.rollback().await.unwrap();

        let mut third = store.begin().await.unwrap();
        third.lock_vehicle(&vehicle).await.unwrap();
    }

    #[tokio::test]
    async fn dropping_a_transaction_releases_its_locks() {
        let store = store();
        let vehicle = VehicleId::new("1234ABC");

        let mut abandoned = store.begin().await.unwrap();
        abandoned.lock_vehicle(&vehicle).await.unwrap();
        drop(abandoned);

        let mut next = store.begin().await.unwrap();
        next.lock_vehicle(&vehicle).await.unwrap();
    }

    #[tokio::test]
    async fn line_must_reference_an_invoice() {
        let store = store();
        let mut tx = store.begin().await.unwrap();
        let err = tx
            .insert_invoice_line(&InvoiceLine {
                invoice: InvoiceNumber(42),
                description: "orphan".into(),
                amount: Decimal::ONE,
            })
            .await
            .unwrap_err();
        assert!(err.is_foreign_key_violation());
    }
}
