use crate::error::{RentalError, StoreError};
use crate::executor::with_transaction;
use crate::model::{
    ClientId, InvoiceLine, NewReservation, Rental, RentalPeriod, RentalRequest, VehicleId,
};
use crate::store::{RentalStore, RentalTx};

/// Knobs for [`RentalService`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RentalOptions {
    /// Lock the vehicle row before checking availability, so two concurrent
    /// rentals of the same vehicle cannot both pass the overlap check.
    pub lock_vehicle: bool,
}

/// Rents vehicles against a [`RentalStore`].
///
/// # Examples
///
/// ```rust,no_run
/// use chrono::NaiveDate;
/// use rental_transaction::{MySqlRentalStore, RentalError, RentalRequest, RentalService};
/// use sqlx::MySqlPool;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let pool = MySqlPool::connect("mysql://localhost/alquiler").await?;
/// let service = RentalService::new(MySqlRentalStore::new(pool));
/// let start = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
///
/// match service.rent(RentalRequest::new("12345678A", "1234ABC", start, None)).await {
///     Ok(rental) => println!("invoice {} for {}", rental.invoice, rental.charges.total),
///     Err(RentalError::VehicleBusy(vehicle)) => println!("{vehicle} is taken"),
///     Err(e) => return Err(e.into()),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RentalService<S> {
    store: S,
    options: RentalOptions,
}

impl<S: RentalStore> RentalService<S> {
    pub fn new(store: S) -> Self {
        Self::with_options(store, RentalOptions::default())
    }

    pub fn with_options(store: S, options: RentalOptions) -> Self {
        Self { store, options }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Rents `request.vehicle` to `request.client` in a single transaction.
    ///
    /// Inserts one reservation, one invoice and two invoice lines (vehicle
    /// charge, then a full tank) and commits. On any failure the transaction
    /// is rolled back once and nothing is written.
    ///
    /// # Errors
    ///
    /// - [`RentalError::NoDays`] if the period is shorter than a day; the store is not touched.
    /// - [`RentalError::VehicleBusy`] if an existing reservation overlaps the period.
    /// - [`RentalError::ClientNotFound`] / [`RentalError::VehicleNotFound`] if the
    ///   reservation insert hits a foreign key. The client is looked up first; when it
    ///   exists, the vehicle is the missing row.
    /// - [`RentalError::Storage`] for anything else.
    #[tracing::instrument(
        skip_all,
        fields(client = %request.client, vehicle = %request.vehicle, start = %request.start)
    )]
    pub async fn rent(&self, request: RentalRequest) -> Result<Rental, RentalError> {
        let period = RentalPeriod::resolve(request.start, request.end)?;
        let lock_vehicle = self.options.lock_vehicle;
        let client = request.client.clone();
        let vehicle = request.vehicle.clone();

        let outcome = with_transaction(&self.store, |tx| {
            Box::pin(async move { book(tx, request, period, lock_vehicle).await })
        })
        .await;

        match outcome {
            Ok(rental) => {
                tracing::info!(
                    reservation = %rental.reservation,
                    invoice = %rental.invoice,
                    total = %rental.charges.total,
                    "vehicle rented"
                );
                Ok(rental)
            }
            Err(RentalError::Storage(err)) if err.is_foreign_key_violation() => {
                Err(self.missing_reference(client, vehicle).await)
            }
            Err(RentalError::Storage(err)) => Err(storage_failure(err)),
            Err(e) => Err(e),
        }
    }

    /// Works out which reference a foreign-key violation was about.
    async fn missing_reference(&self, client: ClientId, vehicle: VehicleId) -> RentalError {
        match self.store.client_exists(&client).await {
            Ok(false) => RentalError::ClientNotFound(client),
            Ok(true) => RentalError::VehicleNotFound(vehicle),
            Err(err) => storage_failure(err),
        }
    }
}

fn storage_failure(err: StoreError) -> RentalError {
    tracing::error!(error = %err, error.debug = ?err, "rental failed in storage");
    RentalError::Storage(err)
}

async fn book<T>(
    tx: &mut T,
    request: RentalRequest,
    period: RentalPeriod,
    lock_vehicle: bool,
) -> Result<Rental, RentalError>
where
    T: RentalTx + ?Sized,
{
    if lock_vehicle {
        tx.lock_vehicle(&request.vehicle).await?;
    }

    let booked = tx.reservations_for_vehicle(&request.vehicle).await?;
    if booked.iter().any(|b| period.overlaps(b)) {
        tracing::debug!(end = %period.end(), "requested period overlaps an existing reservation");
        return Err(RentalError::VehicleBusy(request.vehicle));
    }

    let reservation = tx
        .insert_reservation(&NewReservation {
            client: request.client.clone(),
            vehicle: request.vehicle.clone(),
            start: period.start(),
            end: period.end(),
        })
        .await?;
    tracing::debug!(%reservation, "reservation inserted");

    let pricing = tx.vehicle_pricing(&request.vehicle).await?;
    let charges = pricing.charges(period.days());

    let invoice = tx.insert_invoice(&request.client, charges.total).await?;
    tx.insert_invoice_line(&InvoiceLine {
        invoice,
        description: pricing.vehicle_line(period.days()),
        amount: charges.vehicle,
    })
    .await?;
    tx.insert_invoice_line(&InvoiceLine {
        invoice,
        description: pricing.fuel_line(),
        amount: charges.fuel,
    })
    .await?;
    tracing::debug!(%invoice, "invoice inserted");

    Ok(Rental {
        reservation,
        invoice,
        period,
        charges,
    })
}
