use std::future::Future;
use std::pin::Pin;

use crate::error::StoreError;
use crate::store::{RentalStore, RentalTx};

/// Executes a function within a store transaction.
///
/// This function handles the transaction lifecycle automatically:
/// - Begins a transaction
/// - Executes the provided function
/// - Commits on success
/// - Rolls back exactly once on error, before the error is returned
///
/// A failed rollback is logged and the original error is returned.
///
/// # Type Parameters
///
/// * `S` - The store handing out transactions
/// * `F` - A function that takes the open transaction and returns a pinned future
/// * `T` - The return type of the function (must be `Send`)
/// * `E` - The error type of the function; storage failures convert into it
///
/// # Examples
///
/// ```rust,no_run
/// use rental_transaction::{with_transaction, InMemoryStore, RentalError, RentalTx, VehicleId};
///
/// # async fn example() -> Result<(), RentalError> {
/// let store = InMemoryStore::new();
/// let booked = with_transaction(&store, |tx| {
///     Box::pin(async move {
///         let rows = tx.reservations_for_vehicle(&VehicleId::new("1234ABC")).await?;
///         Ok::<_, RentalError>(rows.len())
///     })
/// })
/// .await?;
/// assert_eq!(booked, 0);
/// # Ok(())
/// # }
/// ```
pub async fn with_transaction<S, F, T, E>(store: &S, f: F) -> Result<T, E>
where
    S: RentalStore + ?Sized,
    F: for<'a> FnOnce(
        &'a mut (dyn RentalTx + 'static),
    ) -> Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>,
    T: Send,
    E: From<StoreError>,
{
    let mut tx = store.begin().await?;

    match f(&mut *tx).await {
        Ok(result) => {
            tx.commit().await?;
            Ok(result)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::model::{ClientId, NewReservation, VehicleId};
    use chrono::NaiveDate;

    fn reservation() -> NewReservation {
        NewReservation {
            client: ClientId::new("11111111A"),
            vehicle: VehicleId::new("1234ABC"),
            start: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
        }
    }

    fn store() -> InMemoryStore {
        InMemoryStore::new()
            .with_client("11111111A")
            .with_fuel_price("Gasolina", rust_decimal::Decimal::new(150, 2))
            .with_model(1, rust_decimal::Decimal::new(3000, 2), 50, "Gasolina")
            .with_vehicle("1234ABC", 1)
    }

    #[tokio::test]
    async fn commits_on_success() {
        let store = store();
        with_transaction(&store, |tx| {
            Box::pin(async move {
                tx.insert_reservation(&reservation()).await?;
                Ok::<_, StoreError>(())
            })
        })
        .await
        .unwrap();

        assert_eq!(store.reservations().len(), 1);
        assert_eq!(store.stats().commits, 1);
        assert_eq!(store.stats().rollbacks, 0);
    }

    #[tokio::test]
    async fn rolls_back_once_on_error() {
        let store = store();
        let result: Result<(), StoreError> = with_transaction(&store, |tx| {
            Box::pin(async move {
                tx.insert_reservation(&reservation()).await?;
                Err::<(), _>(StoreError::Database(sqlx::Error::RowNotFound))
            })
        })
        .await;

        assert!(result.is_err());
        assert!(store.reservations().is_empty());
        assert_eq!(store.stats().commits, 0);
        assert_eq!(store.stats().rollbacks, 1);
    }
}
