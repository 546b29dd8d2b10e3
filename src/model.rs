//! Rows and values that flow through a rental.

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use std::fmt;

use crate::error::RentalError;

/// Length of a rental when no end date is given.
pub const DEFAULT_RENTAL_DAYS: i64 = 4;

/// Tax identifier (NIF) of a client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(String);

/// Registration plate (matricula) of a vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VehicleId(String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(ClientId);
string_id!(VehicleId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReservationId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InvoiceNumber(pub i64);

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn add_default_days(start: NaiveDate) -> NaiveDate {
    start
        .checked_add_days(Days::new(DEFAULT_RENTAL_DAYS as u64))
        .unwrap_or(NaiveDate::MAX)
}

/// A request to rent `vehicle` for `client` from `start` until `end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RentalRequest {
    pub client: ClientId,
    pub vehicle: VehicleId,
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

impl RentalRequest {
    pub fn new(
        client: impl Into<ClientId>,
        vehicle: impl Into<VehicleId>,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Self {
        Self {
            client: client.into(),
            vehicle: vehicle.into(),
            start,
            end,
        }
    }
}

/// Inclusive date range of a rental with its end already resolved.
///
/// A period always covers at least one day: `end >= start + 1 day`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RentalPeriod {
    start: NaiveDate,
    end: NaiveDate,
    days: i64,
}

impl RentalPeriod {
    /// Resolves the operative end date.
    ///
    /// Without an end the rental lasts [`DEFAULT_RENTAL_DAYS`]. With one, the
    /// whole number of days between the dates must be at least one.
    ///
    /// # Errors
    ///
    /// Returns [`RentalError::NoDays`] when `end` is not at least a day after `start`.
    pub fn resolve(start: NaiveDate, end: Option<NaiveDate>) -> Result<Self, RentalError> {
        match end {
            None => Ok(Self {
                start,
                end: add_default_days(start),
                days: DEFAULT_RENTAL_DAYS,
            }),
            Some(end) => {
                let days = (end - start).num_days();
                if days < 1 {
                    return Err(RentalError::NoDays);
                }
                Ok(Self { start, end, days })
            }
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of billable days.
    pub fn days(&self) -> i64 {
        self.days
    }

    /// `[A1,A2]` and `[B1,B2]` overlap iff `A1 <= B2 && B1 <= A2`.
    pub fn overlaps(&self, booked: &BookedPeriod) -> bool {
        self.start <= booked.resolved_end() && booked.start <= self.end
    }
}

/// Dates of a reservation as stored. Older rows may lack an end date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct BookedPeriod {
    #[sqlx(rename = "fecha_ini")]
    pub start: NaiveDate,
    #[sqlx(rename = "fecha_fin")]
    pub end: Option<NaiveDate>,
}

impl BookedPeriod {
    /// End date used for overlap checks; a missing end counts as the default rental length.
    pub fn resolved_end(&self) -> NaiveDate {
        self.end.unwrap_or_else(|| add_default_days(self.start))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReservation {
    pub client: ClientId,
    pub vehicle: VehicleId,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub id: ReservationId,
    pub client: ClientId,
    pub vehicle: VehicleId,
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

/// Reference data joined from `vehiculos`, `modelos` and `precio_combustible`.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct VehiclePricing {
    #[sqlx(rename = "id_modelo")]
    pub model_id: i32,
    #[sqlx(rename = "precio_cada_dia")]
    pub price_per_day: Decimal,
    #[sqlx(rename = "capacidad_deposito")]
    pub tank_capacity: i32,
    #[sqlx(rename = "tipo_combustible")]
    pub fuel_type: String,
    #[sqlx(rename = "precio_por_litro")]
    pub price_per_liter: Decimal,
}

impl VehiclePricing {
    /// Flat per-day charge plus one full tank.
    pub fn charges(&self, days: i64) -> RentalCharges {
        let vehicle = Decimal::from(days) * self.price_per_day;
        let fuel = Decimal::from(self.tank_capacity) * self.price_per_liter;
        RentalCharges {
            vehicle,
            fuel,
            total: vehicle + fuel,
        }
    }

    pub fn vehicle_line(&self, days: i64) -> String {
        format!("{} dias de alquiler, vehiculo modelo {}", days, self.model_id)
    }

    pub fn fuel_line(&self) -> String {
        format!(
            "Deposito lleno de {} litros de {}",
            self.tank_capacity, self.fuel_type
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RentalCharges {
    pub vehicle: Decimal,
    pub fuel: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    pub number: InvoiceNumber,
    pub total: Decimal,
    pub client: ClientId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceLine {
    pub invoice: InvoiceNumber,
    pub description: String,
    pub amount: Decimal,
}

/// Receipt of a committed rental.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rental {
    pub reservation: ReservationId,
    pub invoice: InvoiceNumber,
    pub period: RentalPeriod,
    pub charges: RentalCharges,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn missing_end_defaults_to_four_days() {
        let period = RentalPeriod::resolve(date(2024, 1, 10), None).unwrap();
        assert_eq!(period.end(), date(2024, 1, 14));
        assert_eq!(period.days(), 4);
    }

    #[test]
    fn end_before_start_has_no_days() {
        let err = RentalPeriod::resolve(date(2024, 1, 10), Some(date(2024, 1, 9))).unwrap_err();
        assert!(matches!(err, RentalError::NoDays));
    }

    #[test]
    fn same_day_rental_has_no_days() {
        let err = RentalPeriod::resolve(date(2024, 1, 10), Some(date(2024, 1, 10))).unwrap_err();
        assert!(matches!(err, RentalError::NoDays));
    }

    #[test]
    fn explicit_end_counts_whole_days() {
        let period = RentalPeriod::resolve(date(2024, 2, 27), Some(date(2024, 3, 2))).unwrap();
        assert_eq!(period.days(), 4);
    }

    #[test]
    fn overlap_is_inclusive_at_both_ends() {
        let period = RentalPeriod::resolve(date(2024, 1, 10), Some(date(2024, 1, 12))).unwrap();
        let touching_before = BookedPeriod {
            start: date(2024, 1, 5),
            end: Some(date(2024, 1, 10)),
        };
        let touching_after = BookedPeriod {
            start: date(2024, 1, 12),
            end: Some(date(2024, 1, 15)),
        };
        let disjoint = BookedPeriod {
            start: date(2024, 1, 13),
            end: Some(date(2024, 1, 15)),
        };
        assert!(period.overlaps(&touching_before));
        assert!(period.overlaps(&touching_after));
        assert!(!period.overlaps(&disjoint));
    }

    #[test]
    fn stored_reservation_without_end_blocks_default_length() {
        let booked = BookedPeriod {
            start: date(2024, 1, 1),
            end: None,
        };
        assert_eq!(booked.resolved_end(), date(2024, 1, 5));

        let inside = RentalPeriod::resolve(date(2024, 1, 5), Some(date(2024, 1, 7))).unwrap();
        let after = RentalPeriod::resolve(date(2024, 1, 6), Some(date(2024, 1, 7))).unwrap();
        assert!(inside.overlaps(&booked));
        assert!(!after.overlaps(&booked));
    }

    #[test]
    fn charges_use_exact_decimals() {
        let pricing = VehiclePricing {
            model_id: 7,
            price_per_day: Decimal::new(3000, 2),
            tank_capacity: 50,
            fuel_type: "Gasolina".into(),
            price_per_liter: Decimal::new(150, 2),
        };
        let charges = pricing.charges(4);
        assert_eq!(charges.vehicle, Decimal::new(12000, 2));
        assert_eq!(charges.fuel, Decimal::new(7500, 2));
        assert_eq!(charges.total, Decimal::new(19500, 2));
        assert_eq!(pricing.vehicle_line(4), "4 dias de alquiler, vehiculo modelo 7");
        assert_eq!(pricing.fuel_line(), "Deposito lleno de 50 litros de Gasolina");
    }
}
