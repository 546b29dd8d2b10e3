use anyhow::{bail, Context};
use chrono::NaiveDate;
use rental_transaction::{Config, MySqlRentalStore, RentalError, RentalRequest, RentalService};
use tracing_subscriber::EnvFilter;

fn parse_date(value: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("invalid date {value:?}, expected YYYY-MM-DD"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (client, vehicle, start, end) = match args.as_slice() {
        [client, vehicle, start] => (client, vehicle, parse_date(start)?, None),
        [client, vehicle, start, end] => (
            client,
            vehicle,
            parse_date(start)?,
            Some(parse_date(end)?),
        ),
        _ => bail!("usage: rent <nif> <matricula> <start YYYY-MM-DD> [end YYYY-MM-DD]"),
    };

    // Connect to database
    let config = Config::from_env()?;
    let pool = config.database.connect().await?;
    let service = RentalService::with_options(MySqlRentalStore::new(pool.clone()), config.rental);

    println!("=== Renting {} to {} ===\n", vehicle, client);

    match service
        .rent(RentalRequest::new(client.as_str(), vehicle.as_str(), start, end))
        .await
    {
        Ok(rental) => {
            println!(
                "   ✓ Reservation {} from {} to {}",
                rental.reservation,
                rental.period.start(),
                rental.period.end()
            );
            println!("   ✓ Invoice {}", rental.invoice);
            println!("     vehicle: {}", rental.charges.vehicle);
            println!("     fuel:    {}", rental.charges.fuel);
            println!("     total:   {}", rental.charges.total);
        }
        Err(RentalError::Storage(e)) => {
            pool.close().await;
            return Err(e).context("rental failed");
        }
        Err(e) => println!("   ✗ {}", e),
    }

    pool.close().await;
    Ok(())
}
