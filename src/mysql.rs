use async_trait::async_trait;
use sqlx::MySqlPool;

use crate::context::TransactionContext;
use crate::error::Result;
use crate::model::ClientId;
use crate::store::{RentalStore, RentalTx};

/// [`RentalStore`] backed by a MySQL connection pool.
///
/// Expects the `clientes`, `vehiculos`, `modelos`, `precio_combustible`,
/// `reservas`, `facturas` and `lineas_factura` tables, with `AUTO_INCREMENT`
/// keys on `reservas.idReserva` and `facturas.nroFactura`.
#[derive(Debug, Clone)]
pub struct MySqlRentalStore {
    pool: MySqlPool,
}

impl MySqlRentalStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl RentalStore for MySqlRentalStore {
    async fn begin(&self) -> Result<Box<dyn RentalTx>> {
        let tx: TransactionContext<'static> = TransactionContext::begin(&self.pool).await?;
        Ok(Box::new(tx))
    }

    async fn client_exists(&self, client: &ClientId) -> Result<bool> {
        let row = sqlx::query("SELECT NIF FROM clientes WHERE NIF = ?")
            .bind(client.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}
