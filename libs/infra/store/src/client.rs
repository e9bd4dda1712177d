// [libs/infra/store/src/client.rs]
/*!
 * =================================================================
 * APARATO: DATABASE CONNECTION CLIENT
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (L3)
 * RESPONSABILIDAD: GESTIÓN DE ENLACES Y ARRANQUE DE ESQUEMA
 * =================================================================
 */

use crate::errors::StoreError;
use crate::schema::apply_schema;
use libsql::{Builder, Connection, Database};
use std::sync::Arc;
use tracing::{error, info, instrument};

#[derive(Clone)]
pub struct StoreClient {
    database_driver: Arc<Database>,
    /// Keeps an in-memory database alive across connections; SQLite drops
    /// an in-memory database once its last connection closes.
    _memory_anchor: Option<Arc<Connection>>,
}

impl StoreClient {
    #[instrument(skip(access_token))]
    pub async fn connect(
        connection_url: &str,
        access_token: Option<String>,
    ) -> Result<Self, StoreError> {
        if connection_url.is_empty() {
            return Err(StoreError::Configuration("DATABASE_URL is empty".into()));
        }

        info!(url = connection_url, "connecting to datastore");

        let is_remote =
            connection_url.starts_with("libsql://") || connection_url.starts_with("https://");
        let is_memory = connection_url.contains(":memory:") || connection_url.contains("mode=memory");

        let driver = if is_remote {
            let token = access_token.ok_or_else(|| {
                StoreError::Configuration("remote datastore requires an access token".into())
            })?;
            Builder::new_remote(connection_url.to_string(), token).build().await
        } else {
            Builder::new_local(connection_url).build().await
        }
        .map_err(|e| StoreError::Connection(e.to_string()))?;

        let shared_driver = Arc::new(driver);
        let mut anchor = None;

        if is_memory {
            let anchor_conn = shared_driver
                .connect()
                .map_err(|e| StoreError::Connection(format!("memory anchor failed: {e}")))?;
            apply_schema(&anchor_conn).await?;
            anchor = Some(Arc::new(anchor_conn));
        } else {
            let bootstrap_conn = shared_driver
                .connect()
                .map_err(|e| StoreError::Connection(format!("bootstrap connection failed: {e}")))?;
            apply_schema(&bootstrap_conn).await?;
        }

        Ok(Self {
            database_driver: shared_driver,
            _memory_anchor: anchor,
        })
    }

    pub fn connection(&self) -> Result<Connection, StoreError> {
        self.database_driver.connect().map_err(|e| {
            error!(error = %e, "failed to allocate a datastore connection");
            StoreError::Connection(e.to_string())
        })
    }
}
