//! PostgreSQL adapter for the `hwb-core` ContactStore.
//!
//! One pool per process; each call checks out its own connection, so no
//! connection or cursor is shared between concurrent conversations.

use async_trait::async_trait;
use deadpool_postgres::{ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::{error::SqlState, NoTls, Row};
use tracing::{debug, info};

use hwb_core::{
    config::DatabaseConfig, domain::Contact, errors::StoreError, ports::ContactStore,
};

const CREATE_CONTACTS: &str = "CREATE TABLE IF NOT EXISTS contacts (
    id SERIAL PRIMARY KEY,
    email VARCHAR(255) UNIQUE,
    phone VARCHAR(20) UNIQUE
)";

const FIND_CONTACT: &str =
    "SELECT id, email, phone FROM contacts WHERE email = $1 OR phone = $1 LIMIT 1";

const INSERT_CONTACT: &str =
    "INSERT INTO contacts (email, phone) VALUES ($1, $2) RETURNING id, email, phone";

pub struct PgContactStore {
    pool: Pool,
}

impl PgContactStore {
    /// Build the connection pool. Connections are opened lazily.
    pub fn new(cfg: &DatabaseConfig) -> Result<Self, StoreError> {
        let mut pg = deadpool_postgres::Config::new();
        pg.dbname = Some(cfg.name.clone());
        pg.user = Some(cfg.user.clone());
        pg.password = Some(cfg.password.clone());
        pg.host = Some(cfg.host.clone());
        pg.port = Some(cfg.port);
        pg.pool = Some(PoolConfig::new(cfg.pool_size));
        pg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let pool = pg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::Backend(format!("failed to create pool: {e}")))?;
        Ok(Self::with_pool(pool))
    }

    pub fn with_pool(pool: Pool) -> Self {
        Self { pool }
    }

    async fn client(&self) -> Result<deadpool_postgres::Object, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Backend(format!("pool: {e}")))
    }
}

#[async_trait]
impl ContactStore for PgContactStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        let client = self.client().await?;
        client.batch_execute(CREATE_CONTACTS).await.map_err(backend)?;
        info!("contacts schema ready");
        Ok(())
    }

    async fn find(&self, term: &str) -> Result<Option<Contact>, StoreError> {
        let client = self.client().await?;
        let row = client
            .query_opt(FIND_CONTACT, &[&term])
            .await
            .map_err(backend)?;
        row.map(|r| contact_from_row(&r)).transpose()
    }

    async fn insert(&self, email: &str, phone: &str) -> Result<Contact, StoreError> {
        let mut client = self.client().await?;
        let tx = client.transaction().await.map_err(backend)?;

        match tx.query_one(INSERT_CONTACT, &[&email, &phone]).await {
            Ok(row) => {
                let contact = contact_from_row(&row)?;
                tx.commit().await.map_err(backend)?;
                Ok(contact)
            }
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    debug!("rollback failed: {rb}");
                }
                Err(classify_insert_error(&e))
            }
        }
    }
}

fn classify_insert_error(e: &tokio_postgres::Error) -> StoreError {
    match e.code() {
        Some(code) if *code == SqlState::UNIQUE_VIOLATION => StoreError::Conflict,
        Some(code) if *code == SqlState::STRING_DATA_RIGHT_TRUNCATION => {
            let reason = e
                .as_db_error()
                .map(|db| db.message().to_string())
                .unwrap_or_else(|| e.to_string());
            StoreError::Rejected(reason)
        }
        _ => backend(e),
    }
}

fn contact_from_row(row: &Row) -> Result<Contact, StoreError> {
    Ok(Contact {
        id: row.try_get("id").map_err(backend)?,
        email: row
            .try_get::<_, Option<String>>("email")
            .map_err(backend)?
            .unwrap_or_default(),
        phone: row
            .try_get::<_, Option<String>>("phone")
            .map_err(backend)?
            .unwrap_or_default(),
    })
}

fn backend(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}
