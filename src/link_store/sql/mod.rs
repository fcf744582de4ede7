mod dialect;
mod sweeper;

pub use dialect::{Dialect, Queries};

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyConnection, AnyPool, Row};
use tokio::sync::Mutex;

use super::{BackendKind, LinkStore, LinkStoreError};
use crate::config::SqlConfig;
use sweeper::Sweeper;

/// How often the retention sweeper wakes up.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Traffic is low, so a handful of long-lived connections is plenty.
const MAX_CONNECTIONS: u32 = 3;

/// Links and their view history in a SQL database.
///
/// Tables:
/// - `link(id, created_at, short_name UNIQUE, page_state)`
/// - `view(id, link_id -> link.id ON DELETE CASCADE, viewed_at)`
///
/// Every successful read appends a `view` row. With a finite retention a
/// [`Sweeper`] deletes links older than the window; their views go with them
/// through the cascade.
pub struct SqlLinkStore {
    pool: AnyPool,
    dialect: Dialect,
    retention: Option<Duration>,
    sweeper: Mutex<Option<Sweeper>>,
}

/// Outcome of the insert half of a create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Inserted {
    New,
    AlreadyPresent,
}

impl SqlLinkStore {
    /// Open a connection pool for the configured DSN and set up the store.
    pub async fn connect(config: &SqlConfig) -> Result<Self, LinkStoreError> {
        sqlx::any::install_default_drivers();

        let dialect = config.dialect;
        let url = dialect
            .connection_url(&config.dsn)
            .map_err(LinkStoreError::Config)?;
        let connect_statements = dialect.queries().connect_statements;

        let pool = AnyPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .max_lifetime(None)
            .idle_timeout(None)
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    for stmt in connect_statements {
                        sqlx::query(*stmt).execute(&mut *conn).await?;
                    }
                    Ok(())
                })
            })
            .connect(&url)
            .await
            .map_err(|e| map_sqlx_error(dialect, "connect", e))?;

        Self::from_pool(pool, config).await
    }

    /// Set up the store on an existing pool. The pool must have been opened
    /// against the engine named by `config.dialect`.
    pub async fn from_pool(pool: AnyPool, config: &SqlConfig) -> Result<Self, LinkStoreError> {
        let dialect = config.dialect;

        if config.create_tables {
            let queries = dialect.queries();
            sqlx::query(queries.create_link_table)
                .execute(&pool)
                .await
                .map_err(|e| map_sqlx_error(dialect, "create link table", e))?;
            sqlx::query(queries.create_view_table)
                .execute(&pool)
                .await
                .map_err(|e| map_sqlx_error(dialect, "create view table", e))?;
        }

        let sweeper = config.retention.map(|retention| {
            Sweeper::spawn(pool.clone(), dialect, retention, config.sweep_interval)
        });

        Ok(Self {
            pool,
            dialect,
            retention: config.retention,
            sweeper: Mutex::new(sweeper),
        })
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Delete links that have outlived the retention window right now,
    /// returning how many were removed. Without retention nothing expires.
    pub async fn sweep_expired(&self) -> Result<u64, LinkStoreError> {
        match self.retention.and_then(retention_cutoff) {
            Some(cutoff) => delete_links_before(&self.pool, self.dialect, cutoff).await,
            None => Ok(0),
        }
    }

    async fn insert_link(
        &self,
        conn: &mut AnyConnection,
        name: &str,
        content: &str,
    ) -> Result<Inserted, LinkStoreError> {
        let result = sqlx::query(self.dialect.queries().insert_link)
            .bind(name)
            .bind(content)
            .execute(conn)
            .await;

        match result {
            Ok(_) => Ok(Inserted::New),
            // Another request inserted the same content between our check and insert.
            Err(e) if is_unique_violation(&e) => Ok(Inserted::AlreadyPresent),
            Err(e) => Err(map_sqlx_error(self.dialect, "insert link", e)),
        }
    }
}

#[async_trait]
impl LinkStore for SqlLinkStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Sql(self.dialect)
    }

    async fn create(&self, name: &str, content: &str) -> Result<(), LinkStoreError> {
        let dialect = self.dialect;
        let mut tx = self
            .pool
            .begin_with(dialect.queries().begin_transaction)
            .await
            .map_err(|e| map_sqlx_error(dialect, "begin transaction", e))?;

        let existing = sqlx::query(dialect.queries().select_link_id)
            .bind(name)
            .fetch_optional(&mut *tx)
            .await;

        let inserted = match existing {
            Ok(Some(_)) => Ok(Inserted::AlreadyPresent),
            Ok(None) => self.insert_link(&mut tx, name, content).await,
            Err(e) => Err(map_sqlx_error(dialect, "check link existence", e)),
        };

        match inserted {
            Ok(Inserted::New) => {
                tx.commit()
                    .await
                    .map_err(|e| map_sqlx_error(dialect, "commit", e))?;
                tracing::debug!(link = %name, "Created shared link");
                Ok(())
            }
            Ok(Inserted::AlreadyPresent) => {
                if let Err(e) = tx.rollback().await {
                    tracing::debug!(error = %e, "Rollback failed");
                }
                tracing::warn!(link = %name, "Short link already exists");
                Ok(())
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::debug!(error = %rollback_err, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn read(&self, name: &str) -> Result<String, LinkStoreError> {
        let dialect = self.dialect;
        let queries = dialect.queries();

        let row = sqlx::query(queries.select_link)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(dialect, "read link", e))?
            .ok_or_else(|| LinkStoreError::NotFound(name.to_string()))?;

        let id: i64 = row
            .try_get("id")
            .map_err(|e| map_sqlx_error(dialect, "read link", e))?;
        let content =
            decode_text(&row, "page_state").map_err(|e| map_sqlx_error(dialect, "read link", e))?;

        sqlx::query(queries.insert_view)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(dialect, "record view", e))?;

        Ok(content)
    }

    async fn close(&self) {
        let sweeper = self.sweeper.lock().await.take();
        if let Some(sweeper) = sweeper {
            sweeper.stop().await;
        }
        self.pool.close().await;
    }
}

/// The oldest `created_at` that is still within `retention`, or `None` when
/// the window reaches back past any representable time.
pub(crate) fn retention_cutoff(retention: Duration) -> Option<DateTime<Utc>> {
    let retention = chrono::Duration::from_std(retention).ok()?;
    Utc::now().checked_sub_signed(retention)
}

pub(crate) async fn delete_links_before(
    pool: &AnyPool,
    dialect: Dialect,
    cutoff: DateTime<Utc>,
) -> Result<u64, LinkStoreError> {
    let queries = dialect.queries();
    let result = sqlx::query(queries.delete_links_before)
        .bind(cutoff.format(queries.cutoff_format).to_string())
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error(dialect, "sweep", e))?;
    Ok(result.rows_affected())
}

fn decode_text(row: &AnyRow, column: &str) -> Result<String, sqlx::Error> {
    match row.try_get::<String, _>(column) {
        Ok(text) => Ok(text),
        // MySQL TEXT columns reach the Any driver as blobs.
        Err(_) => {
            let raw: Vec<u8> = row.try_get(column)?;
            String::from_utf8(raw).map_err(|e| sqlx::Error::Decode(Box::new(e)))
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(dialect: Dialect, context: &'static str, err: sqlx::Error) -> LinkStoreError {
    let backend = BackendKind::Sql(dialect);
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => LinkStoreError::Unavailable {
            backend,
            context,
            message,
        },
        _ => LinkStoreError::Backend {
            backend,
            context,
            message,
        },
    }
}
