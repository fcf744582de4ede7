//! Persistence for shared links.
//!
//! A link is an opaque blob of page state stored under a name derived from
//! its content (see [`crate::naming`]). Exactly one backend is active per
//! process:
//! - [`BlobLinkStore`] keeps one object per link in an [`ObjectStore`]
//!   (Google Cloud Storage, or a local directory during development).
//! - [`SqlLinkStore`] keeps links and their view history in MySQL, Postgres
//!   or SQLite, and optionally expires old links in the background.

mod blob;
pub mod sql;

pub use blob::BlobLinkStore;
pub use sql::{Dialect, SqlLinkStore};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::SharingBackend;
use crate::object_store::{GcsStore, LocalStore, ObjectStore};

/// Which backend produced an error or serves a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Gcs,
    Local,
    Sql(Dialect),
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Gcs => f.write_str("gcs"),
            BackendKind::Local => f.write_str("local"),
            BackendKind::Sql(dialect) => write!(f, "sql/{dialect}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum LinkStoreError {
    #[error("Shared link not found: {0}")]
    NotFound(String),
    #[error("{backend} backend unavailable during {context}: {message}")]
    Unavailable {
        backend: BackendKind,
        context: &'static str,
        message: String,
    },
    #[error("{backend} backend error during {context}: {message}")]
    Backend {
        backend: BackendKind,
        context: &'static str,
        message: String,
    },
    #[error("Invalid link store configuration: {0}")]
    Config(String),
}

impl LinkStoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, LinkStoreError::NotFound(_))
    }
}

/// The capability set every link backend provides.
///
/// Names are content-derived, so `create` for an existing name must succeed
/// without storing a second copy. `close` is called once at shutdown; no
/// `create` or `read` follows it.
#[async_trait]
pub trait LinkStore: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn create(&self, name: &str, content: &str) -> Result<(), LinkStoreError>;

    async fn read(&self, name: &str) -> Result<String, LinkStoreError>;

    async fn close(&self);
}

/// Build the configured backend. `Ok(None)` means link sharing is disabled.
pub async fn connect(
    backend: &SharingBackend,
) -> Result<Option<Arc<dyn LinkStore>>, LinkStoreError> {
    let store: Arc<dyn LinkStore> = match backend {
        SharingBackend::Disabled => return Ok(None),
        SharingBackend::Gcs {
            bucket,
            credentials_file,
        } => {
            let store = GcsStore::new(bucket, credentials_file.as_deref())
                .await
                .map_err(|e| LinkStoreError::Unavailable {
                    backend: BackendKind::Gcs,
                    context: "connect",
                    message: e.to_string(),
                })?;
            tracing::info!(bucket = %bucket, "Using GCS link sharing backend");
            Arc::new(BlobLinkStore::new(
                Arc::new(store) as Arc<dyn ObjectStore>,
                BackendKind::Gcs,
            ))
        }
        SharingBackend::Local { path } => {
            let store = LocalStore::new(path).map_err(|e| LinkStoreError::Backend {
                backend: BackendKind::Local,
                context: "connect",
                message: e.to_string(),
            })?;
            tracing::info!(path = %path, "Using local directory link sharing backend");
            Arc::new(BlobLinkStore::new(Arc::new(store), BackendKind::Local))
        }
        SharingBackend::Sql(config) => {
            let store = SqlLinkStore::connect(config).await?;
            tracing::info!(
                driver = %config.dialect,
                retention = ?config.retention,
                "Using SQL link sharing backend"
            );
            Arc::new(store)
        }
    };

    Ok(Some(store))
}
