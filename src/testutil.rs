//! Shared test helpers for link-sharer unit tests.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, ServerConfig, SharingBackend, SqlConfig};
use crate::link_store::sql::SWEEP_INTERVAL;
use crate::link_store::{BackendKind, BlobLinkStore, Dialect, LinkStore, SqlLinkStore};
use crate::object_store::LocalStore;
use crate::AppState;

/// SQLite settings for a database file inside `temp_dir`.
pub fn sqlite_config(temp_dir: &tempfile::TempDir, retention: Option<Duration>) -> SqlConfig {
    SqlConfig {
        dialect: Dialect::Sqlite,
        dsn: temp_dir
            .path()
            .join("links.db")
            .to_string_lossy()
            .to_string(),
        create_tables: true,
        retention,
        sweep_interval: SWEEP_INTERVAL,
    }
}

/// Open a SQLite-backed store in `temp_dir` with the tables created.
pub async fn sqlite_store(temp_dir: &tempfile::TempDir) -> SqlLinkStore {
    SqlLinkStore::connect(&sqlite_config(temp_dir, None))
        .await
        .expect("Failed to open test SQLite store")
}

/// A blob store writing into `temp_dir`.
pub fn local_blob_store(temp_dir: &tempfile::TempDir) -> BlobLinkStore {
    let store = LocalStore::new(temp_dir.path().join("links"))
        .expect("Failed to create test object store");
    BlobLinkStore::new(Arc::new(store), BackendKind::Local)
}

/// Create a test AppState around the given link store.
pub fn test_state(links: Option<Arc<dyn LinkStore>>) -> Arc<AppState> {
    let config = Config {
        server: ServerConfig {
            default_prometheus_url: "http://prometheus:9090".to_string(),
            ..ServerConfig::default()
        },
        sharing: SharingBackend::Disabled,
    };

    Arc::new(AppState {
        config,
        links,
        metrics: None,
    })
}
