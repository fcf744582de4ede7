//! link-sharer - Content-addressed storage for shared page state
//!
//! This crate lets a UI save an opaque blob of page state and load it back
//! later by a short name derived from the content:
//! - Names are SHA-256 prefixes, so saving the same state twice is a no-op
//! - Swappable backends: Google Cloud Storage, a local directory, or SQL
//!   (MySQL, Postgres, SQLite) with view tracking and time-based expiry
//! - REST API for creating links and resolving them into page config

pub mod api;
pub mod config;
pub mod link_store;
pub mod metrics;
pub mod naming;
pub mod object_store;
#[cfg(test)]
pub mod testutil;

use std::sync::Arc;

use config::Config;
use link_store::LinkStore;
use metrics_exporter_prometheus::PrometheusHandle;

/// Shared application state
pub struct AppState {
    pub config: Config,
    /// `None` when link sharing is disabled.
    pub links: Option<Arc<dyn LinkStore>>,
    /// `None` when no Prometheus recorder is installed (tests).
    pub metrics: Option<PrometheusHandle>,
}
