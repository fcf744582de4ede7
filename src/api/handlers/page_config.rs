use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::lookup_error;
use crate::api::response::{ApiError, AppQuery};
use crate::metrics::record;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PageConfigParams {
    /// Name of a shared link whose page state should be loaded.
    #[serde(default)]
    pub l: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageConfigResponse {
    pub now: i64,
    pub page_state: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(rename = "defaultPrometheusURL")]
    pub default_prometheus_url: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Initial configuration for the UI, including shared page state when a
/// link name is given.
/// Route: GET /api/page_config?l=<name>
pub async fn page_config(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<PageConfigParams>,
) -> Result<Json<PageConfigResponse>, ApiError> {
    let mut page_state = None;

    if let Some(name) = params.l.as_deref().filter(|n| !n.is_empty()) {
        let links = state
            .links
            .as_ref()
            .ok_or_else(|| ApiError::unavailable("Link sharing disabled in this instance"))?;

        record::link_lookup();
        let content = match links.read(name).await {
            Ok(content) => content,
            Err(e) => {
                record::link_lookup_error();
                return Err(lookup_error(name, e));
            }
        };

        let parsed: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&content)
            .map_err(|e| {
                tracing::error!(link = %name, error = %e, "Shared page state is not a JSON object");
                ApiError::internal("Error unmarshaling shared page state from JSON")
            })?;
        page_state = Some(parsed);
    }

    Ok(Json(PageConfigResponse {
        now: Utc::now().timestamp(),
        page_state,
        default_prometheus_url: state.config.server.default_prometheus_url.clone(),
    }))
}
