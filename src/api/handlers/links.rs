use std::sync::Arc;

use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::StatusCode;
use bytes::Bytes;

use crate::api::response::ApiError;
use crate::metrics::record;
use crate::naming::short_name;
use crate::AppState;

/// Largest page state accepted for a shared link.
pub const MAX_PAGE_STATE_SIZE: usize = 512 * 1024;

// ============================================================================
// Handlers
// ============================================================================

/// Store the request body and answer with its link name.
/// Route: POST /api/link
pub async fn create_link(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<String, ApiError> {
    let links = state
        .links
        .as_ref()
        .ok_or_else(|| ApiError::unavailable("No link sharing backend configured."))?;

    record::link_creation();

    let result = async {
        let body = body.map_err(|rejection| {
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ApiError::payload_too_large("Page is too large to save, sorry")
            } else {
                tracing::error!(error = %rejection.body_text(), "Error reading body");
                ApiError::internal("Server Error")
            }
        })?;

        // The body limit layer already enforces this; keep the check next to the write.
        if body.len() > MAX_PAGE_STATE_SIZE {
            return Err(ApiError::payload_too_large("Page is too large to save, sorry"));
        }

        let page_state = std::str::from_utf8(&body)
            .map_err(|_| ApiError::bad_request("Page state must be valid UTF-8"))?;

        let name = short_name(page_state.as_bytes());
        tracing::info!(link = %name, bytes = body.len(), "Creating short link");

        links.create(&name, page_state).await.map_err(|e| {
            tracing::error!(link = %name, error = %e, "Error creating short link");
            ApiError::internal("Server Error")
        })?;

        Ok(name)
    }
    .await;

    if result.is_err() {
        record::link_creation_error();
    }
    result
}

/// Route: any other method on /api/link
pub async fn link_method_not_allowed() -> ApiError {
    ApiError::method_not_allowed("Invalid HTTP method, use POST")
}
