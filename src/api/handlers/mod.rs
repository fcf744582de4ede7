mod admin;
mod links;
mod page_config;

use crate::api::response::ApiError;
use crate::link_store::LinkStoreError;

pub use admin::{health, metrics};
pub use links::{create_link, link_method_not_allowed, MAX_PAGE_STATE_SIZE};
pub use page_config::{page_config, PageConfigParams, PageConfigResponse};

/// Map a LinkStoreError from a lookup to an ApiError
fn lookup_error(name: &str, e: LinkStoreError) -> ApiError {
    match e {
        LinkStoreError::NotFound(_) => ApiError::not_found("Shared link not found"),
        LinkStoreError::Unavailable { .. } => {
            tracing::error!(link = %name, error = %e, "Link store unavailable");
            ApiError::internal("Error fetching shared link state: storage unavailable")
        }
        _ => {
            tracing::error!(link = %name, error = %e, "Error fetching shared link");
            ApiError::internal("Error fetching shared link state")
        }
    }
}
