use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use super::{BackendKind, LinkStore, LinkStoreError};
use crate::object_store::{ObjectStore, ObjectStoreError};

/// Stores each link as a single object named after the link.
///
/// There is no existence check: a repeated create overwrites the object with
/// identical bytes. Blob backends keep links forever and record no views.
pub struct BlobLinkStore {
    store: Arc<dyn ObjectStore>,
    kind: BackendKind,
}

impl BlobLinkStore {
    pub fn new(store: Arc<dyn ObjectStore>, kind: BackendKind) -> Self {
        Self { store, kind }
    }

    fn map_error(&self, context: &'static str, e: ObjectStoreError) -> LinkStoreError {
        match e {
            ObjectStoreError::NotFound(key) => LinkStoreError::NotFound(key),
            ObjectStoreError::Timeout(message) => LinkStoreError::Unavailable {
                backend: self.kind,
                context,
                message,
            },
            other => LinkStoreError::Backend {
                backend: self.kind,
                context,
                message: other.to_string(),
            },
        }
    }
}

#[async_trait]
impl LinkStore for BlobLinkStore {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn create(&self, name: &str, content: &str) -> Result<(), LinkStoreError> {
        self.store
            .put(name, Bytes::copy_from_slice(content.as_bytes()))
            .await
            .map_err(|e| self.map_error("create", e))?;
        tracing::debug!(link = %name, backend = %self.kind, "Stored shared link");
        Ok(())
    }

    async fn read(&self, name: &str) -> Result<String, LinkStoreError> {
        let data = self
            .store
            .get(name)
            .await
            .map_err(|e| self.map_error("read", e))?;

        String::from_utf8(data.to_vec()).map_err(|e| LinkStoreError::Backend {
            backend: self.kind,
            context: "read",
            message: format!("stored page state is not UTF-8: {e}"),
        })
    }

    async fn close(&self) {}
}
