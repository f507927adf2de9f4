use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::types::SessionEvent;

#[derive(Debug, Error)]
#[error("coordination backend error: {0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The coordination-service collaborator boundary.
///
/// Implementations wrap a real coordination service (or an in-process stand-in,
/// see [`super::MemoryBackend`]) rooted at a configured membership path. The
/// contract the routing layer depends on:
///
/// - records created with [`create_ephemeral`](Self::create_ephemeral) vanish
///   automatically when the creating session dies — this is the sole
///   node-failure detection mechanism;
/// - [`children`](Self::children) and [`read`](Self::read) arm watches, so a
///   later change produces a [`SessionEvent::ChildrenChanged`];
/// - session lifecycle transitions are delivered as
///   [`SessionEvent::State`] values.
#[async_trait]
pub trait CoordinationBackend: Send + Sync + 'static {
    /// Establishes the service session, or re-establishes it from scratch
    /// after an expiry. Watches must be re-armed by the next read.
    async fn connect(&self) -> Result<(), BackendError>;

    /// Creates an ephemeral membership record under the membership root.
    async fn create_ephemeral(&self, name: &str, data: &[u8]) -> Result<(), BackendError>;

    /// Deletes a membership record. Deleting an absent record is not an error.
    async fn delete(&self, name: &str) -> Result<(), BackendError>;

    /// Lists the membership record names and arms the children watch.
    async fn children(&self) -> Result<Vec<String>, BackendError>;

    /// Reads one membership record and arms its data watch.
    async fn read(&self, name: &str) -> Result<Vec<u8>, BackendError>;

    /// Returns a fresh subscription to session and watch notifications.
    fn events(&self) -> mpsc::UnboundedReceiver<SessionEvent>;
}
