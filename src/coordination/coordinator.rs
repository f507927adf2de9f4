use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use super::backend::{BackendError, CoordinationBackend};
use super::types::{
    CoordinatedNode, NodeId, NodeOperation, OperationKind, SessionEvent, SessionState,
};

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Maintains this process's membership records in the coordination service
/// and fans membership snapshots out to subscribers.
///
/// All state transitions and public calls execute under one mutual-exclusion
/// domain, so a snapshot read never interleaves with a join/leave and
/// subscribers never observe a partial update.
pub struct Coordinator<B: CoordinationBackend> {
    backend: Arc<B>,
    inner: Mutex<Inner>,
}

struct Inner {
    connected: bool,
    read_only: bool,
    nodes: Option<HashMap<NodeId, CoordinatedNode>>,
    pending: VecDeque<NodeOperation>,
    registered: HashMap<NodeId, CoordinatedNode>,
    subscribers: Vec<mpsc::UnboundedSender<Vec<CoordinatedNode>>>,
}

impl<B: CoordinationBackend> Coordinator<B> {
    pub fn new(backend: Arc<B>) -> Arc<Self> {
        Arc::new(Self {
            backend,
            inner: Mutex::new(Inner {
                connected: false,
                read_only: false,
                nodes: None,
                pending: VecDeque::new(),
                registered: HashMap::new(),
                subscribers: Vec::new(),
            }),
        })
    }

    /// Connects the backend session and starts consuming its notifications.
    ///
    /// Returns an error only if the very first connection attempt fails, so a
    /// launcher can fail fast; once running, session loss is retried forever.
    pub async fn start(self: &Arc<Self>) -> Result<JoinHandle<()>, BackendError> {
        let mut events = self.backend.events();
        self.backend.connect().await?;
        let coordinator = Arc::clone(self);
        Ok(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    SessionEvent::State(SessionState::Connected) => coordinator.on_connected().await,
                    SessionEvent::State(SessionState::ReadOnly) => coordinator.on_read_only().await,
                    SessionEvent::State(SessionState::Disconnected) => {
                        coordinator.on_disconnected().await
                    }
                    SessionEvent::State(SessionState::Expired) => coordinator.on_expired().await,
                    SessionEvent::ChildrenChanged => coordinator.on_children_changed().await,
                }
            }
            tracing::info!("Coordination event stream closed");
        }))
    }

    /// Registers a node's ephemeral membership record, or queues the join
    /// until the service accepts writes. Registration failures are queued as
    /// well, never surfaced to the caller.
    pub async fn join(&self, node: CoordinatedNode) {
        let mut inner = self.inner.lock().await;
        inner.registered.insert(node.id(), node.clone());
        if inner.connected && !inner.read_only {
            if let Err(error) = self.register(&node).await {
                tracing::warn!("Failed to register node {}: {}. Queued for retry", node, error);
                inner.pending.push_back(NodeOperation::join(node));
            }
        } else {
            tracing::info!("Not writable, queueing join of node {}", node);
            inner.pending.push_back(NodeOperation::join(node));
        }
    }

    /// Deletes a node's membership record, or queues the leave.
    pub async fn leave(&self, node: CoordinatedNode) {
        let mut inner = self.inner.lock().await;
        inner.registered.remove(&node.id());
        if inner.connected && !inner.read_only {
            if let Err(error) = self.unregister(&node).await {
                tracing::warn!(
                    "Failed to unregister node {}: {}. Queued for retry",
                    node,
                    error
                );
                inner.pending.push_back(NodeOperation::leave(node));
            }
        } else {
            tracing::info!("Not writable, queueing leave of node {}", node);
            inner.pending.push_back(NodeOperation::leave(node));
        }
    }

    /// Whether the coordination session currently accepts writes.
    pub async fn is_writable(&self) -> bool {
        let inner = self.inner.lock().await;
        inner.connected && !inner.read_only
    }

    /// Subscribes to membership snapshots. If a snapshot is already cached it
    /// is delivered into the channel before this call returns, so a new
    /// subscriber never waits for the next change event to learn the current
    /// state.
    pub async fn subscribe(&self) -> mpsc::UnboundedReceiver<Vec<CoordinatedNode>> {
        let mut inner = self.inner.lock().await;
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(nodes) = &inner.nodes {
            if !nodes.is_empty() {
                let _ = tx.send(nodes.values().cloned().collect());
            }
        }
        inner.subscribers.push(tx);
        rx
    }

    async fn on_connected(&self) {
        tracing::info!("Coordination session connected and writable");
        let mut inner = self.inner.lock().await;
        inner.connected = true;
        inner.read_only = false;

        // One replay pass in submission order. An operation that fails again
        // goes back to the queue and waits for the next writable transition.
        let pending: Vec<NodeOperation> = inner.pending.drain(..).collect();
        for operation in pending {
            let result = match operation.kind {
                OperationKind::Join => self.register(&operation.node).await,
                OperationKind::Leave => self.unregister(&operation.node).await,
            };
            if let Err(error) = result {
                tracing::warn!(
                    "Replay of pending {:?} for node {} failed: {}",
                    operation.kind,
                    operation.node,
                    error
                );
                inner.pending.push_back(operation);
            }
        }

        self.refresh_and_notify(&mut inner).await;
    }

    async fn on_read_only(&self) {
        tracing::info!("Coordination session is read-only");
        let mut inner = self.inner.lock().await;
        inner.read_only = true;
        // Writes are impossible, but reads remain valid.
        self.refresh_and_notify(&mut inner).await;
    }

    async fn on_disconnected(&self) {
        tracing::warn!("Coordination session disconnected");
        let mut inner = self.inner.lock().await;
        inner.connected = false;
    }

    async fn on_expired(&self) {
        tracing::warn!("Coordination session expired, re-establishing");
        {
            let mut inner = self.inner.lock().await;
            inner.connected = false;
            inner.read_only = false;
            // Ephemeral records died with the session: every registration
            // must be redone once the new session is writable.
            let rejoins: Vec<CoordinatedNode> = inner.registered.values().cloned().collect();
            for node in rejoins {
                let already_queued = inner.pending.iter().any(|operation| {
                    operation.kind == OperationKind::Join && operation.node.id() == node.id()
                });
                if !already_queued {
                    inner.pending.push_back(NodeOperation::join(node));
                }
            }
        }
        loop {
            match self.backend.connect().await {
                Ok(()) => break,
                Err(error) => {
                    tracing::error!(
                        "Failed to re-establish coordination session: {}. Retry in {:?}",
                        error,
                        RECONNECT_DELAY
                    );
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }

    async fn on_children_changed(&self) {
        let mut inner = self.inner.lock().await;
        self.refresh_and_notify(&mut inner).await;
    }

    /// Re-reads the full membership snapshot and notifies every subscriber.
    /// A failed read keeps the previous snapshot; subscribers are still
    /// notified with it.
    async fn refresh_and_notify(&self, inner: &mut Inner) {
        match self.read_state().await {
            Ok(nodes) => inner.nodes = Some(nodes),
            Err(error) => {
                tracing::warn!("Error while reading membership state: {}", error);
            }
        }
        let snapshot: Vec<CoordinatedNode> = match &inner.nodes {
            Some(nodes) => nodes.values().cloned().collect(),
            None => return,
        };
        tracing::info!("Publishing membership snapshot with {} nodes", snapshot.len());
        inner
            .subscribers
            .retain(|subscriber| subscriber.send(snapshot.clone()).is_ok());
    }

    async fn read_state(&self) -> Result<HashMap<NodeId, CoordinatedNode>, BackendError> {
        let children = self.backend.children().await?;
        let mut nodes = HashMap::new();
        for child in children {
            let data = self.backend.read(&child).await?;
            match bincode::deserialize::<CoordinatedNode>(&data) {
                Ok(node) => {
                    nodes.insert(node.id(), node);
                }
                Err(error) => {
                    tracing::warn!("Discarding unreadable membership record {}: {}", child, error);
                }
            }
        }
        Ok(nodes)
    }

    async fn register(&self, node: &CoordinatedNode) -> Result<(), BackendError> {
        let data = bincode::serialize(node).map_err(|error| BackendError::new(error.to_string()))?;
        self.backend
            .create_ephemeral(&node.id().to_string(), &data)
            .await
    }

    async fn unregister(&self, node: &CoordinatedNode) -> Result<(), BackendError> {
        self.backend.delete(&node.id().to_string()).await
    }
}
