use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::backend::{BackendError, CoordinationBackend};
use super::types::{SessionEvent, SessionState};

/// In-process coordination backend.
///
/// Serves as the bundled implementation of [`CoordinationBackend`] so a node
/// can run self-contained, and as the session-failure simulator in tests:
/// [`transition`](Self::transition), [`expire`](Self::expire),
/// [`fail_writes`](Self::fail_writes) and [`drop_record`](Self::drop_record)
/// inject the service-side behavior a real deployment would produce.
pub struct MemoryBackend {
    inner: Mutex<MemoryInner>,
}

struct MemoryInner {
    records: BTreeMap<String, Vec<u8>>,
    watchers: Vec<mpsc::UnboundedSender<SessionEvent>>,
    state: SessionState,
    fail_writes: bool,
    op_log: Vec<String>,
}

impl MemoryBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(MemoryInner {
                records: BTreeMap::new(),
                watchers: Vec::new(),
                state: SessionState::Disconnected,
                fail_writes: false,
                op_log: Vec::new(),
            }),
        })
    }

    /// Moves the session into `state` and notifies every watcher.
    pub fn transition(&self, state: SessionState) {
        let mut inner = self.inner.lock();
        inner.state = state;
        broadcast(&mut inner, SessionEvent::State(state));
    }

    /// Expires the session: every ephemeral record dies with it.
    pub fn expire(&self) {
        let mut inner = self.inner.lock();
        inner.records.clear();
        inner.state = SessionState::Expired;
        broadcast(&mut inner, SessionEvent::State(SessionState::Expired));
    }

    /// Makes subsequent create/delete calls fail with a transient error.
    pub fn fail_writes(&self, fail: bool) {
        self.inner.lock().fail_writes = fail;
    }

    /// Removes a record as if its owning session silently died.
    pub fn drop_record(&self, name: &str) {
        let mut inner = self.inner.lock();
        if inner.records.remove(name).is_some() {
            broadcast(&mut inner, SessionEvent::ChildrenChanged);
        }
    }

    pub fn record_names(&self) -> Vec<String> {
        self.inner.lock().records.keys().cloned().collect()
    }

    /// Ordered log of the write operations performed against the backend.
    pub fn op_log(&self) -> Vec<String> {
        self.inner.lock().op_log.clone()
    }
}

fn broadcast(inner: &mut MemoryInner, event: SessionEvent) {
    inner.watchers.retain(|watcher| watcher.send(event).is_ok());
}

#[async_trait]
impl CoordinationBackend for MemoryBackend {
    async fn connect(&self) -> Result<(), BackendError> {
        let mut inner = self.inner.lock();
        inner.state = SessionState::Connected;
        broadcast(&mut inner, SessionEvent::State(SessionState::Connected));
        Ok(())
    }

    async fn create_ephemeral(&self, name: &str, data: &[u8]) -> Result<(), BackendError> {
        let mut inner = self.inner.lock();
        if inner.fail_writes {
            return Err(BackendError::new("write rejected"));
        }
        if inner.state != SessionState::Connected {
            return Err(BackendError::new("session is not writable"));
        }
        inner.records.insert(name.to_string(), data.to_vec());
        inner.op_log.push(format!("create:{name}"));
        broadcast(&mut inner, SessionEvent::ChildrenChanged);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), BackendError> {
        let mut inner = self.inner.lock();
        if inner.fail_writes {
            return Err(BackendError::new("write rejected"));
        }
        if inner.state != SessionState::Connected {
            return Err(BackendError::new("session is not writable"));
        }
        inner.op_log.push(format!("delete:{name}"));
        if inner.records.remove(name).is_some() {
            broadcast(&mut inner, SessionEvent::ChildrenChanged);
        }
        Ok(())
    }

    async fn children(&self) -> Result<Vec<String>, BackendError> {
        let inner = self.inner.lock();
        if inner.state == SessionState::Disconnected || inner.state == SessionState::Expired {
            return Err(BackendError::new("session is not connected"));
        }
        Ok(inner.records.keys().cloned().collect())
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>, BackendError> {
        let inner = self.inner.lock();
        if inner.state == SessionState::Disconnected || inner.state == SessionState::Expired {
            return Err(BackendError::new("session is not connected"));
        }
        inner
            .records
            .get(name)
            .cloned()
            .ok_or_else(|| BackendError::new(format!("no record named {name}")))
    }

    fn events(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().watchers.push(tx);
        rx
    }
}
