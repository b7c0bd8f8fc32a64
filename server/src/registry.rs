//! Client registry: who is connected and who is authenticated
//!
//! The registry exclusively owns every [`Session`]. Connection handlers,
//! command processors and the outbound dispatcher all run concurrently and
//! reach sessions only through this type, which mediates every access with a
//! single `RwLock`. No lock is ever held across an `.await` or a queue send;
//! callers get cloned snapshots.

use crate::error::ChatError;
use log::info;
use parking_lot::RwLock;
use shared::WireMessage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Opaque identity of one transport connection
pub type ConnectionId = u64;

/// Write side of a connection. Each connection's writer task drains it onto
/// the socket; a closed outbox means the connection is gone.
pub type Outbox = mpsc::UnboundedSender<WireMessage>;

/// Server-side state of one connection
///
/// A session is authenticated exactly when it carries a handle. Passwords are
/// never stored here.
#[derive(Debug, Clone)]
pub struct Session {
    id: ConnectionId,
    handle: Option<String>,
    outbox: Outbox,
}

impl Session {
    pub fn new(id: ConnectionId, outbox: Outbox) -> Self {
        Self {
            id,
            handle: None,
            outbox,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn handle(&self) -> Option<&str> {
        self.handle.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.handle.is_some()
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// False once the connection's writer has gone away
    pub fn is_open(&self) -> bool {
        !self.outbox.is_closed()
    }

    fn authenticated(&self, handle: &str) -> Self {
        Self {
            id: self.id,
            handle: Some(handle.to_string()),
            outbox: self.outbox.clone(),
        }
    }

    fn cleared(&self) -> Self {
        Self {
            id: self.id,
            handle: None,
            outbox: self.outbox.clone(),
        }
    }
}

/// Shared map from connection identity to session
pub struct Registry {
    sessions: RwLock<HashMap<ConnectionId, Session>>,
    next_id: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Inserts an unauthenticated session for a freshly accepted connection.
    pub fn register(&self, outbox: Outbox) -> Session {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let session = Session::new(id, outbox);
        self.sessions.write().insert(id, session.clone());
        session
    }

    pub fn lookup(&self, id: ConnectionId) -> Option<Session> {
        self.sessions.read().get(&id).cloned()
    }

    /// Marks the session authenticated as `handle`, overwriting any prior handle.
    pub fn set_authenticated(&self, id: ConnectionId, handle: &str) -> Result<Session, ChatError> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(&id)
            .ok_or(ChatError::UnknownConnection(id))?;
        *session = session.authenticated(handle);
        Ok(session.clone())
    }

    /// Resets the session to unauthenticated, keeping only its connection.
    pub fn clear(&self, id: ConnectionId) -> Result<Session, ChatError> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(&id)
            .ok_or(ChatError::UnknownConnection(id))?;
        *session = session.cleared();
        Ok(session.clone())
    }

    pub fn remove(&self, id: ConnectionId) -> Option<Session> {
        let removed = self.sessions.write().remove(&id);
        if removed.is_some() {
            info!("Client {} removed from registry", id);
        }
        removed
    }

    /// Snapshot of every registered session, authenticated or not.
    pub fn for_each(&self) -> Vec<Session> {
        self.sessions.read().values().cloned().collect()
    }

    /// Removes every session, returning them. Used at shutdown.
    pub fn drain(&self) -> Vec<Session> {
        self.sessions.write().drain().map(|(_, session)| session).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
