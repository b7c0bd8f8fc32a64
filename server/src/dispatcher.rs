//! Outbound queue and its single consumer

use crate::error::ChatError;
use crate::registry::{ConnectionId, Registry};
use log::{debug, error};
use shared::{WireMessage, SERVER_HANDLE};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A message addressed to one connection
#[derive(Debug, Clone)]
pub struct Envelope {
    pub to: ConnectionId,
    pub message: WireMessage,
}

impl Envelope {
    /// Server-authored notice
    pub fn notice(to: ConnectionId, body: impl Into<String>) -> Self {
        Self {
            to,
            message: WireMessage::outbound(SERVER_HANDLE, body),
        }
    }

    /// Chat line rendered as coming from `from`
    pub fn chat(to: ConnectionId, from: &str, body: &str) -> Self {
        Self {
            to,
            message: WireMessage::outbound(from, body),
        }
    }
}

pub type OutboundReceiver = mpsc::UnboundedReceiver<Envelope>;

/// Producer side of the shared outbound queue
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl OutboundQueue {
    pub fn new() -> (Self, OutboundReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn queue(&self, envelope: Envelope) -> Result<(), ChatError> {
        self.tx
            .send(envelope)
            .map_err(|_| ChatError::QueueClosed("outbound"))
    }

    pub fn notice(&self, to: ConnectionId, body: impl Into<String>) -> Result<(), ChatError> {
        self.queue(Envelope::notice(to, body))
    }
}

/// Writes one envelope to its target connection.
///
/// The target is resolved through the registry at delivery time, so replies
/// to connections that went away in the meantime fail here.
pub fn deliver(registry: &Registry, envelope: Envelope) -> Result<(), ChatError> {
    let session = registry
        .lookup(envelope.to)
        .ok_or(ChatError::UnknownConnection(envelope.to))?;

    session
        .outbox()
        .send(envelope.message)
        .map_err(|_| ChatError::ConnectionClosed(envelope.to))
}

/// Drains the outbound queue until every producer is gone.
///
/// Failed writes are logged and the message is dropped. A connection whose
/// writer has gone away is removed from the registry.
/// Replies to connections that already left the registry are dropped quietly.
pub async fn run_dispatcher(registry: Arc<Registry>, mut outbound: OutboundReceiver) {
    while let Some(envelope) = outbound.recv().await {
        let to = envelope.to;
        match deliver(&registry, envelope) {
            Ok(()) => debug!("Delivered message to connection {}", to),
            Err(e @ ChatError::ConnectionClosed(_)) => {
                error!("Dropping outbound message: {}", e);
                registry.remove(to);
            }
            Err(e @ ChatError::UnknownConnection(_)) => {
                debug!("Dropping reply to departed connection: {}", e)
            }
            Err(e) => error!("Dropping outbound message: {}", e),
        }
    }
    debug!("Outbound dispatcher stopped");
}
