//! Error taxonomy for the chat server

use crate::registry::ConnectionId;
use shared::{MAX_HANDLE_LEN, MAX_PASS_LEN, MIN_PASS_LEN};
use thiserror::Error;

/// Every way a single request, connection or queue can fail.
///
/// None of these are retried. A failure ends the request that caused it and
/// is reported to the offending client as a `Server` notice and/or logged.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Handle must be at most {MAX_HANDLE_LEN} characters")]
    HandleTooLong,
    #[error("Handle must not be empty")]
    EmptyHandle,
    #[error("Pass must be between {MIN_PASS_LEN} and {MAX_PASS_LEN} characters")]
    PassLength,
    #[error("Handle must not contain commas or line breaks")]
    HandleDelimiter,
    #[error("Pass must not contain commas or line breaks")]
    PassDelimiter,

    #[error("Client has not been authenticated")]
    NotAuthenticated,
    #[error("Client is already logged in")]
    AlreadyAuthenticated,
    #[error("Login credentials not in credential store")]
    InvalidCredentials,
    #[error("Handle is already taken")]
    HandleTaken,

    #[error("Credential store access failed: {0}")]
    Store(#[from] std::io::Error),

    #[error("Connection {0} is not registered")]
    UnknownConnection(ConnectionId),
    #[error("Connection {0} is closed")]
    ConnectionClosed(ConnectionId),
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Unrecognized command '{0}'")]
    UnrecognizedCommand(String),

    #[error("{0} queue is closed")]
    QueueClosed(&'static str),
}
