//! # Chat Server Library
//!
//! This library provides the server side of a minimal multi-client chat
//! service. Clients connect over a WebSocket, register and authenticate
//! against a shared credential file, broadcast chat lines to everyone
//! connected, and log out again.
//!
//! ## Core Responsibilities
//!
//! ### Request Pipeline
//! Every inbound command is processed by a chain of small, single-purpose
//! steps built from the combinators in [`pipeline`]. Steps run in a fixed
//! order and the first failing step ends the request, after queueing one
//! explanatory `Server` notice to the sender. Which validation runs first
//! matters: it decides which single error the user sees.
//!
//! ### Client Registry
//! The [`registry`] is the single source of truth for who is connected and
//! who is authenticated. Sessions exist from the moment a connection is
//! accepted (unauthenticated) until it closes.
//!
//! ### Broadcast Fan-out
//! A `send` from an authenticated client produces one outbound copy per
//! registered session, sender included, authenticated or not.
//!
//! ## Architecture Design
//!
//! ### Task Layout
//! The server runs one task per open connection (reading frames), one task
//! per command type (`login`, `newuser`, `send`, `logout`) and a single
//! outbound dispatcher task. They talk exclusively through FIFO queues:
//!
//! ```text
//! connection reader -> command queue -> processor -> outbound queue -> dispatcher -> connection writer
//! ```
//!
//! ### Ordering
//! Requests of the same command type from the same connection are handled in
//! submission order, since each command queue has exactly one consumer.
//! Requests of different command types race through different queues; a
//! `logout` followed quickly by a `send` may be processed in either order.
//!
//! ### Shared State
//! The registry is guarded by a read-write lock and the credential store by
//! a mutex. Registrations additionally funnel through the single `newuser`
//! processor, so the unique-handle scan and the append of two concurrent
//! registrations can never interleave.
//!
//! ## Module Organization
//!
//! - [`pipeline`]: step, chain, branch-on-failure, guard and tap combinators
//! - [`processors`]: the four command processors and their consumer loop
//! - [`registry`]: connection sessions and authentication state
//! - [`credentials`]: the line-oriented `handle,password` store
//! - [`request`]: per-command request queues and routing
//! - [`dispatcher`]: the outbound queue and its consumer
//! - [`network`]: WebSocket listener and per-connection tasks
//! - [`config`]: startup settings
//! - [`error`]: the error taxonomy
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let server = Server::bind(&config).await?;
//!
//!     // Serves until Ctrl+C, then disconnects every client
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Security Considerations
//!
//! Credentials are stored and compared in plaintext and the transport is not
//! encrypted. Handles and passwords containing commas or newlines are not
//! escaped in the credential file.

pub mod config;
pub mod credentials;
pub mod dispatcher;
pub mod error;
pub mod network;
pub mod pipeline;
pub mod processors;
pub mod registry;
pub mod request;
