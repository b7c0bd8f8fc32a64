//! # Chat Client Library
//!
//! A line-oriented console client for the chat server. Each line typed by the
//! user is interpreted locally; server commands are sent as JSON text frames
//! over a WebSocket and everything the server sends back is printed as
//! `<handle>: <body>`.
//!
//! ## Console Grammar
//!
//! The first space-delimited token of a line names the command:
//!
//! - `login <handle> <password>`
//! - `newuser <handle> <password>`
//! - `send <message>`
//! - `logout`
//! - `help` prints the command list without contacting the server
//!
//! Anything else prints a hint pointing at `help`.
//!
//! ## Module Organization
//!
//! - [`input`]: turns console lines into actions
//! - [`display`]: formats inbound messages
//! - [`network`]: the connection and its read/write loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::connect("ws://127.0.0.1:11631").await?;
//!
//!     // Reads stdin until end of file or until the server disconnects
//!     client.run().await
//! }
//! ```

pub mod display;
pub mod input;
pub mod network;
