//! Server configuration

use shared::DEFAULT_PORT;
use std::path::PathBuf;

/// Settings the server needs at startup.
///
/// The binary fills this from command-line arguments (or their environment
/// variables); tests build it directly, usually with port `0`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// IP address to bind to
    pub host: String,
    /// Port to listen on, `0` for an ephemeral port
    pub port: u16,
    /// Path of the `handle,password` credential file
    pub credentials: PathBuf,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            credentials: PathBuf::from("users.txt"),
        }
    }
}
