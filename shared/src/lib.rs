use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_PORT: u16 = 11631;
pub const SERVER_HANDLE: &str = "Server";
pub const MAX_HANDLE_LEN: usize = 32;
pub const MIN_PASS_LEN: usize = 4;
pub const MAX_PASS_LEN: usize = 8;

pub const HELP_LINES: [&str; 5] = [
    "Available commands:",
    "- login <handle> <pass> - Log in to server",
    "- newuser <handle> <pass> - Register new user",
    "- send <message> - Send message to clients",
    "- logout - Log out from server",
];

pub const HELP_HINT: &str = "Type 'help' to get a list of available commands";

/// Commands understood by the chat protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login,
    NewUser,
    Send,
    Logout,
    Help,
    Unrecognized(String),
}

impl Command {
    pub fn parse(token: &str) -> Self {
        match token {
            "login" => Command::Login,
            "newuser" => Command::NewUser,
            "send" => Command::Send,
            "logout" => Command::Logout,
            "help" => Command::Help,
            other => Command::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Command::Login => "login",
            Command::NewUser => "newuser",
            Command::Send => "send",
            Command::Logout => "logout",
            Command::Help => "help",
            Command::Unrecognized(token) => token,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity block carried by every wire message.
///
/// `Pass` only travels client -> server on `login`/`newuser` and is never
/// serialized when empty, so outbound envelopes cannot leak it.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct WireClient {
    #[serde(rename = "Handle", default)]
    pub handle: String,
    #[serde(rename = "Pass", default, skip_serializing_if = "String::is_empty")]
    pub pass: String,
}

/// JSON frame exchanged in both directions
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct WireMessage {
    #[serde(rename = "Command", default, skip_serializing_if = "String::is_empty")]
    pub command: String,
    #[serde(rename = "Body", default)]
    pub body: String,
    #[serde(rename = "Client", default)]
    pub client: WireClient,
}

impl WireMessage {
    /// Builds a client -> server request.
    pub fn request(command: Command, body: impl Into<String>) -> Self {
        Self {
            command: command.as_str().to_string(),
            body: body.into(),
            client: WireClient::default(),
        }
    }

    /// Builds a server -> client envelope rendered as coming from `handle`.
    pub fn outbound(handle: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            command: String::new(),
            body: body.into(),
            client: WireClient {
                handle: handle.into(),
                pass: String::new(),
            },
        }
    }

    pub fn command(&self) -> Command {
        Command::parse(self.command.trim())
    }

    /// Credentials submitted with `login`/`newuser`.
    ///
    /// Prefers the `Client` block; falls back to `handle password` in the body
    /// for senders that only fill the body.
    pub fn credentials(&self) -> WireClient {
        if !self.client.handle.is_empty() {
            return WireClient {
                handle: self.client.handle.trim().to_string(),
                pass: self.client.pass.trim().to_string(),
            };
        }
        let (handle, pass) = split_on_first_delim(' ', &self.body);
        WireClient { handle, pass }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Splits at the first `delim`, trimming whitespace from both halves.
/// A missing delimiter yields the whole (trimmed) input and an empty tail.
pub fn split_on_first_delim(delim: char, s: &str) -> (String, String) {
    match s.split_once(delim) {
        Some((head, tail)) => (head.trim().to_string(), tail.trim().to_string()),
        None => (s.trim().to_string(), String::new()),
    }
}

/// Result of interpreting one console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    /// Forward this request to the server
    Request(WireMessage),
    /// Print the command list locally
    Help,
    /// Blank line, nothing to do
    Empty,
    /// Unknown first token, rejected locally
    Unrecognized(String),
}

/// Applies the console grammar: first space-delimited token is the command.
pub fn parse_console_line(line: &str) -> ConsoleInput {
    let (token, body) = split_on_first_delim(' ', line);
    if token.is_empty() {
        return ConsoleInput::Empty;
    }

    match Command::parse(&token) {
        command @ (Command::Login | Command::NewUser) => {
            let (handle, pass) = split_on_first_delim(' ', &body);
            let mut message = WireMessage::request(command, body);
            message.client = WireClient { handle, pass };
            ConsoleInput::Request(message)
        }
        Command::Send => ConsoleInput::Request(WireMessage::request(Command::Send, body)),
        Command::Logout => ConsoleInput::Request(WireMessage::request(Command::Logout, "")),
        Command::Help => ConsoleInput::Help,
        Command::Unrecognized(token) => ConsoleInput::Unrecognized(token),
    }
}
