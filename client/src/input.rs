//! Console input interpretation
//!
//! Only `login`, `newuser`, `send` and `logout` ever reach the server.
//! `help` and unknown commands are answered locally.

use shared::{parse_console_line, ConsoleInput, WireMessage, HELP_HINT, HELP_LINES};

/// What the client should do with one console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    /// Send this request to the server
    Send(WireMessage),
    /// Print these lines locally
    Print(Vec<String>),
    /// Nothing to do
    Ignore,
}

pub fn interpret(line: &str) -> InputAction {
    match parse_console_line(line) {
        ConsoleInput::Request(message) => InputAction::Send(message),
        ConsoleInput::Help => InputAction::Print(HELP_LINES.iter().map(|l| l.to_string()).collect()),
        ConsoleInput::Empty => InputAction::Ignore,
        ConsoleInput::Unrecognized(_) => InputAction::Print(vec![HELP_HINT.to_string()]),
    }
}
