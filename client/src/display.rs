use shared::WireMessage;

/// Formats an inbound message for the console as `<handle>: <body>`.
pub fn render(message: &WireMessage) -> String {
    if message.client.handle.is_empty() {
        message.body.clone()
    } else {
        format!("{}: {}", message.client.handle, message.body)
    }
}
