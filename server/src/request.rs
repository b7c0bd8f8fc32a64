//! Per-command request queues

use crate::error::ChatError;
use crate::registry::Session;
use log::debug;
use shared::{Command, WireMessage};
use tokio::sync::mpsc;

/// An inbound message paired with its sender's session as of arrival
#[derive(Debug, Clone)]
pub struct Request {
    pub sender: Session,
    pub message: WireMessage,
}

pub type RequestReceiver = mpsc::UnboundedReceiver<Request>;

/// Consumer ends, one per server-side command
pub struct RequestQueues {
    pub login: RequestReceiver,
    pub newuser: RequestReceiver,
    pub send: RequestReceiver,
    pub logout: RequestReceiver,
}

/// Producer ends, cloned into every connection handler
#[derive(Debug, Clone)]
pub struct RequestRouter {
    login: mpsc::UnboundedSender<Request>,
    newuser: mpsc::UnboundedSender<Request>,
    send: mpsc::UnboundedSender<Request>,
    logout: mpsc::UnboundedSender<Request>,
}

pub fn request_queues() -> (RequestRouter, RequestQueues) {
    let (login_tx, login_rx) = mpsc::unbounded_channel();
    let (newuser_tx, newuser_rx) = mpsc::unbounded_channel();
    let (send_tx, send_rx) = mpsc::unbounded_channel();
    let (logout_tx, logout_rx) = mpsc::unbounded_channel();

    let router = RequestRouter {
        login: login_tx,
        newuser: newuser_tx,
        send: send_tx,
        logout: logout_tx,
    };
    let queues = RequestQueues {
        login: login_rx,
        newuser: newuser_rx,
        send: send_rx,
        logout: logout_rx,
    };
    (router, queues)
}

impl RequestRouter {
    /// Routes `request` into the queue for its command.
    ///
    /// `help` is answered by clients locally and is ignored here. Anything
    /// else unknown is a protocol error for the caller to log.
    pub fn route(&self, request: Request) -> Result<Command, ChatError> {
        let command = request.message.command();
        let (queue, name) = match &command {
            Command::Login => (&self.login, "login"),
            Command::NewUser => (&self.newuser, "newuser"),
            Command::Send => (&self.send, "send"),
            Command::Logout => (&self.logout, "logout"),
            Command::Help => {
                debug!("Ignoring help request from connection {}", request.sender.id());
                return Ok(Command::Help);
            }
            Command::Unrecognized(token) => {
                return Err(ChatError::UnrecognizedCommand(token.clone()));
            }
        };

        debug!("Routing {} request from connection {}", name, request.sender.id());
        queue.send(request).map_err(|_| ChatError::QueueClosed(name))?;
        Ok(command)
    }
}
