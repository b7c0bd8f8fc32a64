//! Server network layer: WebSocket listener, per-connection tasks and task wiring

use crate::config::ServerConfig;
use crate::credentials::CredentialStore;
use crate::dispatcher::{run_dispatcher, OutboundQueue, OutboundReceiver};
use crate::error::ChatError;
use crate::processors::{
    process_login, process_logout, process_newuser, process_send, run_processor, ServerContext,
    WELCOME_NOTICE,
};
use crate::registry::{ConnectionId, Registry};
use crate::request::{request_queues, Request, RequestQueues, RequestRouter};
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{Command, WireMessage};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

/// How long a closing connection's writer may take to flush and send Close
const WRITER_GRACE: Duration = Duration::from_millis(500);

/// Chat server owning the listener and every queue
pub struct Server {
    listener: TcpListener,
    context: ServerContext,
    router: RequestRouter,
    queues: RequestQueues,
    outbound: OutboundReceiver,
}

impl Server {
    pub async fn bind(config: &ServerConfig) -> io::Result<Self> {
        let address = config.address();
        let listener = TcpListener::bind(&address).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let (outbound_queue, outbound) = OutboundQueue::new();
        let (router, queues) = request_queues();
        let context = ServerContext::new(
            Arc::new(Registry::new()),
            Arc::new(CredentialStore::new(&config.credentials)),
            outbound_queue,
        );

        Ok(Server {
            listener,
            context,
            router,
            queues,
            outbound,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn context(&self) -> &ServerContext {
        &self.context
    }

    /// Runs until Ctrl+C.
    pub async fn run(self) -> io::Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Unable to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Runs until `shutdown` resolves, then disconnects every client.
    pub async fn run_until<F>(self, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()>,
    {
        let Server {
            listener,
            context,
            router,
            queues,
            outbound,
        } = self;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut tasks = vec![tokio::spawn(run_dispatcher(
            Arc::clone(&context.registry),
            outbound,
        ))];
        let RequestQueues {
            login,
            newuser,
            send,
            logout,
        } = queues;
        tasks.push(tokio::spawn(run_processor("login", context.clone(), login, process_login)));
        tasks.push(tokio::spawn(run_processor("newuser", context.clone(), newuser, process_newuser)));
        tasks.push(tokio::spawn(run_processor("send", context.clone(), send, process_send)));
        tasks.push(tokio::spawn(run_processor("logout", context.clone(), logout, process_logout)));

        info!("Server started successfully");

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let context = context.clone();
                        let router = router.clone();
                        let shutdown = shutdown_rx.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, addr, context, router, shutdown).await {
                                warn!("Connection from {} failed: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => error!("Failed to accept connection: {}", e),
                },
                _ = &mut shutdown => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        info!("Disconnecting all clients...");
        let _ = shutdown_tx.send(true);
        let disconnected = context.registry.drain();
        info!("Disconnected {} clients", disconnected.len());
        drop(disconnected);

        for task in tasks {
            task.abort();
        }
        Ok(())
    }
}

/// Upgrades one TCP stream and serves it until either side closes.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    context: ServerContext,
    router: RequestRouter,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ChatError> {
    let websocket = tokio_tungstenite::accept_async(stream).await?;
    let (mut sink, mut frames) = websocket.split();

    let (outbox, mut outbox_rx) = mpsc::unbounded_channel::<WireMessage>();
    let id = context.registry.register(outbox).id();
    info!("Client {} connected from {}", id, addr);

    let mut writer = tokio::spawn(async move {
        while let Some(message) = outbox_rx.recv().await {
            let text = match message.to_json() {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to encode message for connection {}: {}", id, e);
                    continue;
                }
            };
            if let Err(e) = sink.send(Message::Text(text.into())).await {
                error!("Failed to write to connection {}: {}", id, e);
                break;
            }
        }
        let _ = sink.close().await;
    });

    if let Err(e) = context.outbound.notice(id, WELCOME_NOTICE) {
        error!("Unable to welcome connection {}: {}", id, e);
    }

    loop {
        tokio::select! {
            frame = frames.next() => match frame {
                Some(Ok(Message::Text(text))) => match route_frame(&context, &router, id, &text) {
                    Ok(command) => debug!("Connection {} queued {}", id, command),
                    Err(e) => warn!("Dropping frame from connection {}: {}", id, e),
                },
                Some(Ok(Message::Binary(_))) => warn!("Ignoring binary frame from connection {}", id),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Failed to read from connection {}: {}", id, e);
                    break;
                }
            },
            _ = shutdown.changed() => break,
        }
    }

    context.registry.remove(id);
    if timeout(WRITER_GRACE, &mut writer).await.is_err() {
        writer.abort();
    }
    info!("Client {} disconnected", id);
    Ok(())
}

/// Decodes one text frame and hands it to the matching request queue.
pub fn route_frame(
    context: &ServerContext,
    router: &RequestRouter,
    id: ConnectionId,
    text: &str,
) -> Result<Command, ChatError> {
    let message = WireMessage::from_json(text)?;
    let sender = context
        .registry
        .lookup(id)
        .ok_or(ChatError::UnknownConnection(id))?;
    router.route(Request { sender, message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn context(dir: &TempDir) -> (ServerContext, OutboundReceiver) {
        let (queue, outbound) = OutboundQueue::new();
        let context = ServerContext::new(
            Arc::new(Registry::new()),
            Arc::new(CredentialStore::new(dir.path().join("users.txt"))),
            queue,
        );
        (context, outbound)
    }

    #[test]
    fn test_route_frame_classifies_by_command() {
        let dir = TempDir::new().unwrap();
        let (context, _outbound) = context(&dir);
        let (router, mut queues) = request_queues();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = context.registry.register(tx).id();

        let command = route_frame(
            &context,
            &router,
            id,
            r#"{"Command":"send","Body":"hi","Client":{"Handle":"","Pass":""}}"#,
        )
        .unwrap();

        assert_eq!(command, Command::Send);
        let request = queues.send.try_recv().unwrap();
        assert_eq!(request.sender.id(), id);
        assert_eq!(request.message.body, "hi");
    }

    #[test]
    fn test_route_frame_rejects_malformed_json() {
        let dir = TempDir::new().unwrap();
        let (context, _outbound) = context(&dir);
        let (router, _queues) = request_queues();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = context.registry.register(tx).id();

        let result = route_frame(&context, &router, id, "{not json");
        assert!(matches!(result, Err(ChatError::Malformed(_))));
    }

    #[test]
    fn test_route_frame_rejects_unknown_command_and_connection() {
        let dir = TempDir::new().unwrap();
        let (context, _outbound) = context(&dir);
        let (router, _queues) = request_queues();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = context.registry.register(tx).id();

        let unknown = route_frame(&context, &router, id, r#"{"Command":"shout","Body":"x"}"#);
        assert!(matches!(unknown, Err(ChatError::UnrecognizedCommand(_))));

        let missing = route_frame(&context, &router, id + 1, r#"{"Command":"send"}"#);
        assert!(matches!(missing, Err(ChatError::UnknownConnection(_))));
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let dir = TempDir::new().unwrap();
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            credentials: dir.path().join("users.txt"),
        };

        let server = Server::bind(&config).await.unwrap();

        assert_ne!(server.local_addr().unwrap().port(), 0);
        assert!(server.context().registry.is_empty());
    }
}
