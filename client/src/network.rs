use crate::display::render;
use crate::input::{interpret, InputAction};
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::WireMessage;
use std::error::Error;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Console chat client bound to one server connection
pub struct Client {
    websocket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Client {
    /// Opens the WebSocket connection to `server_url`.
    pub async fn connect(server_url: &str) -> Result<Self, Box<dyn Error>> {
        info!("Connecting to server at {}", server_url);
        let (websocket, _response) = connect_async(server_url).await?;
        info!("Connected to {}", server_url);

        Ok(Client { websocket })
    }

    /// Runs an interactive session on stdin/stdout.
    pub async fn run(self) -> Result<(), Box<dyn Error>> {
        let input = BufReader::new(tokio::io::stdin());
        let mut output = std::io::stdout();
        self.run_with(input, &mut output).await
    }

    /// Pumps console lines to the server and server messages to `output`.
    ///
    /// When `input` reaches end of file the client sends a Close frame and
    /// keeps printing until the server finishes the closing handshake.
    /// The session also ends when the server closes first.
    pub async fn run_with<R, W>(self, input: R, output: &mut W) -> Result<(), Box<dyn Error>>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let (mut sink, mut frames) = self.websocket.split();
        let mut lines = input.lines();
        let mut closing = false;

        loop {
            tokio::select! {
                line = lines.next_line(), if !closing => match line? {
                    Some(line) => match interpret(&line) {
                        InputAction::Send(message) => {
                            debug!("Sending {} request", message.command);
                            sink.send(Message::Text(message.to_json()?.into())).await?;
                        }
                        InputAction::Print(text) => {
                            for line in text {
                                writeln!(output, "{}", line)?;
                            }
                            output.flush()?;
                        }
                        InputAction::Ignore => {}
                    },
                    None => {
                        info!("Input closed, disconnecting");
                        closing = true;
                        if let Err(e) = sink.close().await {
                            warn!("Failed to close connection: {}", e);
                            break;
                        }
                    }
                },
                frame = frames.next() => match frame {
                    Some(Ok(Message::Text(text))) => match WireMessage::from_json(&text) {
                        Ok(message) => {
                            writeln!(output, "{}", render(&message))?;
                            output.flush()?;
                        }
                        Err(e) => warn!("Ignoring malformed message from server: {}", e),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Server closed the connection");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        if closing {
                            debug!("Connection ended while closing: {}", e);
                            break;
                        }
                        error!("Connection error: {}", e);
                        return Err(e.into());
                    }
                },
            }
        }

        Ok(())
    }
}
