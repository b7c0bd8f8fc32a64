//! Integration tests for the chat server and client
//!
//! These tests run a real server on an ephemeral port and talk to it over
//! WebSocket connections.

use futures::future::join_all;
use futures::{SinkExt, StreamExt};
use server::config::ServerConfig;
use server::network::Server;
use server::processors::{
    HANDLE_TAKEN, LOGIN_REJECTED, LOGIN_SUCCESS, LOGOUT_SUCCESS, NOT_LOGGED_IN, UNAUTHORIZED,
    WELCOME_NOTICE,
};
use shared::{Command, WireMessage, SERVER_HANDLE};
use std::net::SocketAddr;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Connection = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECEIVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Running server plus the handles needed to stop it
struct TestServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<std::io::Result<()>>,
    dir: TempDir,
}

impl TestServer {
    async fn start() -> Self {
        let dir = TempDir::new().unwrap();
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            credentials: dir.path().join("users.txt"),
        };

        let server = Server::bind(&config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let (shutdown, stop) = oneshot::channel::<()>();
        let task = tokio::spawn(server.run_until(async {
            let _ = stop.await;
        }));

        TestServer {
            addr,
            shutdown: Some(shutdown),
            task,
            dir,
        }
    }

    fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Connects and consumes the welcome notice.
    async fn connect(&self) -> Connection {
        let (mut connection, _) = connect_async(self.url()).await.unwrap();
        let welcome = next_message(&mut connection).await;
        assert_eq!(welcome.client.handle, SERVER_HANDLE);
        assert_eq!(welcome.body, WELCOME_NOTICE);
        connection
    }

    async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        timeout(RECEIVE_TIMEOUT, self.task)
            .await
            .expect("Server did not stop in time")
            .unwrap()
            .unwrap();
    }
}

async fn send_request(connection: &mut Connection, command: Command, handle: &str, pass: &str, body: &str) {
    let mut message = WireMessage::request(command, body);
    message.client.handle = handle.to_string();
    message.client.pass = pass.to_string();
    connection
        .send(Message::Text(message.to_json().unwrap().into()))
        .await
        .unwrap();
}

async fn next_message(connection: &mut Connection) -> WireMessage {
    loop {
        let frame = timeout(RECEIVE_TIMEOUT, connection.next())
            .await
            .expect("Timed out waiting for a message")
            .expect("Connection closed")
            .expect("Connection error");
        if let Message::Text(text) = frame {
            return WireMessage::from_json(&text).unwrap();
        }
    }
}

async fn expect_notice(connection: &mut Connection, body: &str) {
    let message = next_message(connection).await;
    assert_eq!(message.client.handle, SERVER_HANDLE);
    assert_eq!(message.body, body);
}

async fn register_and_login(connection: &mut Connection, handle: &str, pass: &str) {
    send_request(connection, Command::NewUser, handle, pass, "").await;
    expect_notice(connection, &format!("Welcome {}! Use 'login' to continue.", handle)).await;
    send_request(connection, Command::Login, handle, pass, "").await;
    expect_notice(connection, LOGIN_SUCCESS).await;
}

/// WIRE PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// Outbound envelopes use the capitalized field names and never carry a password
    #[test]
    fn outbound_wire_shape() {
        let json = WireMessage::outbound("alice", "hi").to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["Body"], "hi");
        assert_eq!(value["Client"]["Handle"], "alice");
        assert!(value["Client"].get("Pass").is_none());
        assert!(value.get("Command").is_none());
    }

    /// Requests from other clients may omit the Client block entirely
    #[test]
    fn request_without_client_block() {
        let message = WireMessage::from_json(r#"{"Command":"login","Body":"bob pass1"}"#).unwrap();
        let credentials = message.credentials();

        assert_eq!(message.command(), Command::Login);
        assert_eq!(credentials.handle, "bob");
        assert_eq!(credentials.pass, "pass1");
    }
}

/// END-TO-END SERVER TESTS
mod server_tests {
    use super::*;

    #[tokio::test]
    async fn welcome_notice_on_connect() {
        let server = TestServer::start().await;
        let _connection = server.connect().await;
        server.stop().await;
    }

    /// Registered users broadcast to every connection, authenticated or not
    #[tokio::test]
    async fn register_login_and_broadcast() {
        let server = TestServer::start().await;
        let mut alice = server.connect().await;
        let mut watcher = server.connect().await;

        register_and_login(&mut alice, "alice", "pass1").await;
        send_request(&mut alice, Command::Send, "", "", "hi").await;

        for connection in [&mut alice, &mut watcher] {
            let message = next_message(connection).await;
            assert_eq!(message.body, "hi");
            assert_eq!(message.client.handle, "alice");
        }

        let stored = std::fs::read_to_string(server.dir.path().join("users.txt")).unwrap();
        assert!(stored.lines().any(|line| line == "alice,pass1"));

        server.stop().await;
    }

    #[tokio::test]
    async fn send_requires_login() {
        let server = TestServer::start().await;
        let mut connection = server.connect().await;

        send_request(&mut connection, Command::Send, "", "", "hello?").await;
        expect_notice(&mut connection, UNAUTHORIZED).await;

        send_request(&mut connection, Command::Logout, "", "", "").await;
        expect_notice(&mut connection, NOT_LOGGED_IN).await;

        server.stop().await;
    }

    /// Only the first failing validation is reported
    #[tokio::test]
    async fn registration_validation() {
        let server = TestServer::start().await;
        let mut connection = server.connect().await;
        let long_handle = "h".repeat(33);

        send_request(&mut connection, Command::NewUser, &long_handle, "x", "").await;
        let message = next_message(&mut connection).await;
        assert!(message.body.contains("Handle"));

        send_request(&mut connection, Command::NewUser, "bob", "toolongpass", "").await;
        let message = next_message(&mut connection).await;
        assert!(message.body.contains("Pass"));

        send_request(&mut connection, Command::NewUser, "bob", "pass1", "").await;
        expect_notice(&mut connection, "Welcome bob! Use 'login' to continue.").await;

        send_request(&mut connection, Command::NewUser, "bob", "other", "").await;
        expect_notice(&mut connection, HANDLE_TAKEN).await;

        send_request(&mut connection, Command::Login, "bob", "other", "").await;
        expect_notice(&mut connection, LOGIN_REJECTED).await;

        server.stop().await;
    }

    /// Logout and send travel through different queues, so either may win
    #[tokio::test]
    async fn logout_send_race_has_two_outcomes() {
        let server = TestServer::start().await;
        let mut connection = server.connect().await;
        register_and_login(&mut connection, "carol", "pass1").await;

        send_request(&mut connection, Command::Logout, "", "", "").await;
        send_request(&mut connection, Command::Send, "", "", "bye").await;

        let first = next_message(&mut connection).await;
        let second = next_message(&mut connection).await;
        let bodies = [first.body.as_str(), second.body.as_str()];

        assert!(bodies.contains(&LOGOUT_SUCCESS));
        assert!(bodies.contains(&"bye") || bodies.contains(&UNAUTHORIZED));

        server.stop().await;
    }

    #[tokio::test]
    async fn shutdown_disconnects_clients() {
        let server = TestServer::start().await;
        let mut connection = server.connect().await;

        server.stop().await;

        let closed = timeout(RECEIVE_TIMEOUT, async {
            loop {
                match connection.next().await {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        })
        .await;
        assert!(closed.is_ok(), "Client was not disconnected");
    }

    /// Simultaneous registrations of one handle produce exactly one record
    #[tokio::test]
    async fn concurrent_newuser_same_handle() {
        let server = TestServer::start().await;
        let mut connections = Vec::new();
        for _ in 0..4 {
            connections.push(server.connect().await);
        }

        join_all(
            connections
                .iter_mut()
                .map(|connection| send_request(connection, Command::NewUser, "zed", "pass1", "")),
        )
        .await;

        let mut bodies = Vec::new();
        for connection in connections.iter_mut() {
            let message = next_message(connection).await;
            assert_eq!(message.client.handle, SERVER_HANDLE);
            bodies.push(message.body);
        }
        let welcomed = bodies
            .iter()
            .filter(|body| body.as_str() == "Welcome zed! Use 'login' to continue.")
            .count();
        let taken = bodies.iter().filter(|body| body.as_str() == HANDLE_TAKEN).count();
        assert_eq!(welcomed, 1);
        assert_eq!(taken, 3);

        let stored = std::fs::read_to_string(server.dir.path().join("users.txt")).unwrap();
        assert_eq!(stored.lines().filter(|line| line.starts_with("zed,")).count(), 1);

        server.stop().await;
    }

    /// A different connection sharing the store sees registrations immediately
    #[tokio::test]
    async fn credentials_shared_across_connections() {
        let server = TestServer::start().await;
        let mut first = server.connect().await;
        let mut second = server.connect().await;

        send_request(&mut first, Command::NewUser, "dave", "pass1", "").await;
        expect_notice(&mut first, "Welcome dave! Use 'login' to continue.").await;

        send_request(&mut second, Command::Login, "dave", "pass1", "").await;
        expect_notice(&mut second, LOGIN_SUCCESS).await;

        server.stop().await;
    }
}

/// CONSOLE CLIENT TESTS
mod client_tests {
    use super::*;
    use client::network::Client;
    use shared::{HELP_HINT, HELP_LINES};
    use tokio::io::BufReader;

    /// Drives the console client with scripted input until end of file
    #[tokio::test]
    async fn scripted_console_session() {
        let server = TestServer::start().await;
        let client = Client::connect(&server.url()).await.unwrap();

        let input = tokio_test::io::Builder::new()
            .read(b"help\n")
            .read(b"dance\n")
            .read(b"newuser erin pass1\n")
            .wait(Duration::from_millis(200))
            .read(b"login erin pass1\n")
            .wait(Duration::from_millis(200))
            .read(b"send hello\n")
            .wait(Duration::from_millis(300))
            .build();
        let mut output = Vec::new();

        timeout(
            Duration::from_secs(10),
            client.run_with(BufReader::new(input), &mut output),
        )
        .await
        .expect("Client did not finish")
        .unwrap();

        let printed = String::from_utf8(output).unwrap();
        assert!(printed.contains(&format!("{}: {}", SERVER_HANDLE, WELCOME_NOTICE)));
        assert!(printed.contains(HELP_LINES[0]));
        assert!(printed.contains(HELP_HINT));
        assert!(printed.contains(&format!("{}: {}", SERVER_HANDLE, LOGIN_SUCCESS)));
        assert!(printed.contains("erin: hello"));

        server.stop().await;
    }

    /// The client stops when the server goes away first
    #[tokio::test]
    async fn client_ends_when_server_stops() {
        let server = TestServer::start().await;
        let client = Client::connect(&server.url()).await.unwrap();
        let (input, _keep_open) = tokio::io::duplex(64);
        let mut output = Vec::new();

        let session = client.run_with(BufReader::new(input), &mut output);
        let stop = async {
            sleep(Duration::from_millis(100)).await;
            server.stop().await;
        };

        let (result, ()) = timeout(RECEIVE_TIMEOUT, async { tokio::join!(session, stop) })
            .await
            .expect("Client did not stop");
        assert!(result.is_ok(), "Client session failed: {:?}", result.err());
        assert!(String::from_utf8(output).unwrap().contains(WELCOME_NOTICE));
    }
}
