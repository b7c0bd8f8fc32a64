use clap::Parser;
use log::info;
use server::config::ServerConfig;
use server::network::Server;
use std::path::PathBuf;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, env = "CHAT_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, env = "CHAT_PORT", default_value_t = shared::DEFAULT_PORT)]
    port: u16,

    /// Credential file holding one `handle,password` record per line
    #[arg(short, long, env = "CHAT_CREDENTIALS", default_value = "users.txt")]
    credentials: PathBuf,
}

/// Parses arguments, binds the listener and serves until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        credentials: args.credentials,
    };

    info!("Starting server...");
    info!("Credential store: {}", config.credentials.display());

    let server = Server::bind(&config).await?;
    server.run().await?;

    info!("Server stopped");
    Ok(())
}
