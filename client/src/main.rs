use clap::Parser;
use client::network::Client;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket URL of the chat server
    #[arg(short = 's', long, env = "CHAT_SERVER", default_value = "ws://127.0.0.1:11631")]
    server: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    let client = Client::connect(&args.server).await?;
    println!("{}", shared::HELP_HINT);

    client.run().await?;

    info!("Client stopped");
    Ok(())
}
