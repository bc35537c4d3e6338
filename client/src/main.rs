use clap::Parser;
use client::network::Client;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:3000")]
    server: String,

    /// Join the lobby under this nickname as soon as the connection is up
    #[arg(short = 'n', long)]
    nickname: Option<String>,

    /// Room code sent with the automatic join
    #[arg(short = 'c', long)]
    room_code: Option<String>,

    /// How many times to retry a failed or lost connection
    #[arg(short = 'r', long, default_value = "5")]
    reconnect_attempts: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    info!("Connecting to: {}", args.server);

    let mut client = Client::new(&args.server, args.reconnect_attempts);
    if let Some(nickname) = args.nickname {
        client = client.with_auto_join(nickname, args.room_code);
    }

    client.run().await?;

    Ok(())
}
