use clap::Parser;
use log::{error, info, warn};
use server::network::Server;
use server::session::{HandshakeMode, RelayConfig};
use server::utils::lan_ip;
use shared::{DEFAULT_PORT, SCREEN_HEIGHT, SCREEN_WIDTH};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Field width sent to clients
    #[arg(long, default_value_t = SCREEN_WIDTH)]
    width: u32,

    /// Field height sent to clients
    #[arg(long, default_value_t = SCREEN_HEIGHT)]
    height: u32,

    /// When clients receive their role
    #[arg(long, value_enum, default_value_t = HandshakeMode::Rendezvous)]
    handshake: HandshakeMode,

    /// Delay between the start signal and relaying gameplay traffic
    #[arg(long, default_value = "1000")]
    settle_ms: u64,

    /// Per-connection queue capacity, in lines
    #[arg(long, default_value = "256")]
    outbox: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stdout)
        .init();

    let args = Args::parse();

    let config = RelayConfig {
        width: args.width,
        height: args.height,
        handshake: args.handshake,
        settle_delay: Duration::from_millis(args.settle_ms),
        outbox_capacity: args.outbox,
        ..RelayConfig::default()
    };

    let address = format!("{}:{}", args.host, args.port);
    let server = match Server::bind(&address, config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to bind {}: {}", address, e);
            return Err(e.into());
        }
    };

    match lan_ip() {
        Some(ip) => info!("Players on the LAN can connect to {}:{}", ip, args.port),
        None => warn!("Could not determine a LAN address"),
    }
    info!("Handshake mode: {:?}", args.handshake);

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    Ok(())
}
