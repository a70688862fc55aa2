use clap::Parser;
use client::network::Client;
use log::{error, info};
use macroquad::window::Conf;
use shared::{DEFAULT_PORT, SCREEN_HEIGHT, SCREEN_WIDTH};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Relay server address to connect to
    #[arg(short = 's', long, default_value_t = format!("127.0.0.1:{}", DEFAULT_PORT))]
    server: String,

    /// Simulate network latency in milliseconds (split between both directions)
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,
}

fn window_conf() -> Conf {
    Conf {
        window_title: "Pong".to_owned(),
        window_width: SCREEN_WIDTH as i32,
        window_height: SCREEN_HEIGHT as i32,
        window_resizable: false,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    info!("Starting client...");
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }
    info!("Controls: W/S or Up/Down to move, Space for rematch, G for the sync graph, Escape to quit");

    let mut client = match Client::new(&args.server, args.fake_ping) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to connect to {}: {}", args.server, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = client.run().await {
        error!("Client stopped: {}", e);
        std::process::exit(1);
    }
}
