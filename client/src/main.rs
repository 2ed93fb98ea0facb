mod engine;
mod input;
mod interpolation;
mod prediction;
mod reconciliation;
mod scheduler;
mod network;

use clap::Parser;
use log::info;
use shared::SyncConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    /// Simulation tick rate in Hz
    #[arg(short = 't', long, default_value = "60")]
    tick_rate: u32,

    /// How aggressively rendered remote state chases the network target
    #[arg(short = 'i', long, default_value = "5.0")]
    interpolation_speed: f32,

    /// Minimum milliseconds between outbound move packets
    #[arg(long, default_value = "50")]
    send_rate: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = SyncConfig {
        tick_rate_hz: args.tick_rate,
        interpolation_speed: args.interpolation_speed,
        network_send_rate_ms: args.send_rate,
        ..Default::default()
    };

    info!("Starting sync client...");
    info!("Connecting to: {}", args.server);
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }
    info!(
        "Tick rate: {}Hz, interpolation speed: {}, send rate: {}ms",
        config.tick_rate_hz, config.interpolation_speed, config.network_send_rate_ms
    );

    let mut client = network::Client::new(&args.server, config, args.fake_ping).await?;

    let result = client.run().await;
    client.shutdown().await;

    result
}
