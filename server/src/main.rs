use clap::Parser;
use log::info;
use server::config::ServerConfig;
use server::network::Server;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = shared::DEFAULT_HOST)]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,

    /// Milliseconds between entity broadcasts
    #[arg(short, long, default_value = "50")]
    tick_ms: u64,

    /// World seed sent to every client
    #[arg(short, long, default_value = "1337")]
    seed: u32,

    /// Only send players within this distance of each recipient
    #[arg(long)]
    interest_radius: Option<f32>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = ServerConfig {
        tick_interval: Duration::from_millis(args.tick_ms),
        world_seed: args.seed,
        interest_radius: args.interest_radius,
        ..ServerConfig::default()
    };

    let address = format!("{}:{}", args.host, args.port);
    info!(
        "Starting server on {} ({} Hz)",
        address,
        1000 / config.effective_tick_interval().as_millis()
    );

    let server = Server::bind(&address, config).await?;

    tokio::select! {
        result = server.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
