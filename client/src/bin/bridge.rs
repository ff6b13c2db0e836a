//! Standalone bridge process: relays stdin to the server and server bytes to
//! stdout, reconnecting on its own. Log output goes to stderr.

use clap::Parser;
use client::bridge::{Bridge, BridgeEvent, BridgeHandle};
use client::config::{BridgeConfig, DEFAULT_CONFIG_PATH};
use log::{info, warn};
use std::io::ErrorKind;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bridge config file with the server host and port
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,
}

async fn pump_stdin(handle: BridgeHandle) {
    let mut stdin = tokio::io::stdin();
    let mut buf = vec![0u8; 8192];

    loop {
        match stdin.read(&mut buf).await {
            Ok(0) => {
                info!("Input closed");
                return;
            }
            Ok(n) => handle.send(buf[..n].to_vec()),
            Err(e) => {
                warn!("Failed to read input: {}", e);
                return;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let config = BridgeConfig::load_or_default(&args.config);
    info!("Bridging stdio to {}", config.addr());

    let (handle, mut events) = Bridge::spawn(config);
    let mut stdin_task = tokio::spawn(pump_stdin(handle));
    let mut stdout = tokio::io::stdout();

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(BridgeEvent::Data(bytes)) => {
                        let written = match stdout.write_all(&bytes).await {
                            Ok(()) => stdout.flush().await,
                            Err(e) => Err(e),
                        };
                        if let Err(e) = written {
                            // The reader went away; keep the connection alive regardless
                            if e.kind() == ErrorKind::BrokenPipe {
                                warn!("Output closed, dropped {} bytes", bytes.len());
                            } else {
                                warn!("Failed to write output: {}", e);
                            }
                        }
                    }
                    Some(BridgeEvent::Connecting { attempt }) => {
                        info!("Connecting (attempt {})", attempt);
                    }
                    Some(BridgeEvent::Connected) => info!("Connected"),
                    Some(BridgeEvent::Disconnected) => info!("Disconnected"),
                    None => break,
                }
            }

            _ = &mut stdin_task => {
                break;
            }
        }
    }

    Ok(())
}
