use clap::Parser;
use client::bridge::{Bridge, BridgeEvent, BridgeHandle};
use client::config::{BridgeConfig, DEFAULT_CONFIG_PATH};
use client::game::ClientWorld;
use client::network::NetworkManager;
use log::{debug, info, warn};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval, MissedTickBehavior};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bridge config file with the server host and port
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Player name sent with LOGIN
    #[arg(short = 'n', long, default_value = "Player")]
    name: String,

    /// Frames per second of the local update loop
    #[arg(short = 'f', long, default_value_t = 60)]
    fps: u32,
}

#[derive(Debug, PartialEq)]
enum Command {
    Move(f32, f32),
    Attack(u32),
    Spawn { sprite_id: u16, name: String },
    Pickup(u32),
    Who,
    Chat(String),
}

fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if !line.starts_with('/') {
        return Some(Command::Chat(line.to_string()));
    }

    let mut parts = line.split_whitespace();
    let command = parts.next()?;
    match command {
        "/move" => {
            let x = parts.next()?.parse().ok()?;
            let y = parts.next()?.parse().ok()?;
            Some(Command::Move(x, y))
        }
        "/attack" => Some(Command::Attack(parts.next()?.parse().ok()?)),
        "/spawn" => {
            let sprite_id = parts.next()?.parse().ok()?;
            let name = parts.collect::<Vec<_>>().join(" ");
            if name.is_empty() {
                return None;
            }
            Some(Command::Spawn { sprite_id, name })
        }
        "/pickup" => Some(Command::Pickup(parts.next()?.parse().ok()?)),
        "/who" => Some(Command::Who),
        _ => None,
    }
}

fn run_command(
    command: Command,
    network: &mut NetworkManager<BridgeHandle>,
    world: &mut ClientWorld,
) {
    match command {
        Command::Move(x, y) => {
            world.move_local(x, y);
            network.send_move(x, y);
        }
        Command::Attack(target_id) => network.attack(target_id),
        Command::Spawn { sprite_id, name } => {
            let (x, y) = world.local_position;
            world.items.add_placeholder(x, y, sprite_id, &name);
            network.spawn_item(x, y, sprite_id, &name);
        }
        Command::Pickup(item_id) => network.pickup_item(item_id),
        Command::Who => {
            for entity in world.remote.iter() {
                info!(
                    "Entity {} at ({:.1}, {:.1})",
                    entity.id, entity.current_x, entity.current_y
                );
            }
            for item in world.items.iter() {
                info!("Item {} {} at ({:.1}, {:.1})", item.id, item.name, item.x, item.y);
            }
        }
        Command::Chat(message) => network.send_chat(&message),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let config = BridgeConfig::load_or_default(&args.config);

    info!("Starting client as {}", args.name);
    info!("Commands: /move X Y, /attack ID, /spawn SPRITE NAME, /pickup ID, /who");
    info!("Any other line is sent as chat");

    let (handle, mut events) = Bridge::spawn(config);
    let mut network = NetworkManager::new(handle);
    let mut world = ClientWorld::new();

    // Written ahead of queued input on every connection
    network.set_login(&args.name);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let mut frame = interval(Duration::from_secs(1) / args.fps.max(1));
    frame.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(BridgeEvent::Data(bytes)) => {
                        network.receive(&bytes, &mut world);
                    }
                    Some(BridgeEvent::Connected) => {
                        debug!("Connected, login sent");
                    }
                    Some(BridgeEvent::Disconnected) => {
                        if world.is_logged_in() {
                            warn!("Connection lost, waiting to reconnect");
                        }
                        network.reset();
                        world.reset();
                    }
                    Some(BridgeEvent::Connecting { attempt }) => {
                        debug!("Connect attempt {}", attempt);
                    }
                    None => break,
                }
            }

            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => match parse_command(&line) {
                        Some(command) => run_command(command, &mut network, &mut world),
                        None => {
                            if !line.trim().is_empty() {
                                warn!("Unrecognized command: {}", line.trim());
                            }
                        }
                    },
                    Ok(None) => {
                        info!("Input closed, shutting down");
                        break;
                    }
                    Err(e) => {
                        warn!("Failed to read input: {}", e);
                        stdin_open = false;
                    }
                }
            }

            _ = frame.tick() => {
                world.update(Instant::now());
                for hit in world.drain_damage() {
                    if Some(hit.target_id) == world.player_id {
                        info!("You took {} damage", hit.amount);
                    } else {
                        info!("Entity {} took {} damage", hit.target_id, hit.amount);
                    }
                }
            }
        }
    }

    let stats = network.stats();
    info!(
        "Sent {} packets, received {}",
        stats.packets_sent, stats.packets_received
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_chat() {
        assert_eq!(
            parse_command("  hello there "),
            Some(Command::Chat("hello there".to_string()))
        );
        assert_eq!(parse_command("   "), None);
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("/move 1.5 -2"), Some(Command::Move(1.5, -2.0)));
        assert_eq!(parse_command("/attack 7"), Some(Command::Attack(7)));
        assert_eq!(parse_command("/pickup 3"), Some(Command::Pickup(3)));
        assert_eq!(parse_command("/who"), Some(Command::Who));
        assert_eq!(
            parse_command("/spawn 4 Rusty Sword"),
            Some(Command::Spawn {
                sprite_id: 4,
                name: "Rusty Sword".to_string()
            })
        );
    }

    #[test]
    fn test_bad_commands_rejected() {
        assert_eq!(parse_command("/move 1"), None);
        assert_eq!(parse_command("/attack bob"), None);
        assert_eq!(parse_command("/spawn 4"), None);
        assert_eq!(parse_command("/dance"), None);
    }
}
