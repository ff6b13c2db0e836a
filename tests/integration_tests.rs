//! Integration tests for networked multiplayer components
//!
//! These tests run a real server on a loopback port and talk to it through
//! framed TCP clients and through the client-side bridge.

use bytes::Bytes;
use client::bridge::{Bridge, BridgeEvent};
use client::config::BridgeConfig;
use client::game::ClientWorld;
use client::network::NetworkManager;
use futures::{SinkExt, StreamExt};
use server::config::ServerConfig;
use server::network::Server;
use shared::{decode_all, ChatSender, ClientPacket, EntityState, FrameCodec, Packet, ServerPacket};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep, timeout};
use tokio_util::codec::Framed;

const WAIT: Duration = Duration::from_secs(5);

async fn start_server() -> SocketAddr {
    let config = ServerConfig {
        tick_interval: Duration::from_millis(20),
        ..ServerConfig::default()
    };
    let server = Server::bind("127.0.0.1:0", config).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

/// Raw framed connection speaking the wire protocol directly
struct TestClient {
    framed: Framed<TcpStream, FrameCodec>,
    pending: Vec<ServerPacket>,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        Self {
            framed: Framed::new(stream, FrameCodec),
            pending: Vec::new(),
        }
    }

    async fn send(&mut self, packet: ClientPacket) {
        self.framed
            .send(Bytes::from(packet.encode().unwrap()))
            .await
            .unwrap();
    }

    async fn next_packet(&mut self) -> ServerPacket {
        loop {
            if !self.pending.is_empty() {
                return self.pending.remove(0);
            }
            let frame = timeout(WAIT, self.framed.next())
                .await
                .expect("timed out waiting for a packet")
                .expect("server closed the connection")
                .unwrap();
            let outcome = decode_all::<ServerPacket>(&frame);
            assert!(outcome.error.is_none(), "malformed frame: {:?}", outcome.error);
            self.pending.extend(outcome.packets);
        }
    }

    /// Skips packets until one matches
    async fn expect<T>(&mut self, mut pick: impl FnMut(ServerPacket) -> Option<T>) -> T {
        loop {
            if let Some(found) = pick(self.next_packet().await) {
                return found;
            }
        }
    }

    async fn login(&mut self, name: &str) -> u32 {
        self.send(ClientPacket::Login {
            name: name.to_string(),
        })
        .await;
        self.expect(|packet| match packet {
            ServerPacket::LoginAck { player_id, .. } => Some(player_id),
            _ => None,
        })
        .await
    }

    async fn expect_snapshot(
        &mut self,
        mut accept: impl FnMut(&[EntityState]) -> bool,
    ) -> Vec<EntityState> {
        self.expect(|packet| match packet {
            ServerPacket::EntityUpdate { entities } if accept(entities.as_slice()) => {
                Some(entities)
            }
            _ => None,
        })
        .await
    }
}

fn find(entities: &[EntityState], id: u32) -> Option<EntityState> {
    entities.iter().copied().find(|entity| entity.id == id)
}

/// SESSION TESTS
mod session_tests {
    use super::*;

    #[tokio::test]
    async fn login_ack_carries_world_and_spawn() {
        let addr = start_server().await;
        let mut client = TestClient::connect(addr).await;

        client
            .send(ClientPacket::Login {
                name: "Alice".to_string(),
            })
            .await;
        let ack = client
            .expect(|packet| match packet {
                ack @ ServerPacket::LoginAck { .. } => Some(ack),
                _ => None,
            })
            .await;

        assert_eq!(
            ack,
            ServerPacket::LoginAck {
                player_id: 1,
                world_seed: 1337,
                spawn_x: 400.0,
                spawn_y: 300.0,
            }
        );
    }

    #[tokio::test]
    async fn session_ids_are_unique_and_increasing() {
        let addr = start_server().await;
        let mut a = TestClient::connect(addr).await;
        let mut b = TestClient::connect(addr).await;

        let first = a.login("A").await;
        let second = b.login("B").await;

        assert_ne!(first, 0);
        assert!(second > first);
    }

    #[tokio::test]
    async fn snapshot_lists_every_session_with_latest_position() {
        let addr = start_server().await;
        let mut a = TestClient::connect(addr).await;
        let mut b = TestClient::connect(addr).await;
        let id_a = a.login("A").await;
        let id_b = b.login("B").await;

        a.send(ClientPacket::Move { x: 10.0, y: 20.0 }).await;
        a.send(ClientPacket::Move { x: 30.0, y: 40.0 }).await;
        b.send(ClientPacket::Move { x: -5.0, y: 7.5 }).await;

        let snapshot = b
            .expect_snapshot(|entities| {
                find(entities, id_a).map(|e| (e.x, e.y)) == Some((30.0, 40.0))
                    && find(entities, id_b).map(|e| (e.x, e.y)) == Some((-5.0, 7.5))
            })
            .await;
        assert_eq!(snapshot.len(), 2);
    }

    #[tokio::test]
    async fn disconnected_session_leaves_snapshot() {
        let addr = start_server().await;
        let mut a = TestClient::connect(addr).await;
        let mut b = TestClient::connect(addr).await;
        let id_a = a.login("A").await;
        let id_b = b.login("B").await;

        a.expect_snapshot(|entities| find(entities, id_b).is_some()).await;
        drop(b);

        let snapshot = a
            .expect_snapshot(|entities| find(entities, id_b).is_none())
            .await;
        assert!(find(&snapshot, id_a).is_some());
    }

    #[tokio::test]
    async fn login_split_across_writes() {
        let addr = start_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.set_nodelay(true).unwrap();

        let payload = ClientPacket::Login {
            name: "Slow".to_string(),
        }
        .encode()
        .unwrap();
        let mut bytes = (payload.len() as u32).to_le_bytes().to_vec();
        bytes.extend(payload);

        for byte in bytes {
            stream.write_all(&[byte]).await.unwrap();
            stream.flush().await.unwrap();
            sleep(Duration::from_millis(2)).await;
        }

        let mut client = TestClient {
            framed: Framed::new(stream, FrameCodec),
            pending: Vec::new(),
        };
        let id = client
            .expect(|packet| match packet {
                ServerPacket::LoginAck { player_id, .. } => Some(player_id),
                _ => None,
            })
            .await;
        assert_eq!(id, 1);
    }
}

/// GAMEPLAY TESTS
mod gameplay_tests {
    use super::*;

    #[tokio::test]
    async fn chat_reaches_everyone_including_sender() {
        let addr = start_server().await;
        let mut a = TestClient::connect(addr).await;
        let mut b = TestClient::connect(addr).await;
        let id_a = a.login("A").await;
        b.login("B").await;

        a.send(ClientPacket::Chat {
            message: "hello".to_string(),
        })
        .await;

        for client in [&mut a, &mut b] {
            let (sender, message) = client
                .expect(|packet| match packet {
                    ServerPacket::Chat { sender, message } => Some((sender, message)),
                    _ => None,
                })
                .await;
            assert_eq!(sender, ChatSender::Player(id_a));
            assert_eq!(message, "hello");
        }
    }

    #[tokio::test]
    async fn attack_broadcasts_damage_in_range() {
        let addr = start_server().await;
        let mut a = TestClient::connect(addr).await;
        let mut b = TestClient::connect(addr).await;
        a.login("A").await;
        let id_b = b.login("B").await;

        a.send(ClientPacket::Attack { target_id: id_b }).await;

        for client in [&mut a, &mut b] {
            let (target, amount) = client
                .expect(|packet| match packet {
                    ServerPacket::Damage { target_id, amount } => Some((target_id, amount)),
                    _ => None,
                })
                .await;
            assert_eq!(target, id_b);
            assert!((5..=15).contains(&amount));
        }
    }

    #[tokio::test]
    async fn spawned_item_gets_canonical_id_and_reaches_late_joiners() {
        let addr = start_server().await;
        let mut a = TestClient::connect(addr).await;
        a.login("A").await;

        a.send(ClientPacket::SpawnItem {
            x: 12.0,
            y: 34.0,
            sprite_id: 5,
            name: "Gem".to_string(),
        })
        .await;
        let item = a
            .expect(|packet| match packet {
                ServerPacket::SpawnItem(item) => Some(item),
                _ => None,
            })
            .await;
        assert_ne!(item.id, 0);
        assert_eq!(item.name, "Gem");

        // The replay follows the ack with nothing in between
        let mut late = TestClient::connect(addr).await;
        late.login("Late").await;
        assert_eq!(late.next_packet().await, ServerPacket::SpawnItem(item));
    }

    #[tokio::test]
    async fn item_pickup_is_idempotent() {
        let addr = start_server().await;
        let mut a = TestClient::connect(addr).await;
        let mut b = TestClient::connect(addr).await;
        a.login("A").await;
        b.login("B").await;

        a.send(ClientPacket::SpawnItem {
            x: 0.0,
            y: 0.0,
            sprite_id: 1,
            name: "Coin".to_string(),
        })
        .await;
        let item_id = b
            .expect(|packet| match packet {
                ServerPacket::SpawnItem(item) => Some(item.id),
                _ => None,
            })
            .await;

        a.send(ClientPacket::ItemPickup { item_id }).await;
        for client in [&mut a, &mut b] {
            let despawned = client
                .expect(|packet| match packet {
                    ServerPacket::ItemDespawn { item_id } => Some(item_id),
                    _ => None,
                })
                .await;
            assert_eq!(despawned, item_id);
        }

        // The second pickup must not produce another despawn before the marker
        b.send(ClientPacket::ItemPickup { item_id }).await;
        b.send(ClientPacket::Chat {
            message: "marker".to_string(),
        })
        .await;
        loop {
            match b.next_packet().await {
                ServerPacket::ItemDespawn { .. } => panic!("item despawned twice"),
                ServerPacket::Chat { message, .. } if message == "marker" => break,
                _ => {}
            }
        }
    }
}

/// CLIENT STACK TESTS
mod client_stack_tests {
    use super::*;

    #[tokio::test]
    async fn bridge_and_network_manager_mirror_the_world() {
        let addr = start_server().await;
        let config = BridgeConfig {
            host: "127.0.0.1".to_string(),
            port: addr.port(),
            reconnect_delay_ms: 50,
        };

        let (handle, mut events) = Bridge::spawn(config);
        let mut network = NetworkManager::new(handle);
        let mut world = ClientWorld::new();
        network.set_login("Bridged");

        let mut other = TestClient::connect(addr).await;
        let other_id = other.login("Other").await;
        other.send(ClientPacket::Move { x: 50.0, y: 60.0 }).await;

        let mirrored = timeout(WAIT, async {
            while let Some(event) = events.recv().await {
                if let BridgeEvent::Data(bytes) = event {
                    network.receive(&bytes, &mut world);
                }
                let seen = world
                    .remote
                    .get(other_id)
                    .map(|entity| (entity.target_x, entity.target_y));
                if world.is_logged_in() && seen == Some((50.0, 60.0)) {
                    return true;
                }
            }
            false
        })
        .await
        .expect("client never mirrored the other session");

        assert!(mirrored);
        assert_eq!(world.world_seed, Some(1337));
        let local_id = world.player_id.unwrap();
        assert!(!world.remote.contains(local_id));
        assert_eq!(network.stats().malformed_frames, 0);
    }

    async fn next_client_packet(framed: &mut Framed<TcpStream, FrameCodec>) -> ClientPacket {
        let frame = timeout(WAIT, framed.next())
            .await
            .expect("timed out waiting for a client packet")
            .expect("client closed the connection")
            .unwrap();
        let mut outcome = decode_all::<ClientPacket>(&frame);
        assert!(outcome.error.is_none(), "malformed frame: {:?}", outcome.error);
        assert_eq!(outcome.packets.len(), 1);
        outcome.packets.remove(0)
    }

    async fn wait_for(events: &mut UnboundedReceiver<BridgeEvent>, wanted: BridgeEvent) {
        timeout(WAIT, async {
            while let Some(event) = events.recv().await {
                if event == wanted {
                    return;
                }
            }
            panic!("bridge stopped before {:?}", wanted);
        })
        .await
        .expect("bridge event timed out");
    }

    #[tokio::test]
    async fn reconnect_logs_in_before_input_typed_offline() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = BridgeConfig {
            host: "127.0.0.1".to_string(),
            port: listener.local_addr().unwrap().port(),
            reconnect_delay_ms: 50,
        };

        let (handle, mut events) = Bridge::spawn(config);
        let mut network = NetworkManager::new(handle);
        network.set_login("P");

        let (first, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        let mut first = Framed::new(first, FrameCodec);
        assert_eq!(
            next_client_packet(&mut first).await,
            ClientPacket::Login {
                name: "P".to_string()
            }
        );
        wait_for(&mut events, BridgeEvent::Connected).await;

        drop(first);
        wait_for(&mut events, BridgeEvent::Disconnected).await;
        network.send_chat("typed while offline");

        let (second, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        let mut second = Framed::new(second, FrameCodec);
        assert_eq!(
            next_client_packet(&mut second).await,
            ClientPacket::Login {
                name: "P".to_string()
            }
        );
        assert_eq!(
            next_client_packet(&mut second).await,
            ClientPacket::Chat {
                message: "typed while offline".to_string()
            }
        );
    }

    #[tokio::test]
    async fn chat_queued_before_first_connect_is_accepted_by_server() {
        let addr = start_server().await;
        let mut watcher = TestClient::connect(addr).await;
        watcher.login("Watcher").await;

        let config = BridgeConfig {
            host: "127.0.0.1".to_string(),
            port: addr.port(),
            reconnect_delay_ms: 50,
        };
        let (handle, _events) = Bridge::spawn(config);
        let mut network = NetworkManager::new(handle);
        network.set_login("Eager");
        network.send_chat("first words");

        let message = watcher
            .expect(|packet| match packet {
                ServerPacket::Chat {
                    sender: ChatSender::Player(_),
                    message,
                } => Some(message),
                _ => None,
            })
            .await;
        assert_eq!(message, "first words");
    }
}
