//! Authoritative session and item state plus the packet handlers
//!
//! `GameState` never touches a socket. Every handler returns the packets to
//! write as `Outbound` actions and the network loop performs the writes,
//! which keeps all mutation on one task and lets tests drive the state
//! directly.

use crate::client_manager::{ClientManager, ConnectionId, LoginError, Session};
use crate::config::ServerConfig;
use crate::items::ItemTable;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{ChatSender, ClientPacket, EntityState, ServerPacket};
use std::net::SocketAddr;

/// A packet the network layer should write
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Send {
        conn_id: ConnectionId,
        packet: ServerPacket,
    },
    /// Every connected socket, logged in or not
    Broadcast { packet: ServerPacket },
}

pub struct GameState {
    config: ServerConfig,
    clients: ClientManager,
    items: ItemTable,
    rng: StdRng,
    pub tick: u64,
}

impl GameState {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn with_rng(config: ServerConfig, rng: StdRng) -> Self {
        Self {
            clients: ClientManager::new(config.first_session_id),
            items: ItemTable::new(config.first_item_id),
            rng,
            tick: 0,
            config,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn clients(&self) -> &ClientManager {
        &self.clients
    }

    pub fn items(&self) -> &ItemTable {
        &self.items
    }

    pub fn connect(&mut self, conn_id: ConnectionId, addr: SocketAddr) {
        if !self.clients.add_client(conn_id, addr) {
            warn!("Connection {} registered twice, keeping the first", conn_id);
        }
    }

    /// Drops the connection; peers notice the player is gone from the next snapshot
    pub fn disconnect(&mut self, conn_id: ConnectionId) -> Option<Session> {
        self.clients.remove_client(conn_id)?.session
    }

    pub fn handle_packet(&mut self, conn_id: ConnectionId, packet: ClientPacket) -> Vec<Outbound> {
        match packet {
            ClientPacket::Login { name } => self.handle_login(conn_id, name),
            ClientPacket::Move { x, y } => self.handle_move(conn_id, x, y),
            ClientPacket::Chat { message } => self.handle_chat(conn_id, message),
            ClientPacket::Attack { target_id } => self.handle_attack(conn_id, target_id),
            ClientPacket::SpawnItem {
                x,
                y,
                sprite_id,
                name,
            } => self.handle_spawn_item(conn_id, x, y, sprite_id, name),
            ClientPacket::ItemPickup { item_id } => self.handle_item_pickup(conn_id, item_id),
        }
    }

    fn session_id(&self, conn_id: ConnectionId, kind: &str) -> Option<u32> {
        let id = self.clients.session(conn_id).map(|session| session.id);
        if id.is_none() {
            debug!("Ignoring {} from connection {} before login", kind, conn_id);
        }
        id
    }

    fn handle_login(&mut self, conn_id: ConnectionId, name: String) -> Vec<Outbound> {
        let (spawn_x, spawn_y) = self.config.spawn_point;

        match self
            .clients
            .login(conn_id, name.clone(), spawn_x, spawn_y, self.config.max_hp)
        {
            Ok(player_id) => {
                info!(
                    "Connection {} logged in as {} (session {})",
                    conn_id, name, player_id
                );

                let mut out = vec![Outbound::Send {
                    conn_id,
                    packet: ServerPacket::LoginAck {
                        player_id,
                        world_seed: self.config.world_seed,
                        spawn_x,
                        spawn_y,
                    },
                }];

                // Late joiners see every item already on the ground
                out.extend(self.items.iter().map(|item| Outbound::Send {
                    conn_id,
                    packet: ServerPacket::SpawnItem(item.clone()),
                }));
                out
            }
            Err(LoginError::AlreadyLoggedIn { session_id }) => {
                warn!(
                    "Connection {} sent a second LOGIN, keeping session {}",
                    conn_id, session_id
                );
                Vec::new()
            }
            Err(LoginError::UnknownConnection) => {
                warn!("LOGIN from unregistered connection {}", conn_id);
                Vec::new()
            }
        }
    }

    /// Last write wins; positions are trusted as sent
    fn handle_move(&mut self, conn_id: ConnectionId, x: f32, y: f32) -> Vec<Outbound> {
        match self.clients.session_mut(conn_id) {
            Some(session) => {
                session.x = x;
                session.y = y;
            }
            None => debug!("Ignoring MOVE from connection {} before login", conn_id),
        }
        Vec::new()
    }

    fn handle_chat(&mut self, conn_id: ConnectionId, message: String) -> Vec<Outbound> {
        let Some(sender_id) = self.session_id(conn_id, "CHAT") else {
            return Vec::new();
        };

        vec![Outbound::Broadcast {
            packet: ServerPacket::Chat {
                sender: ChatSender::Player(sender_id),
                message,
            },
        }]
    }

    fn roll_damage(&mut self) -> u32 {
        let low = self.config.damage_min.min(self.config.damage_max);
        let high = self.config.damage_min.max(self.config.damage_max);
        self.rng.gen_range(low..=high)
    }

    fn handle_attack(&mut self, conn_id: ConnectionId, target_id: u32) -> Vec<Outbound> {
        let Some(attacker_name) = self
            .clients
            .session(conn_id)
            .map(|session| session.name.clone())
        else {
            debug!("Ignoring ATTACK from connection {} before login", conn_id);
            return Vec::new();
        };

        if self.clients.find_session(target_id).is_none() {
            debug!("ATTACK on unknown session {} ignored", target_id);
            return Vec::new();
        }

        let amount = self.roll_damage();
        let respawn = self.config.respawn_point;
        let Some(target) = self.clients.find_session_mut(target_id) else {
            return Vec::new();
        };

        target.hp -= i32::try_from(amount).unwrap_or(i32::MAX);
        let mut out = vec![Outbound::Broadcast {
            packet: ServerPacket::Damage { target_id, amount },
        }];

        if target.hp <= 0 {
            target.hp = target.max_hp;
            target.x = respawn.0;
            target.y = respawn.1;
            info!("{} defeated {} (session {})", attacker_name, target.name, target.id);

            out.push(Outbound::Broadcast {
                packet: ServerPacket::Chat {
                    sender: ChatSender::System,
                    message: format!("{} defeated {}", attacker_name, target.name),
                },
            });
        }
        out
    }

    fn handle_spawn_item(
        &mut self,
        conn_id: ConnectionId,
        x: f32,
        y: f32,
        sprite_id: u16,
        name: String,
    ) -> Vec<Outbound> {
        if self.session_id(conn_id, "SPAWN_ITEM").is_none() {
            return Vec::new();
        }

        let item = self.items.spawn(x, y, sprite_id, name);
        vec![Outbound::Broadcast {
            packet: ServerPacket::SpawnItem(item),
        }]
    }

    /// Safe under races: only the first pickup of an id produces a despawn
    fn handle_item_pickup(&mut self, conn_id: ConnectionId, item_id: u32) -> Vec<Outbound> {
        if self.session_id(conn_id, "ITEM_PICKUP").is_none() {
            return Vec::new();
        }

        match self.items.remove(item_id) {
            Some(item) => {
                debug!("Item {} ({}) picked up by connection {}", item.id, item.name, conn_id);
                vec![Outbound::Broadcast {
                    packet: ServerPacket::ItemDespawn { item_id },
                }]
            }
            None => {
                debug!("Pickup of missing item {} ignored", item_id);
                Vec::new()
            }
        }
    }

    /// Builds this tick's ENTITY_UPDATE packets, sent whether or not anything moved
    pub fn tick(&mut self) -> Vec<Outbound> {
        self.tick += 1;
        if self.clients.is_empty() {
            return Vec::new();
        }

        let budget = self.config.effective_snapshot_budget();
        if self.config.interest_radius.is_none() && self.clients.session_count() <= budget {
            return vec![Outbound::Broadcast {
                packet: ServerPacket::EntityUpdate {
                    entities: self.full_snapshot(),
                },
            }];
        }

        self.clients
            .clients()
            .map(|client| Outbound::Send {
                conn_id: client.conn_id,
                packet: ServerPacket::EntityUpdate {
                    entities: self.snapshot_for(client.session.as_ref()),
                },
            })
            .collect()
    }

    /// Every logged-in session, ordered by id
    pub fn full_snapshot(&self) -> Vec<EntityState> {
        let mut entities: Vec<EntityState> = self
            .clients
            .sessions()
            .map(|session| EntityState::new(session.id, session.x, session.y))
            .collect();
        entities.sort_by_key(|entity| entity.id);
        entities
    }

    /// Snapshot as seen by `viewer`, filtered by interest radius and capped
    /// to the per-tick budget. Nearest sessions win when the cap bites.
    pub fn snapshot_for(&self, viewer: Option<&Session>) -> Vec<EntityState> {
        let budget = self.config.effective_snapshot_budget();
        let radius = self.config.interest_radius;

        let mut visible: Vec<&Session> = self
            .clients
            .sessions()
            .filter(|session| match (viewer, radius) {
                (Some(viewer), Some(radius)) => {
                    session.id == viewer.id
                        || session.distance_sq(viewer.x, viewer.y) <= radius * radius
                }
                _ => true,
            })
            .collect();

        if visible.len() > budget {
            match viewer {
                Some(viewer) => visible.sort_by(|a, b| {
                    a.distance_sq(viewer.x, viewer.y)
                        .total_cmp(&b.distance_sq(viewer.x, viewer.y))
                        .then(a.id.cmp(&b.id))
                }),
                None => visible.sort_by_key(|session| session.id),
            }
            visible.truncate(budget);
        }

        let mut entities: Vec<EntityState> = visible
            .into_iter()
            .map(|session| EntityState::new(session.id, session.x, session.y))
            .collect();
        entities.sort_by_key(|entity| entity.id);
        entities
    }
}
