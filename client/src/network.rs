//! Client network manager: turns game intents into framed packets and inbound
//! bytes into typed callbacks

use log::{debug, warn};
use shared::{
    decode_all, encode_frame, ChatSender, ClientPacket, EntityState, FrameAccumulator,
    ServerPacket, WireError, WorldItem,
};

/// Anything that can carry opaque bytes to the server
pub trait Transport {
    fn send(&self, bytes: Vec<u8>);

    /// Bytes written first on every connection, before anything queued
    fn set_preamble(&self, bytes: Vec<u8>);
}

/// Callbacks fired once per decoded server packet, in arrival order
pub trait NetworkEvents {
    fn on_login(&mut self, player_id: u32, world_seed: u32, spawn_x: f32, spawn_y: f32);
    fn on_entity_update(&mut self, entities: &[EntityState]);
    fn on_chat(&mut self, sender: ChatSender, message: &str);
    fn on_damage(&mut self, target_id: u32, amount: u32);
    fn on_spawn_item(&mut self, item: &WorldItem);
    fn on_item_despawn(&mut self, item_id: u32);
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NetworkStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub malformed_frames: u64,
}

pub struct NetworkManager<T: Transport> {
    transport: T,
    frames: FrameAccumulator,
    stats: NetworkStats,
}

impl<T: Transport> NetworkManager<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            frames: FrameAccumulator::new(),
            stats: NetworkStats::default(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn stats(&self) -> NetworkStats {
        self.stats
    }

    pub fn login(&mut self, name: &str) {
        self.send_packet(&ClientPacket::Login {
            name: name.to_string(),
        });
    }

    /// Registers LOGIN as the connection preamble, so every reconnect logs in
    /// again before input buffered during the outage is flushed
    pub fn set_login(&mut self, name: &str) {
        let packet = ClientPacket::Login {
            name: name.to_string(),
        };
        match encode_frame(&packet) {
            Ok(frame) => self.transport.set_preamble(frame.to_vec()),
            Err(e) => warn!("Cannot use {:?} as login: {}", packet, e),
        }
    }

    pub fn send_move(&mut self, x: f32, y: f32) {
        self.send_packet(&ClientPacket::Move { x, y });
    }

    pub fn send_chat(&mut self, message: &str) {
        self.send_packet(&ClientPacket::Chat {
            message: message.to_string(),
        });
    }

    pub fn attack(&mut self, target_id: u32) {
        self.send_packet(&ClientPacket::Attack { target_id });
    }

    pub fn spawn_item(&mut self, x: f32, y: f32, sprite_id: u16, name: &str) {
        self.send_packet(&ClientPacket::SpawnItem {
            x,
            y,
            sprite_id,
            name: name.to_string(),
        });
    }

    pub fn pickup_item(&mut self, item_id: u32) {
        self.send_packet(&ClientPacket::ItemPickup { item_id });
    }

    /// Encoding failures (an oversized string) are logged and the packet dropped
    fn send_packet(&mut self, packet: &ClientPacket) {
        match encode_frame(packet) {
            Ok(frame) => {
                self.transport.send(frame.to_vec());
                self.stats.packets_sent += 1;
            }
            Err(e) => warn!("Dropping outgoing {:?}: {}", packet, e),
        }
    }

    /// Feeds one chunk from the transport. Whole packets are dispatched, a
    /// trailing partial frame waits for the next chunk. Returns the number of
    /// packets dispatched.
    pub fn receive<E: NetworkEvents>(&mut self, chunk: &[u8], events: &mut E) -> usize {
        self.frames.push(chunk);
        let mut dispatched = 0;

        loop {
            let payload = match self.frames.next_frame() {
                Ok(Some(payload)) => payload,
                Ok(None) => break,
                Err(e) => {
                    // The stream cannot be resynchronized past a bad length
                    warn!("Discarding {} buffered bytes: {}", self.frames.buffered(), e);
                    self.frames.clear();
                    self.stats.malformed_frames += 1;
                    break;
                }
            };

            let outcome = decode_all::<ServerPacket>(&payload);
            for packet in outcome.packets {
                Self::dispatch(packet, events);
                dispatched += 1;
            }
            if let Some(e) = outcome.error {
                self.stats.malformed_frames += 1;
                log_malformed(&e);
            }
        }

        self.stats.packets_received += dispatched as u64;
        dispatched
    }

    /// Drops any partial frame left over from a closed connection
    pub fn reset(&mut self) {
        if self.frames.buffered() > 0 {
            debug!("Dropping {} bytes of a partial frame", self.frames.buffered());
        }
        self.frames.clear();
    }

    fn dispatch<E: NetworkEvents>(packet: ServerPacket, events: &mut E) {
        match packet {
            ServerPacket::LoginAck {
                player_id,
                world_seed,
                spawn_x,
                spawn_y,
            } => events.on_login(player_id, world_seed, spawn_x, spawn_y),
            ServerPacket::EntityUpdate { entities } => events.on_entity_update(&entities),
            ServerPacket::Chat { sender, message } => events.on_chat(sender, &message),
            ServerPacket::Damage { target_id, amount } => events.on_damage(target_id, amount),
            ServerPacket::SpawnItem(item) => events.on_spawn_item(&item),
            ServerPacket::ItemDespawn { item_id } => events.on_item_despawn(item_id),
        }
    }
}

fn log_malformed(error: &WireError) {
    warn!("Malformed server packet, rest of frame discarded: {}", error);
}
