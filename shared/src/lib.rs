//! Wire protocol shared by the game server and client.
//!
//! Packets are a one-byte tag followed by a fixed payload (little-endian
//! integers and floats, `u16`-length-prefixed UTF-8 strings). Packets travel
//! inside length-prefixed frames so a receiver can reassemble them from an
//! arbitrary TCP byte stream.

pub mod error;
pub mod frame;
pub mod packet;
pub mod wire;

pub use error::{CodecError, WireError, WireResult};
pub use frame::{encode_frame, frame_payload, FrameAccumulator, FrameCodec, MAX_FRAME_LEN};
pub use packet::{decode_all, ClientPacket, DecodeOutcome, Packet, PacketTag, ServerPacket};
pub use wire::{PacketReader, PacketWriter};

/// Default server port used by both sides
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Most entities one ENTITY_UPDATE can carry (the count is a `u8`)
pub const MAX_SNAPSHOT_ENTITIES: usize = u8::MAX as usize;

/// Sender id reserved on the wire for server-authored chat
const SYSTEM_SENDER_ID: u32 = 0;

/// One `(id, x, y)` tuple of a snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityState {
    pub id: u32,
    pub x: f32,
    pub y: f32,
}

impl EntityState {
    pub fn new(id: u32, x: f32, y: f32) -> Self {
        Self { id, x, y }
    }
}

/// An item lying in the world, keyed by a server-assigned id
#[derive(Debug, Clone, PartialEq)]
pub struct WorldItem {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub sprite_id: u16,
    pub name: String,
}

/// Author of a chat line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatSender {
    /// Messages generated by the server itself, such as kill announcements
    System,
    Player(u32),
}

impl ChatSender {
    /// Session ids start at 1, so id 0 on the wire always means the server
    pub fn from_wire(id: u32) -> Self {
        if id == SYSTEM_SENDER_ID {
            ChatSender::System
        } else {
            ChatSender::Player(id)
        }
    }

    pub fn to_wire(self) -> u32 {
        match self {
            ChatSender::System => SYSTEM_SENDER_ID,
            ChatSender::Player(id) => id,
        }
    }

    pub fn player_id(self) -> Option<u32> {
        match self {
            ChatSender::System => None,
            ChatSender::Player(id) => Some(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_sender_from_wire() {
        assert_eq!(ChatSender::from_wire(0), ChatSender::System);
        assert_eq!(ChatSender::from_wire(17), ChatSender::Player(17));
    }

    #[test]
    fn test_chat_sender_player_id() {
        assert_eq!(ChatSender::System.player_id(), None);
        assert_eq!(ChatSender::Player(3).player_id(), Some(3));
        assert_eq!(ChatSender::Player(3).to_wire(), 3);
    }

    #[test]
    fn test_entity_state_creation() {
        let entity = EntityState::new(4, 10.0, 20.0);
        assert_eq!(entity.id, 4);
        assert_eq!(entity.x, 10.0);
        assert_eq!(entity.y, 20.0);
    }
}
