//! Typed packets for both directions of the protocol
//!
//! Each packet is a one-byte tag followed by a payload whose shape is fixed by
//! the tag. The two directions share tags but not always payloads (CHAT and
//! SPAWN_ITEM differ), so client-bound and server-bound traffic are separate
//! enums. A tag that is only valid in the other direction decodes as unknown.

use crate::error::{WireError, WireResult};
use crate::wire::{PacketReader, PacketWriter};
use crate::{ChatSender, EntityState, WorldItem};

/// Wire tags, one per packet kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketTag {
    Login = 0x01,
    LoginAck = 0x02,
    Move = 0x03,
    EntityUpdate = 0x04,
    Chat = 0x05,
    Attack = 0x06,
    Damage = 0x07,
    SpawnItem = 0x08,
    ItemPickup = 0x09,
    ItemDespawn = 0x0A,
}

impl TryFrom<u8> for PacketTag {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0x01 => PacketTag::Login,
            0x02 => PacketTag::LoginAck,
            0x03 => PacketTag::Move,
            0x04 => PacketTag::EntityUpdate,
            0x05 => PacketTag::Chat,
            0x06 => PacketTag::Attack,
            0x07 => PacketTag::Damage,
            0x08 => PacketTag::SpawnItem,
            0x09 => PacketTag::ItemPickup,
            0x0A => PacketTag::ItemDespawn,
            other => return Err(WireError::UnknownTag(other)),
        })
    }
}

const STRING_PREFIX: usize = 2;
const ENTITY_ENTRY_LEN: usize = 12;

fn string_len(value: &str) -> usize {
    STRING_PREFIX + value.len()
}

/// Common encode/decode surface for both packet directions
pub trait Packet: Sized {
    fn tag(&self) -> PacketTag;

    /// Exact size of the tag plus payload
    fn encoded_len(&self) -> usize;

    fn write_to(&self, writer: &mut PacketWriter) -> WireResult<()>;

    /// Reads one tag and its payload
    fn read_from(reader: &mut PacketReader<'_>) -> WireResult<Self>;

    fn encode(&self) -> WireResult<Vec<u8>> {
        let mut writer = PacketWriter::with_capacity(self.encoded_len());
        self.write_to(&mut writer)?;
        Ok(writer.into_vec())
    }

    fn decode(bytes: &[u8]) -> WireResult<Self> {
        Self::read_from(&mut PacketReader::new(bytes))
    }
}

/// Packets sent by a client to the server
#[derive(Debug, Clone, PartialEq)]
pub enum ClientPacket {
    Login { name: String },
    Move { x: f32, y: f32 },
    Chat { message: String },
    Attack { target_id: u32 },
    /// The item id is always written as zero; the server assigns the real one
    SpawnItem {
        x: f32,
        y: f32,
        sprite_id: u16,
        name: String,
    },
    ItemPickup { item_id: u32 },
}

impl Packet for ClientPacket {
    fn tag(&self) -> PacketTag {
        match self {
            ClientPacket::Login { .. } => PacketTag::Login,
            ClientPacket::Move { .. } => PacketTag::Move,
            ClientPacket::Chat { .. } => PacketTag::Chat,
            ClientPacket::Attack { .. } => PacketTag::Attack,
            ClientPacket::SpawnItem { .. } => PacketTag::SpawnItem,
            ClientPacket::ItemPickup { .. } => PacketTag::ItemPickup,
        }
    }

    fn encoded_len(&self) -> usize {
        1 + match self {
            ClientPacket::Login { name } => string_len(name),
            ClientPacket::Move { .. } => 8,
            ClientPacket::Chat { message } => string_len(message),
            ClientPacket::Attack { .. } => 4,
            ClientPacket::SpawnItem { name, .. } => 4 + 8 + 2 + string_len(name),
            ClientPacket::ItemPickup { .. } => 4,
        }
    }

    fn write_to(&self, writer: &mut PacketWriter) -> WireResult<()> {
        writer.write_u8(self.tag() as u8)?;
        match self {
            ClientPacket::Login { name } => writer.write_string(name),
            ClientPacket::Move { x, y } => {
                writer.write_f32(*x)?;
                writer.write_f32(*y)
            }
            ClientPacket::Chat { message } => writer.write_string(message),
            ClientPacket::Attack { target_id } => writer.write_u32(*target_id),
            ClientPacket::SpawnItem {
                x,
                y,
                sprite_id,
                name,
            } => {
                writer.write_u32(0)?;
                writer.write_f32(*x)?;
                writer.write_f32(*y)?;
                writer.write_u16(*sprite_id)?;
                writer.write_string(name)
            }
            ClientPacket::ItemPickup { item_id } => writer.write_u32(*item_id),
        }
    }

    fn read_from(reader: &mut PacketReader<'_>) -> WireResult<Self> {
        let raw = reader.read_u8()?;
        match PacketTag::try_from(raw)? {
            PacketTag::Login => Ok(ClientPacket::Login {
                name: reader.read_string()?,
            }),
            PacketTag::Move => Ok(ClientPacket::Move {
                x: reader.read_f32()?,
                y: reader.read_f32()?,
            }),
            PacketTag::Chat => Ok(ClientPacket::Chat {
                message: reader.read_string()?,
            }),
            PacketTag::Attack => Ok(ClientPacket::Attack {
                target_id: reader.read_u32()?,
            }),
            PacketTag::SpawnItem => {
                // Client-authored ids carry no meaning
                let _ = reader.read_u32()?;
                Ok(ClientPacket::SpawnItem {
                    x: reader.read_f32()?,
                    y: reader.read_f32()?,
                    sprite_id: reader.read_u16()?,
                    name: reader.read_string()?,
                })
            }
            PacketTag::ItemPickup => Ok(ClientPacket::ItemPickup {
                item_id: reader.read_u32()?,
            }),
            PacketTag::LoginAck
            | PacketTag::EntityUpdate
            | PacketTag::Damage
            | PacketTag::ItemDespawn => Err(WireError::UnknownTag(raw)),
        }
    }
}

/// Packets sent by the server to clients
#[derive(Debug, Clone, PartialEq)]
pub enum ServerPacket {
    LoginAck {
        player_id: u32,
        world_seed: u32,
        spawn_x: f32,
        spawn_y: f32,
    },
    EntityUpdate { entities: Vec<EntityState> },
    Chat { sender: ChatSender, message: String },
    Damage { target_id: u32, amount: u32 },
    SpawnItem(WorldItem),
    ItemDespawn { item_id: u32 },
}

impl Packet for ServerPacket {
    fn tag(&self) -> PacketTag {
        match self {
            ServerPacket::LoginAck { .. } => PacketTag::LoginAck,
            ServerPacket::EntityUpdate { .. } => PacketTag::EntityUpdate,
            ServerPacket::Chat { .. } => PacketTag::Chat,
            ServerPacket::Damage { .. } => PacketTag::Damage,
            ServerPacket::SpawnItem(_) => PacketTag::SpawnItem,
            ServerPacket::ItemDespawn { .. } => PacketTag::ItemDespawn,
        }
    }

    fn encoded_len(&self) -> usize {
        1 + match self {
            ServerPacket::LoginAck { .. } => 16,
            ServerPacket::EntityUpdate { entities } => 1 + entities.len() * ENTITY_ENTRY_LEN,
            ServerPacket::Chat { message, .. } => 4 + string_len(message),
            ServerPacket::Damage { .. } => 8,
            ServerPacket::SpawnItem(item) => 4 + 8 + 2 + string_len(&item.name),
            ServerPacket::ItemDespawn { .. } => 4,
        }
    }

    fn write_to(&self, writer: &mut PacketWriter) -> WireResult<()> {
        writer.write_u8(self.tag() as u8)?;
        match self {
            ServerPacket::LoginAck {
                player_id,
                world_seed,
                spawn_x,
                spawn_y,
            } => {
                writer.write_u32(*player_id)?;
                writer.write_u32(*world_seed)?;
                writer.write_f32(*spawn_x)?;
                writer.write_f32(*spawn_y)
            }
            ServerPacket::EntityUpdate { entities } => {
                let count = u8::try_from(entities.len())
                    .map_err(|_| WireError::TooManyEntities(entities.len()))?;
                writer.write_u8(count)?;
                for entity in entities {
                    writer.write_u32(entity.id)?;
                    writer.write_f32(entity.x)?;
                    writer.write_f32(entity.y)?;
                }
                Ok(())
            }
            ServerPacket::Chat { sender, message } => {
                writer.write_u32(sender.to_wire())?;
                writer.write_string(message)
            }
            ServerPacket::Damage { target_id, amount } => {
                writer.write_u32(*target_id)?;
                writer.write_u32(*amount)
            }
            ServerPacket::SpawnItem(item) => {
                writer.write_u32(item.id)?;
                writer.write_f32(item.x)?;
                writer.write_f32(item.y)?;
                writer.write_u16(item.sprite_id)?;
                writer.write_string(&item.name)
            }
            ServerPacket::ItemDespawn { item_id } => writer.write_u32(*item_id),
        }
    }

    fn read_from(reader: &mut PacketReader<'_>) -> WireResult<Self> {
        let raw = reader.read_u8()?;
        match PacketTag::try_from(raw)? {
            PacketTag::LoginAck => Ok(ServerPacket::LoginAck {
                player_id: reader.read_u32()?,
                world_seed: reader.read_u32()?,
                spawn_x: reader.read_f32()?,
                spawn_y: reader.read_f32()?,
            }),
            PacketTag::EntityUpdate => {
                let count = reader.read_u8()? as usize;
                let mut entities = Vec::with_capacity(count);
                for _ in 0..count {
                    entities.push(EntityState {
                        id: reader.read_u32()?,
                        x: reader.read_f32()?,
                        y: reader.read_f32()?,
                    });
                }
                Ok(ServerPacket::EntityUpdate { entities })
            }
            PacketTag::Chat => Ok(ServerPacket::Chat {
                sender: ChatSender::from_wire(reader.read_u32()?),
                message: reader.read_string()?,
            }),
            PacketTag::Damage => Ok(ServerPacket::Damage {
                target_id: reader.read_u32()?,
                amount: reader.read_u32()?,
            }),
            PacketTag::SpawnItem => Ok(ServerPacket::SpawnItem(WorldItem {
                id: reader.read_u32()?,
                x: reader.read_f32()?,
                y: reader.read_f32()?,
                sprite_id: reader.read_u16()?,
                name: reader.read_string()?,
            })),
            PacketTag::ItemDespawn => Ok(ServerPacket::ItemDespawn {
                item_id: reader.read_u32()?,
            }),
            PacketTag::Login | PacketTag::Move | PacketTag::Attack | PacketTag::ItemPickup => {
                Err(WireError::UnknownTag(raw))
            }
        }
    }
}

/// Result of draining a buffer that may hold several packets
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeOutcome<P> {
    pub packets: Vec<P>,
    /// Set when decoding stopped early; the bytes after the failure are dropped
    pub error: Option<WireError>,
}

/// Decodes packets back to back until the buffer is exhausted.
///
/// The first failure ends the pass: an unknown tag has no known payload
/// length, so guessing would corrupt everything after it.
pub fn decode_all<P: Packet>(bytes: &[u8]) -> DecodeOutcome<P> {
    let mut reader = PacketReader::new(bytes);
    let mut packets = Vec::new();
    while reader.remaining() > 0 {
        match P::read_from(&mut reader) {
            Ok(packet) => packets.push(packet),
            Err(error) => {
                return DecodeOutcome {
                    packets,
                    error: Some(error),
                }
            }
        }
    }
    DecodeOutcome {
        packets,
        error: None,
    }
}
