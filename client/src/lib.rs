//! # Game Client Library
//!
//! Client side of the multiplayer sync layer. It keeps one TCP connection to
//! the server alive, turns game intents into packets, and mirrors the world
//! the server describes.
//!
//! ## Architecture Overview
//!
//! ### Transport Bridge
//! A background task owns the socket ([`bridge::Bridge`]). While disconnected
//! it queues outgoing bytes and retries after a fixed delay; on connect it
//! flushes the queue in order before anything newer. It never interprets the
//! bytes it relays.
//!
//! ### Network Manager
//! [`network::NetworkManager`] encodes outgoing packets into frames and
//! reassembles inbound chunks into packets, firing one
//! [`network::NetworkEvents`] callback per packet. It is generic over
//! [`network::Transport`], so tests can swap the bridge for a recorder.
//!
//! ### Replication
//! Every ENTITY_UPDATE is the full set of visible entities. The
//! [`replication::Replicator`] diffs it against the previous one to create,
//! retarget or destroy mirrored entities, and eases rendered positions toward
//! their targets each frame.
//!
//! ## Module Organization
//!
//! - `config`: bridge target loaded from JSON
//! - `bridge`: connection lifecycle and outbound queue
//! - `network`: packet encode/decode and event dispatch
//! - `replication`: remote entity mirror and interpolation
//! - `items`: item mirror with local placeholders
//! - `chat`: chat history and speech bubbles
//! - `game`: [`game::ClientWorld`], which ties the mirrors together
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::bridge::{Bridge, BridgeEvent};
//! use client::config::BridgeConfig;
//! use client::game::ClientWorld;
//! use client::network::NetworkManager;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (handle, mut events) = Bridge::spawn(BridgeConfig::default());
//!     let mut network = NetworkManager::new(handle);
//!     let mut world = ClientWorld::new();
//!
//!     // Sent again ahead of queued input after every reconnect
//!     network.set_login("Alice");
//!     while let Some(event) = events.recv().await {
//!         if let BridgeEvent::Data(bytes) = event {
//!             network.receive(&bytes, &mut world);
//!         }
//!     }
//! }
//! ```

pub mod bridge;
pub mod chat;
pub mod config;
pub mod game;
pub mod items;
pub mod network;
pub mod replication;
