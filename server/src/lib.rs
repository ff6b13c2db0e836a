//! # Game Server Library
//!
//! Authoritative session manager for the multiplayer game. It accepts TCP
//! connections, turns each LOGIN into a session, keeps the shared item table,
//! and broadcasts every session's position at a fixed tick rate.
//!
//! ## Architecture Design
//!
//! ### Single Owner of State
//! One task owns [`game::GameState`]. Connection tasks only decode frames and
//! forward packets over a channel; the owner applies them and ticks the
//! broadcast timer on the same task, so no locks are needed.
//!
//! ### Framed TCP
//! Every packet travels inside a `u32` length-prefixed frame
//! ([`shared::FrameCodec`]), so packets split across TCP segments are
//! reassembled before decoding.
//!
//! ### Trusting Server
//! MOVE, ATTACK and LOGIN are applied as sent. There is no range, speed or
//! name validation and no authentication.
//!
//! ## Module Organization
//!
//! - `client_manager`: connection table, sessions and id allocation
//! - `items`: world item table
//! - `game`: packet handlers and snapshot construction
//! - `network`: TCP accept loop, per-connection I/O and the tick loop
//! - `config`: tunable constants
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind("127.0.0.1:3000", ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod game;
pub mod items;
pub mod network;
