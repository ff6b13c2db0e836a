//! Server network layer: TCP accept loop, per-connection I/O tasks and the
//! single task that owns the game state

use crate::client_manager::ConnectionId;
use crate::config::ServerConfig;
use crate::game::{GameState, Outbound};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{decode_all, ClientPacket, FrameCodec, Packet, ServerPacket};
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::codec::{FramedRead, FramedWrite};

/// Messages sent from connection tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    Connected {
        conn_id: ConnectionId,
        addr: SocketAddr,
        outbound: mpsc::UnboundedSender<Bytes>,
    },
    PacketReceived {
        conn_id: ConnectionId,
        packet: ClientPacket,
    },
    Disconnected {
        conn_id: ConnectionId,
    },
}

/// Accepts connections and drives the broadcast tick
pub struct Server {
    listener: TcpListener,
    game_state: GameState,
    connections: HashMap<ConnectionId, mpsc::UnboundedSender<Bytes>>,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn bind(addr: &str, config: ServerConfig) -> io::Result<Self> {
        Self::with_state(addr, GameState::new(config)).await
    }

    /// Binds with a pre-built state, e.g. one with a seeded RNG
    pub async fn with_state(addr: &str, game_state: GameState) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            game_state,
            connections: HashMap::new(),
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs until the process exits. Packet handling and ticks share this
    /// one task, so a slow broadcast delays the next tick for everyone.
    pub async fn run(self) -> io::Result<()> {
        let Server {
            listener,
            mut game_state,
            mut connections,
            server_tx,
            mut server_rx,
        } = self;
        tokio::spawn(Self::accept_loop(listener, server_tx));

        let mut tick_interval = interval(game_state.config().effective_tick_interval());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = server_rx.recv() => {
                    match message {
                        Some(ServerMessage::Connected { conn_id, addr, outbound }) => {
                            connections.insert(conn_id, outbound);
                            game_state.connect(conn_id, addr);
                        }
                        Some(ServerMessage::PacketReceived { conn_id, packet }) => {
                            let actions = game_state.handle_packet(conn_id, packet);
                            Self::dispatch(&connections, actions);
                        }
                        Some(ServerMessage::Disconnected { conn_id }) => {
                            connections.remove(&conn_id);
                            game_state.disconnect(conn_id);
                        }
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                }

                _ = tick_interval.tick() => {
                    let actions = game_state.tick();
                    Self::dispatch(&connections, actions);

                    if game_state.tick % 200 == 0 && !connections.is_empty() {
                        debug!(
                            "Tick {}: {} connections, {} sessions, {} items",
                            game_state.tick,
                            connections.len(),
                            game_state.clients().session_count(),
                            game_state.items().len()
                        );
                    }
                }
            }
        }

        Ok(())
    }

    async fn accept_loop(listener: TcpListener, server_tx: mpsc::UnboundedSender<ServerMessage>) {
        let mut next_conn_id: ConnectionId = 1;

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("Could not disable Nagle for {}: {}", addr, e);
                    }
                    let conn_id = next_conn_id;
                    next_conn_id += 1;
                    Self::spawn_connection(conn_id, stream, addr, server_tx.clone());
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                }
            }

            if server_tx.is_closed() {
                break;
            }
        }
    }

    fn spawn_connection(
        conn_id: ConnectionId,
        stream: TcpStream,
        addr: SocketAddr,
        server_tx: mpsc::UnboundedSender<ServerMessage>,
    ) {
        let (read_half, write_half) = stream.into_split();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        // Registered before the reader starts so packets never precede it
        if server_tx
            .send(ServerMessage::Connected {
                conn_id,
                addr,
                outbound: outbound_tx,
            })
            .is_err()
        {
            return;
        }

        tokio::spawn(Self::write_loop(conn_id, write_half, outbound_rx));
        tokio::spawn(Self::read_loop(conn_id, read_half, server_tx));
    }

    async fn read_loop(
        conn_id: ConnectionId,
        read_half: OwnedReadHalf,
        server_tx: mpsc::UnboundedSender<ServerMessage>,
    ) {
        let mut frames = FramedRead::new(read_half, FrameCodec);

        while let Some(frame) = frames.next().await {
            let payload = match frame {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("Closing connection {}: {}", conn_id, e);
                    break;
                }
            };

            let outcome = decode_all::<ClientPacket>(&payload);
            for packet in outcome.packets {
                if server_tx
                    .send(ServerMessage::PacketReceived { conn_id, packet })
                    .is_err()
                {
                    return;
                }
            }
            if let Some(e) = outcome.error {
                warn!(
                    "Malformed packet from connection {}, rest of frame discarded: {}",
                    conn_id, e
                );
            }
        }

        let _ = server_tx.send(ServerMessage::Disconnected { conn_id });
    }

    async fn write_loop(
        conn_id: ConnectionId,
        write_half: OwnedWriteHalf,
        mut outbound_rx: mpsc::UnboundedReceiver<Bytes>,
    ) {
        let mut sink = FramedWrite::new(write_half, FrameCodec);

        while let Some(payload) = outbound_rx.recv().await {
            if let Err(e) = sink.send(payload).await {
                warn!("Failed to write to connection {}: {}", conn_id, e);
                break;
            }
        }
    }

    fn encode(packet: &ServerPacket) -> Option<Bytes> {
        match packet.encode() {
            Ok(bytes) => Some(Bytes::from(bytes)),
            Err(e) => {
                error!("Failed to encode {:?} packet: {}", packet.tag(), e);
                None
            }
        }
    }

    fn dispatch(
        connections: &HashMap<ConnectionId, mpsc::UnboundedSender<Bytes>>,
        actions: Vec<Outbound>,
    ) {
        for action in actions {
            match action {
                Outbound::Send { conn_id, packet } => {
                    let Some(payload) = Self::encode(&packet) else {
                        continue;
                    };
                    if let Some(outbound) = connections.get(&conn_id) {
                        if outbound.send(payload).is_err() {
                            debug!("Connection {} writer already closed", conn_id);
                        }
                    }
                }
                Outbound::Broadcast { packet } => {
                    // Encoded once, shared by every writer
                    let Some(payload) = Self::encode(&packet) else {
                        continue;
                    };
                    for (conn_id, outbound) in connections {
                        if outbound.send(payload.clone()).is_err() {
                            debug!("Connection {} writer already closed", conn_id);
                        }
                    }
                }
            }
        }
    }
}
