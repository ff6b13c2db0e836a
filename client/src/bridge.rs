//! Transport bridge between the game logic and one TCP connection
//!
//! The bridge task owns the socket and the outbound queue. Game code talks to
//! it through a cloneable [`BridgeHandle`] and hears back through a channel of
//! [`BridgeEvent`]s. Bytes are relayed verbatim in both directions; framing
//! belongs to the network manager.
//!
//! Lifecycle: `Connecting -> Connected -> Disconnected -> (delay) -> Connecting`.
//! Every close or failed attempt is followed by exactly one fixed delay and
//! then exactly one new attempt. There is no backoff and no attempt limit.
//!
//! A connection preamble (typically LOGIN) can be registered once. It is
//! written first on every connection, ahead of the queued sends, so a session
//! is re-established before any input buffered during an outage reaches the
//! server.

use crate::config::BridgeConfig;
use crate::network::Transport;
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

const READ_BUFFER_SIZE: usize = 8192;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// A connect attempt is starting; attempts are numbered from 1
    Connecting { attempt: u64 },
    /// The socket is open and the preamble plus every queued send has been written
    Connected,
    Disconnected,
    /// One inbound chunk exactly as it came off the socket
    Data(Vec<u8>),
}

/// Requests from handles to the bridge task, applied in submission order
#[derive(Debug)]
enum BridgeCommand {
    Send(Vec<u8>),
    SetPreamble(Vec<u8>),
}

/// Sends accepted while no socket is open, in submission order
#[derive(Debug, Default)]
pub struct OutboundQueue {
    pending: VecDeque<Vec<u8>>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: Vec<u8>) {
        self.pending.push_back(bytes);
    }

    pub fn front(&self) -> Option<&Vec<u8>> {
        self.pending.front()
    }

    pub fn pop_front(&mut self) -> Option<Vec<u8>> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn queued_bytes(&self) -> usize {
        self.pending.iter().map(Vec::len).sum()
    }

    /// Writes every queued chunk in order. A chunk leaves the queue only once
    /// it has been written, so a failure keeps it and everything behind it.
    async fn flush_to(&mut self, writer: &mut OwnedWriteHalf) -> io::Result<usize> {
        let mut flushed = 0;
        while let Some(chunk) = self.pending.front() {
            writer.write_all(chunk).await?;
            self.pending.pop_front();
            flushed += 1;
        }
        Ok(flushed)
    }
}

/// State owned by the bridge task between connections
#[derive(Debug, Default)]
struct Outbox {
    queue: OutboundQueue,
    preamble: Option<Vec<u8>>,
}

impl Outbox {
    /// Applies a command that arrived while no socket is open
    fn accept(&mut self, command: BridgeCommand) {
        match command {
            BridgeCommand::Send(bytes) => self.queue.push(bytes),
            BridgeCommand::SetPreamble(bytes) => self.preamble = Some(bytes),
        }
    }
}

/// Cheap to clone; every clone feeds the same bridge task
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    tx: mpsc::UnboundedSender<BridgeCommand>,
}

impl BridgeHandle {
    /// Written immediately while connected, queued otherwise
    pub fn send(&self, bytes: Vec<u8>) {
        let len = bytes.len();
        if self.tx.send(BridgeCommand::Send(bytes)).is_err() {
            warn!("Bridge task has stopped, dropping {} bytes", len);
        }
    }

    /// Replaces the connection preamble. It is also written right away when
    /// a connection is open, so it always precedes later sends.
    pub fn set_preamble(&self, bytes: Vec<u8>) {
        if self.tx.send(BridgeCommand::SetPreamble(bytes)).is_err() {
            warn!("Bridge task has stopped, preamble not set");
        }
    }
}

impl Transport for BridgeHandle {
    fn send(&self, bytes: Vec<u8>) {
        BridgeHandle::send(self, bytes);
    }

    fn set_preamble(&self, bytes: Vec<u8>) {
        BridgeHandle::set_preamble(self, bytes);
    }
}

pub struct Bridge;

impl Bridge {
    /// Starts the bridge task. It stops once every handle has been dropped.
    pub fn spawn(config: BridgeConfig) -> (BridgeHandle, mpsc::UnboundedReceiver<BridgeEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        tokio::spawn(run(config, command_rx, event_tx));

        (BridgeHandle { tx: command_tx }, event_rx)
    }
}

/// How a connected session ended
enum SessionEnd {
    Closed,
    Shutdown,
}

async fn run(
    config: BridgeConfig,
    mut command_rx: mpsc::UnboundedReceiver<BridgeCommand>,
    event_tx: mpsc::UnboundedSender<BridgeEvent>,
) {
    let addr = config.addr();
    let delay = config.reconnect_delay();
    let mut outbox = Outbox::default();
    let mut attempt: u64 = 0;

    loop {
        attempt += 1;
        let _ = event_tx.send(BridgeEvent::Connecting { attempt });
        debug!("Connecting to {} (attempt {})", addr, attempt);

        let connect = TcpStream::connect(addr.as_str());
        tokio::pin!(connect);

        let result = loop {
            tokio::select! {
                result = &mut connect => break result,
                command = command_rx.recv() => match command {
                    Some(command) => outbox.accept(command),
                    None => return,
                },
            }
        };

        match result {
            Ok(stream) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("Could not disable Nagle: {}", e);
                }
                match connected(stream, &mut outbox, &mut command_rx, &event_tx).await {
                    SessionEnd::Closed => {}
                    SessionEnd::Shutdown => return,
                }
            }
            Err(e) => {
                warn!("Failed to connect to {}: {}", addr, e);
            }
        }

        let _ = event_tx.send(BridgeEvent::Disconnected);

        if !wait_collecting(delay, &mut outbox, &mut command_rx).await {
            return;
        }
    }
}

async fn connected(
    stream: TcpStream,
    outbox: &mut Outbox,
    command_rx: &mut mpsc::UnboundedReceiver<BridgeCommand>,
    event_tx: &mpsc::UnboundedSender<BridgeEvent>,
) -> SessionEnd {
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "server".to_string());
    let (mut reader, mut writer) = stream.into_split();

    if let Some(preamble) = &outbox.preamble {
        if let Err(e) = writer.write_all(preamble).await {
            warn!("Lost {} while writing the preamble: {}", peer, e);
            return SessionEnd::Closed;
        }
    }

    match outbox.queue.flush_to(&mut writer).await {
        Ok(0) => {}
        Ok(flushed) => debug!("Flushed {} queued sends to {}", flushed, peer),
        Err(e) => {
            warn!("Lost {} while flushing queued sends: {}", peer, e);
            return SessionEnd::Closed;
        }
    }

    info!("Connected to {}", peer);
    let _ = event_tx.send(BridgeEvent::Connected);

    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        tokio::select! {
            command = command_rx.recv() => {
                let (bytes, is_preamble) = match command {
                    Some(BridgeCommand::Send(bytes)) => (bytes, false),
                    Some(BridgeCommand::SetPreamble(bytes)) => {
                        outbox.preamble = Some(bytes.clone());
                        (bytes, true)
                    }
                    None => return SessionEnd::Shutdown,
                };
                if let Err(e) = writer.write_all(&bytes).await {
                    warn!("Write to {} failed: {}", peer, e);
                    // The preamble is rewritten on the next connection anyway
                    if !is_preamble {
                        outbox.queue.push(bytes);
                    }
                    return SessionEnd::Closed;
                }
            }

            read = reader.read(&mut buf) => {
                match read {
                    Ok(0) => {
                        info!("{} closed the connection", peer);
                        return SessionEnd::Closed;
                    }
                    Ok(n) => {
                        let _ = event_tx.send(BridgeEvent::Data(buf[..n].to_vec()));
                    }
                    Err(e) => {
                        warn!("Read from {} failed: {}", peer, e);
                        return SessionEnd::Closed;
                    }
                }
            }
        }
    }
}

/// Sleeps for the reconnect delay while still accepting commands.
/// Returns `false` once every handle is gone.
async fn wait_collecting(
    delay: Duration,
    outbox: &mut Outbox,
    command_rx: &mut mpsc::UnboundedReceiver<BridgeCommand>,
) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            command = command_rx.recv() => match command {
                Some(command) => outbox.accept(command),
                None => return false,
            },
        }
    }
}
