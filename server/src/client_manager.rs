//! Connection and session bookkeeping for the game server
//!
//! Every accepted socket gets a `Client` entry keyed by its connection id.
//! A client moves through `Connected` (no session yet) to `LoggedIn` once a
//! LOGIN allocates a `Session`; removing the entry is the terminal
//! `Disconnected` state. Session ids come from a monotonically increasing
//! counter owned by the manager, never from a global.

use log::info;
use std::collections::BTreeMap;
use std::net::SocketAddr;

/// Server-local identifier of one accepted socket
pub type ConnectionId = u64;

/// Authoritative record of one logged-in player
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: u32,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub hp: i32,
    pub max_hp: i32,
}

impl Session {
    pub fn new(id: u32, name: String, x: f32, y: f32, max_hp: i32) -> Self {
        Self {
            id,
            name,
            x,
            y,
            hp: max_hp,
            max_hp,
        }
    }

    pub fn distance_sq(&self, x: f32, y: f32) -> f32 {
        let dx = self.x - x;
        let dy = self.y - y;
        dx * dx + dy * dy
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Connected,
    LoggedIn,
}

/// One accepted socket and, after LOGIN, its session
#[derive(Debug)]
pub struct Client {
    pub conn_id: ConnectionId,
    pub addr: SocketAddr,
    pub session: Option<Session>,
}

impl Client {
    pub fn new(conn_id: ConnectionId, addr: SocketAddr) -> Self {
        Self {
            conn_id,
            addr,
            session: None,
        }
    }

    pub fn state(&self) -> ClientState {
        if self.session.is_some() {
            ClientState::LoggedIn
        } else {
            ClientState::Connected
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginError {
    UnknownConnection,
    AlreadyLoggedIn { session_id: u32 },
}

/// Table of live connections plus the session id allocator
pub struct ClientManager {
    clients: BTreeMap<ConnectionId, Client>,
    next_session_id: u32,
}

impl ClientManager {
    /// `first_session_id` must be non-zero; id 0 is the system chat sender
    pub fn new(first_session_id: u32) -> Self {
        Self {
            clients: BTreeMap::new(),
            next_session_id: first_session_id.max(1),
        }
    }

    /// Registers a freshly accepted socket. Returns false on a duplicate id.
    pub fn add_client(&mut self, conn_id: ConnectionId, addr: SocketAddr) -> bool {
        if self.clients.contains_key(&conn_id) {
            return false;
        }
        info!("Connection {} accepted from {}", conn_id, addr);
        self.clients.insert(conn_id, Client::new(conn_id, addr));
        true
    }

    pub fn remove_client(&mut self, conn_id: ConnectionId) -> Option<Client> {
        let client = self.clients.remove(&conn_id)?;
        match &client.session {
            Some(session) => info!(
                "Connection {} closed, session {} ({}) removed",
                conn_id, session.id, session.name
            ),
            None => info!("Connection {} closed before login", conn_id),
        }
        Some(client)
    }

    /// Creates the session for a connection; at most one per socket
    pub fn login(
        &mut self,
        conn_id: ConnectionId,
        name: String,
        x: f32,
        y: f32,
        max_hp: i32,
    ) -> Result<u32, LoginError> {
        let next_id = self.next_session_id;
        let client = self
            .clients
            .get_mut(&conn_id)
            .ok_or(LoginError::UnknownConnection)?;

        if let Some(session) = &client.session {
            return Err(LoginError::AlreadyLoggedIn {
                session_id: session.id,
            });
        }

        client.session = Some(Session::new(next_id, name, x, y, max_hp));
        // Skip 0 if the counter ever wraps
        self.next_session_id = next_id.wrapping_add(1).max(1);
        Ok(next_id)
    }

    pub fn session(&self, conn_id: ConnectionId) -> Option<&Session> {
        self.clients.get(&conn_id)?.session.as_ref()
    }

    pub fn session_mut(&mut self, conn_id: ConnectionId) -> Option<&mut Session> {
        self.clients.get_mut(&conn_id)?.session.as_mut()
    }

    pub fn find_session_mut(&mut self, session_id: u32) -> Option<&mut Session> {
        self.clients
            .values_mut()
            .filter_map(|client| client.session.as_mut())
            .find(|session| session.id == session_id)
    }

    pub fn find_session(&self, session_id: u32) -> Option<&Session> {
        self.sessions().find(|session| session.id == session_id)
    }

    /// All logged-in sessions, in connection order
    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.clients
            .values()
            .filter_map(|client| client.session.as_ref())
    }

    pub fn clients(&self) -> impl Iterator<Item = &Client> {
        self.clients.values()
    }

    pub fn get(&self, conn_id: ConnectionId) -> Option<&Client> {
        self.clients.get(&conn_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions().count()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
