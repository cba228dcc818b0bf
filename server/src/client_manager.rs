//! Session tracking for the gateway: maps live connections to addresses and
//! stable identities, and detects silent disconnects.
//!
//! A session is one connection's lifecycle, distinct from the player entity
//! it binds to. Sessions die on explicit disconnect or timeout; the player
//! they pointed at survives until the grace period runs out without a
//! reconnect.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Sessions that stay silent this long are treated as disconnected.
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(5);

/// One live connection bound to a verified identity.
#[derive(Debug, Clone)]
pub struct Session {
    /// Transient connection id, reassigned on every connect.
    pub conn_id: u32,
    /// Network address for sending responses.
    pub addr: SocketAddr,
    /// Stable account id this connection authenticated as.
    pub uid: String,
    /// Last time any packet arrived from this connection.
    pub last_seen: Instant,
}

impl Session {
    pub fn new(conn_id: u32, addr: SocketAddr, uid: String) -> Self {
        Self {
            conn_id,
            addr,
            uid,
            last_seen: Instant::now(),
        }
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Registry of live sessions indexed by connection id.
pub struct SessionManager {
    sessions: HashMap<u32, Session>,
    next_conn_id: u32,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            next_conn_id: 1,
        }
    }

    /// Registers a new authenticated connection and returns its id. Capacity
    /// is the grid's concern, not the session layer's.
    pub fn add_session(&mut self, addr: SocketAddr, uid: String) -> u32 {
        let conn_id = self.next_conn_id;
        self.next_conn_id += 1;

        info!("Session {} opened from {} for uid {}", conn_id, addr, uid);
        self.sessions.insert(conn_id, Session::new(conn_id, addr, uid));
        conn_id
    }

    pub fn remove_session(&mut self, conn_id: u32) -> Option<Session> {
        let session = self.sessions.remove(&conn_id);
        if let Some(session) = &session {
            info!("Session {} closed (uid {})", session.conn_id, session.uid);
        }
        session
    }

    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.sessions
            .iter()
            .find(|(_, session)| session.addr == addr)
            .map(|(id, _)| *id)
    }

    pub fn find_by_uid(&self, uid: &str) -> Option<u32> {
        self.sessions
            .iter()
            .find(|(_, session)| session.uid == uid)
            .map(|(id, _)| *id)
    }

    pub fn addr_of(&self, conn_id: u32) -> Option<SocketAddr> {
        self.sessions.get(&conn_id).map(|session| session.addr)
    }

    /// Marks a connection as alive.
    pub fn touch(&mut self, conn_id: u32) {
        if let Some(session) = self.sessions.get_mut(&conn_id) {
            session.last_seen = Instant::now();
        }
    }

    /// Removes and returns every session that exceeded [`SESSION_TIMEOUT`].
    pub fn check_timeouts(&mut self) -> Vec<Session> {
        let timed_out: Vec<u32> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.is_timed_out(SESSION_TIMEOUT))
            .map(|(id, _)| *id)
            .collect();

        timed_out
            .into_iter()
            .filter_map(|conn_id| self.remove_session(conn_id))
            .collect()
    }

    /// All (connection id, address) pairs, for broadcast fan-out.
    pub fn session_addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.sessions
            .iter()
            .map(|(id, session)| (*id, session.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
