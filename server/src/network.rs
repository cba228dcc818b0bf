//! Server network layer: UDP session gateway, regen scheduler and chat
//! fan-out around the authoritative game state.

use crate::auth::TokenVerifier;
use crate::chat::ChatRelay;
use crate::client_manager::SessionManager;
use crate::game::{GameState, Joined};
use crate::utils::get_timestamp;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Direction, GamePatch, Packet, GRACE_PERIOD_MS, REGEN_TICK_MS};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// Messages sent from network tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    SessionTimeout {
        conn_id: u32,
        uid: String,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages sent from the main loop to the network sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        exclude: Option<u32>,
    },
}

/// A disconnected player waiting out the reconnect grace period.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingRemoval {
    conn_id: u32,
    deadline: u64,
}

/// Main server coordinating sessions, the grid authority and chat.
///
/// All state mutation happens inside `run`'s select loop: every event is
/// processed to completion before the next one, so the authority is a
/// de-facto single writer. Outbound sends go through a queue drained by a
/// separate task and never block mutation.
pub struct Server {
    socket: Arc<UdpSocket>,
    sessions: Arc<RwLock<SessionManager>>,
    game: GameState,
    chat: ChatRelay,
    verifier: Box<dyn TokenVerifier>,
    /// uid -> removal scheduled for when the grace period expires.
    pending_removals: HashMap<String, PendingRemoval>,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        verifier: Box<dyn TokenVerifier>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            sessions: Arc::new(RwLock::new(SessionManager::new())),
            game: GameState::new(),
            chat: ChatRelay::new(),
            verifier,
            pending_removals: HashMap::new(),
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    /// Spawns the task that continuously listens for incoming datagrams
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 65536];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns the task that drains the outgoing packet queue
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let sessions = Arc::clone(&self.sessions);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, exclude } => {
                        let session_addrs = {
                            let sessions_guard = sessions.read().await;
                            sessions_guard.session_addrs()
                        };

                        for (conn_id, addr) in session_addrs {
                            if Some(conn_id) == exclude {
                                continue;
                            }

                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to session {}: {}", conn_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns the task that detects silent sessions
    async fn spawn_timeout_checker(&self) {
        let sessions = Arc::clone(&self.sessions);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut sessions_guard = sessions.write().await;
                    sessions_guard.check_timeouts()
                };

                for session in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::SessionTimeout {
                        conn_id: session.conn_id,
                        uid: session.uid,
                    }) {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: &Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket {
            packet: packet.clone(),
            addr,
        }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: &Packet, exclude: Option<u32>) {
        if let Err(e) = self.game_tx.send(GameMessage::BroadcastPacket {
            packet: packet.clone(),
            exclude,
        }) {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    fn send_reject(&self, reason: &str, addr: SocketAddr) {
        self.send_packet(
            &Packet::Reject {
                reason: reason.to_string(),
            },
            addr,
        );
    }

    /// Dispatches one decoded packet from the wire
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        let known_conn = {
            let sessions = self.sessions.read().await;
            sessions.find_by_addr(addr)
        };
        if let Some(conn_id) = known_conn {
            self.sessions.write().await.touch(conn_id);
        }

        match packet {
            Packet::Connect { token } => self.handle_connect(&token, addr).await,
            Packet::Move { direction } => self.handle_move(known_conn, direction, addr),
            Packet::ChatSend { text } => self.handle_chat(known_conn, &text, addr, false).await,
            Packet::TeamChatSend { text } => self.handle_chat(known_conn, &text, addr, true).await,
            Packet::Disconnect => self.handle_disconnect(known_conn).await,
            _ => {
                warn!("Unexpected server-bound packet from {}", addr);
            }
        }
    }

    /// Handshake: verify the bearer token, bind a session, and admit the
    /// identity into the grid (spawn or reconnect).
    async fn handle_connect(&mut self, token: &str, addr: SocketAddr) {
        if token.is_empty() {
            self.send_reject("Missing token", addr);
            return;
        }

        let Some(identity) = self.verifier.verify(token) else {
            info!("Rejected connect from {}: invalid token", addr);
            self.send_reject("Invalid token", addr);
            return;
        };

        // A reconnect inside the grace window cancels the scheduled removal.
        if self.pending_removals.remove(&identity.uid).is_some() {
            debug!("Cancelled pending removal for uid {}", identity.uid);
        }

        // Drop stale sessions: one on this address, and one this uid may
        // still hold from a connection that never timed out.
        let (stale_here, stale_uid) = {
            let sessions = self.sessions.read().await;
            (
                sessions.find_by_addr(addr),
                sessions.find_by_uid(&identity.uid),
            )
        };
        if let Some(old_conn) = stale_here {
            let removed = self.sessions.write().await.remove_session(old_conn);
            if let Some(old) = removed {
                if old.uid != identity.uid {
                    self.game.remove_player(old_conn);
                }
            }
        }
        if let Some(old_conn) = stale_uid {
            self.sessions.write().await.remove_session(old_conn);
        }

        let conn_id = {
            let mut sessions = self.sessions.write().await;
            sessions.add_session(addr, identity.uid.clone())
        };

        let now = get_timestamp();
        match self.game.connect_player(conn_id, &identity, now) {
            None => {
                info!("Rejected connect for uid {}: map is full", identity.uid);
                self.send_reject("Map is full", addr);
                self.sessions.write().await.remove_session(conn_id);
            }
            Some(Joined::Spawn { init, painted }) => {
                let players = init.players.clone();
                self.send_packet(&Packet::Init { init }, addr);
                self.broadcast_packet(
                    &Packet::Patch {
                        patch: GamePatch {
                            painted,
                            players,
                            map: None,
                        },
                    },
                    Some(conn_id),
                );
                self.send_chat_history(conn_id, addr);
            }
            Some(Joined::Reconnect { init }) => {
                self.send_packet(&Packet::Init { init }, addr);
                self.broadcast_packet(
                    &Packet::Players {
                        players: self.game.public_players(),
                    },
                    None,
                );
                self.send_chat_history(conn_id, addr);
            }
        }
    }

    fn send_chat_history(&self, conn_id: u32, addr: SocketAddr) {
        self.send_packet(
            &Packet::ChatHistory {
                messages: self.chat.general_history(),
            },
            addr,
        );
        if let Some(team_index) = self.game.team_of(conn_id) {
            self.send_packet(
                &Packet::TeamChatHistory {
                    messages: self.chat.team_history(team_index),
                },
                addr,
            );
        }
    }

    fn handle_move(&mut self, conn: Option<u32>, direction: Direction, addr: SocketAddr) {
        let Some(conn_id) = conn else {
            warn!("Move from {} without a session", addr);
            return;
        };

        let now = get_timestamp();
        match self.game.move_player(conn_id, direction, now) {
            Ok(ok) => {
                if ok.map.is_some() {
                    debug!("Capture by team {} forced a full grid sync", ok.painted.team_index);
                }
                let self_state = ok.self_state.clone();
                self.broadcast_packet(
                    &Packet::Patch {
                        patch: GamePatch {
                            painted: ok.painted,
                            players: ok.players,
                            map: ok.map,
                        },
                    },
                    None,
                );
                self.send_packet(&Packet::SelfUpdate { self_state }, addr);
            }
            Err(reason) => {
                // Non-fatal: report to the requester only, and resend their
                // own state so the client UI resyncs.
                self.send_reject(&reason.to_string(), addr);
                if let Some(self_state) = self.game.self_state(conn_id, now) {
                    self.send_packet(&Packet::SelfUpdate { self_state }, addr);
                }
            }
        }
    }

    async fn handle_chat(&mut self, conn: Option<u32>, text: &str, addr: SocketAddr, team: bool) {
        let Some(conn_id) = conn else {
            warn!("Chat from {} without a session", addr);
            return;
        };
        let Some(author) = self.game.chat_author(conn_id) else {
            return;
        };

        let now = get_timestamp();
        if team {
            let Some(team_index) = self.game.team_of(conn_id) else {
                return;
            };
            let Some(message) = self.chat.post_team(team_index, author, text, now) else {
                return;
            };

            let recipients = self.game.conns_on_team(team_index);
            let sessions = self.sessions.read().await;
            for recipient in recipients {
                if let Some(recipient_addr) = sessions.addr_of(recipient) {
                    self.send_packet(
                        &Packet::TeamChatMessage {
                            message: message.clone(),
                        },
                        recipient_addr,
                    );
                }
            }
        } else if let Some(message) = self.chat.post_general(author, text, now) {
            self.broadcast_packet(&Packet::ChatMessage { message }, None);
        }
    }

    async fn handle_disconnect(&mut self, conn: Option<u32>) {
        let Some(conn_id) = conn else {
            return;
        };
        let removed = self.sessions.write().await.remove_session(conn_id);
        if let Some(session) = removed {
            self.schedule_removal(session.conn_id, session.uid);
        }
    }

    /// Starts the grace timer for a disconnected player. A later disconnect
    /// for the same uid restarts the window.
    fn schedule_removal(&mut self, conn_id: u32, uid: String) {
        let deadline = get_timestamp() + GRACE_PERIOD_MS;
        debug!("Grace period started for uid {} (conn {})", uid, conn_id);
        self.pending_removals
            .insert(uid, PendingRemoval { conn_id, deadline });
    }

    /// Removes players whose grace period ran out without a reconnect.
    fn sweep_pending_removals(&mut self, now: u64) {
        let expired: Vec<String> = self
            .pending_removals
            .iter()
            .filter(|(_, pending)| pending.deadline <= now)
            .map(|(uid, _)| uid.clone())
            .collect();

        for uid in expired {
            let Some(pending) = self.pending_removals.remove(&uid) else {
                continue;
            };
            if self.game.remove_player(pending.conn_id) {
                info!("Grace period expired for uid {}", uid);
                self.broadcast_packet(
                    &Packet::Players {
                        players: self.game.public_players(),
                    },
                    None,
                );
            }
        }
    }

    /// Pushes each affected player's own resource state to that player's
    /// connection only. Regen is private information, never broadcast.
    async fn push_regen_updates(&mut self, now: u64) {
        let updates = self.game.tick_regen(now);
        if updates.is_empty() {
            return;
        }

        let sessions = self.sessions.read().await;
        for (conn_id, self_state) in updates {
            if let Some(addr) = sessions.addr_of(conn_id) {
                self.send_packet(&Packet::SelfUpdate { self_state }, addr);
            }
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;

        let mut regen_interval = interval(Duration::from_millis(REGEN_TICK_MS));

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::SessionTimeout { conn_id, uid }) => {
                            debug!("Session {} timed out (uid {})", conn_id, uid);
                            self.schedule_removal(conn_id, uid);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = regen_interval.tick() => {
                    let now = get_timestamp();
                    self.push_regen_updates(now).await;
                    self.sweep_pending_removals(now);
                },
            }
        }

        Ok(())
    }
}
