//! Authoritative grid state: player registry, occupancy index, move economy
//! and the capture hook. Pure state and algorithm, no network I/O.

use crate::auth::Identity;
use crate::capture;
use log::info;
use rand::Rng;
use shared::{
    cell_index, in_bounds, team_index_from_name, team_name, teams, ChatUser, Direction, GameInit,
    MoveError, PaintedCell, RemotePlayer, SelfState, MAP_SIZE, MAX_MOVES, MOVE_REGEN_MS,
    SPAWN_SAMPLE_ATTEMPTS, TEAM_COUNT, UNCLAIMED,
};
use std::collections::HashMap;

/// One live player. `conn_id` is the transient per-connection handle and is
/// rebound on reconnect; `uid` is the stable account identity.
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub conn_id: u32,
    pub uid: String,
    pub name: String,
    pub team_index: u8,
    pub x: i32,
    pub y: i32,
    pub moves: u32,
    pub last_regen_at: u64,
}

impl PlayerState {
    /// Applies whole elapsed regen intervals to the move balance.
    ///
    /// The anchor advances by exactly the consumed intervals so fractional
    /// progress carries over between calls; once the balance reaches cap the
    /// anchor snaps to `now`. Returns whether the balance changed.
    fn apply_regen(&mut self, now: u64) -> bool {
        if self.moves >= MAX_MOVES {
            return false;
        }

        let elapsed = now.saturating_sub(self.last_regen_at);
        let gained = elapsed / MOVE_REGEN_MS;
        if gained == 0 {
            return false;
        }

        self.moves = MAX_MOVES.min(self.moves + gained as u32);
        self.last_regen_at += gained * MOVE_REGEN_MS;
        if self.moves >= MAX_MOVES {
            self.last_regen_at = now;
        }

        true
    }

    fn ms_to_next_move(&self, now: u64) -> u64 {
        if self.moves >= MAX_MOVES {
            return 0;
        }
        MOVE_REGEN_MS.saturating_sub(now.saturating_sub(self.last_regen_at))
    }

    fn self_state(&self, now: u64) -> SelfState {
        SelfState {
            id: self.conn_id,
            team_index: self.team_index,
            x: self.x,
            y: self.y,
            moves: self.moves,
            ms_to_next_move: self.ms_to_next_move(now),
        }
    }

    fn remote(&self) -> RemotePlayer {
        RemotePlayer {
            id: self.conn_id,
            team_index: self.team_index,
            x: self.x,
            y: self.y,
        }
    }
}

/// Outcome of a successful connect.
#[derive(Debug, Clone)]
pub enum Joined {
    /// First connect for this uid: a cell was painted and occupied.
    Spawn { init: GameInit, painted: PaintedCell },
    /// Same uid was already live: the connection handle was rebound.
    Reconnect { init: GameInit },
}

/// Outcome of a successful move. `map` carries the full grid only when the
/// capture pass converted cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOk {
    pub painted: PaintedCell,
    pub players: Vec<RemotePlayer>,
    pub self_state: SelfState,
    pub map: Option<Vec<i8>>,
}

/// The single writer for all canonical game state. Every mutation funnels
/// through its methods and runs to completion before the next event.
pub struct GameState {
    map: Vec<i8>,
    players: HashMap<u32, PlayerState>,
    uid_index: HashMap<String, u32>,
    occupied: HashMap<usize, u32>,
}

impl GameState {
    pub fn new() -> Self {
        Self {
            map: vec![UNCLAIMED; MAP_SIZE * MAP_SIZE],
            players: HashMap::new(),
            uid_index: HashMap::new(),
            occupied: HashMap::new(),
        }
    }

    /// Admits a verified identity under a fresh connection id.
    ///
    /// A uid that is already live reconnects: the old connection handle is
    /// replaced in the registry and occupancy index, everything else is
    /// preserved. A new uid spawns on a random free cell, painting it for
    /// its team. Returns `None` when the grid has no free cell.
    pub fn connect_player(&mut self, conn_id: u32, user: &Identity, now: u64) -> Option<Joined> {
        if let Some(&old_conn) = self.uid_index.get(&user.uid) {
            let mut player = self.players.remove(&old_conn)?;
            info!(
                "Player {} ({}) reconnected: conn {} -> {}",
                user.uid, player.name, old_conn, conn_id
            );
            player.conn_id = conn_id;
            self.occupied.insert(cell_index(player.x, player.y), conn_id);
            self.players.insert(conn_id, player);
            self.uid_index.insert(user.uid.clone(), conn_id);

            let player = self.players.get(&conn_id)?;
            let init = self.init_snapshot(player, now);
            return Some(Joined::Reconnect { init });
        }

        let team_index =
            team_index_from_name(&user.team).unwrap_or_else(|| self.least_populated_team());
        let (x, y) = self.random_free_position()?;
        let spawn_index = cell_index(x, y);

        let player = PlayerState {
            conn_id,
            uid: user.uid.clone(),
            name: user.name.clone(),
            team_index,
            x,
            y,
            moves: MAX_MOVES,
            last_regen_at: now,
        };

        info!(
            "Player {} ({}) spawned at ({}, {}) on team {}",
            user.uid,
            user.name,
            x,
            y,
            team_name(team_index)
        );

        self.players.insert(conn_id, player);
        self.uid_index.insert(user.uid.clone(), conn_id);
        self.occupied.insert(spawn_index, conn_id);
        self.map[spawn_index] = team_index as i8;

        let painted = PaintedCell { x, y, team_index };
        let player = self.players.get(&conn_id)?;
        let init = self.init_snapshot(player, now);
        Some(Joined::Spawn { init, painted })
    }

    /// Removes a player and vacates their cell. The painted grid is left as
    /// is; only occupancy and the registries change.
    pub fn remove_player(&mut self, conn_id: u32) -> bool {
        let Some(player) = self.players.remove(&conn_id) else {
            return false;
        };

        self.occupied.remove(&cell_index(player.x, player.y));
        self.uid_index.remove(&player.uid);
        info!("Player {} ({}) removed", player.uid, player.name);
        true
    }

    /// Validates and applies one move. Check order: player exists, pending
    /// regen applied, balance available, destination in bounds, destination
    /// unoccupied. The first failure wins and nothing is mutated.
    pub fn move_player(
        &mut self,
        conn_id: u32,
        direction: Direction,
        now: u64,
    ) -> Result<MoveOk, MoveError> {
        let (cur_x, cur_y) = {
            let player = self.players.get_mut(&conn_id).ok_or(MoveError::NotFound)?;
            player.apply_regen(now);
            if player.moves == 0 {
                return Err(MoveError::NoMoves);
            }
            (player.x, player.y)
        };

        let (dx, dy) = direction.delta();
        let next_x = cur_x + dx;
        let next_y = cur_y + dy;
        if !in_bounds(next_x, next_y) {
            return Err(MoveError::OutOfBounds);
        }

        let next_index = cell_index(next_x, next_y);
        if self.occupied.contains_key(&next_index) {
            return Err(MoveError::Occupied);
        }

        self.occupied.remove(&cell_index(cur_x, cur_y));
        self.occupied.insert(next_index, conn_id);

        let (team_index, self_state) = {
            let player = self.players.get_mut(&conn_id).ok_or(MoveError::NotFound)?;
            let was_at_cap = player.moves >= MAX_MOVES;
            player.x = next_x;
            player.y = next_y;
            player.moves -= 1;
            if was_at_cap {
                player.last_regen_at = now;
            }
            (player.team_index, player.self_state(now))
        };

        self.map[next_index] = team_index as i8;
        let captured = capture::fill_captured(&mut self.map, MAP_SIZE, team_index);

        Ok(MoveOk {
            painted: PaintedCell {
                x: next_x,
                y: next_y,
                team_index,
            },
            players: self.public_players(),
            self_state,
            map: captured.then(|| self.map.clone()),
        })
    }

    /// Regenerates every player's balance for the elapsed time. Returns an
    /// update for each player whose balance changed or still sits below cap,
    /// so the client countdown stays live between whole intervals.
    pub fn tick_regen(&mut self, now: u64) -> Vec<(u32, SelfState)> {
        let mut updates = Vec::new();
        for player in self.players.values_mut() {
            let changed = player.apply_regen(now);
            if changed || player.moves < MAX_MOVES {
                updates.push((player.conn_id, player.self_state(now)));
            }
        }
        updates
    }

    pub fn self_state(&self, conn_id: u32, now: u64) -> Option<SelfState> {
        self.players.get(&conn_id).map(|p| p.self_state(now))
    }

    pub fn public_players(&self) -> Vec<RemotePlayer> {
        self.players.values().map(PlayerState::remote).collect()
    }

    pub fn team_of(&self, conn_id: u32) -> Option<u8> {
        self.players.get(&conn_id).map(|p| p.team_index)
    }

    pub fn conns_on_team(&self, team_index: u8) -> Vec<u32> {
        self.players
            .values()
            .filter(|p| p.team_index == team_index)
            .map(|p| p.conn_id)
            .collect()
    }

    pub fn chat_author(&self, conn_id: u32) -> Option<ChatUser> {
        self.players.get(&conn_id).map(|p| ChatUser {
            id: p.uid.clone(),
            name: p.name.clone(),
            team: team_name(p.team_index).to_string(),
        })
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn map(&self) -> &[i8] {
        &self.map
    }

    fn init_snapshot(&self, player: &PlayerState, now: u64) -> GameInit {
        GameInit {
            map_size: MAP_SIZE as u32,
            map: self.map.clone(),
            teams: teams(),
            players: self.public_players(),
            self_state: player.self_state(now),
        }
    }

    fn least_populated_team(&self) -> u8 {
        let mut counts = [0u32; TEAM_COUNT];
        for player in self.players.values() {
            counts[player.team_index as usize % TEAM_COUNT] += 1;
        }

        let mut min_index = 0;
        for i in 1..TEAM_COUNT {
            if counts[i] < counts[min_index] {
                min_index = i;
            }
        }
        min_index as u8
    }

    /// Uniform rejection sampling over free cells, with a deterministic
    /// linear scan fallback when sampling keeps hitting occupied cells.
    fn random_free_position(&self) -> Option<(i32, i32)> {
        let total = MAP_SIZE * MAP_SIZE;
        if self.occupied.len() >= total {
            return None;
        }

        let mut rng = rand::thread_rng();
        for _ in 0..SPAWN_SAMPLE_ATTEMPTS {
            let x = rng.gen_range(0..MAP_SIZE);
            let y = rng.gen_range(0..MAP_SIZE);
            if !self.occupied.contains_key(&(y * MAP_SIZE + x)) {
                return Some((x as i32, y as i32));
            }
        }

        for index in 0..total {
            if !self.occupied.contains_key(&index) {
                return Some(((index % MAP_SIZE) as i32, (index / MAP_SIZE) as i32));
            }
        }

        None
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}
