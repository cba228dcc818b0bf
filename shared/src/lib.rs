use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAP_SIZE: usize = 50;
pub const MAX_MOVES: u32 = 5;
pub const MOVE_REGEN_MS: u64 = 2_000;
pub const UNCLAIMED: i8 = -1;
pub const TEAM_COUNT: usize = 4;
pub const GRACE_PERIOD_MS: u64 = 3_000;
pub const REGEN_TICK_MS: u64 = 1_000;
pub const CHAT_CAPACITY: usize = 100;
pub const CHAT_MAX_LEN: usize = 280;
pub const SPAWN_SAMPLE_ATTEMPTS: usize = 5_000;

const TEAM_NAMES: [&str; TEAM_COUNT] = ["Blue", "Green", "Red", "Purple"];
const TEAM_COLORS: [&str; TEAM_COUNT] = ["#2563eb", "#16a34a", "#dc2626", "#9333ea"];

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Team {
    pub name: String,
    pub color: String,
}

/// The four fixed teams, in index order.
pub fn teams() -> Vec<Team> {
    TEAM_NAMES
        .iter()
        .zip(TEAM_COLORS.iter())
        .map(|(name, color)| Team {
            name: (*name).to_string(),
            color: (*color).to_string(),
        })
        .collect()
}

pub fn team_index_from_name(name: &str) -> Option<u8> {
    TEAM_NAMES.iter().position(|n| *n == name).map(|i| i as u8)
}

pub fn team_name(index: u8) -> &'static str {
    TEAM_NAMES[index as usize % TEAM_COUNT]
}

/// Grid origin (0,0) is top-left; x grows rightward, y downward.
pub fn cell_index(x: i32, y: i32) -> usize {
    y as usize * MAP_SIZE + x as usize
}

pub fn in_bounds(x: i32, y: i32) -> bool {
    x >= 0 && y >= 0 && (x as usize) < MAP_SIZE && (y as usize) < MAP_SIZE
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

/// Reasons a move request is refused. The display strings are the exact
/// wire reasons clients show to the player.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MoveError {
    #[error("Player not found")]
    NotFound,
    #[error("No moves available")]
    NoMoves,
    #[error("Out of bounds")]
    OutOfBounds,
    #[error("Pixel occupied")]
    Occupied,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RemotePlayer {
    pub id: u32,
    pub team_index: u8,
    pub x: i32,
    pub y: i32,
}

/// A player's private view of their own resources. `ms_to_next_move` drives
/// the client-side regen countdown and is 0 while the balance sits at cap.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SelfState {
    pub id: u32,
    pub team_index: u8,
    pub x: i32,
    pub y: i32,
    pub moves: u32,
    pub ms_to_next_move: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct PaintedCell {
    pub x: i32,
    pub y: i32,
    pub team_index: u8,
}

/// Full snapshot sent to a connection entering the game. The map is the
/// flattened row-major grid: UNCLAIMED or an owning team index per cell.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GameInit {
    pub map_size: u32,
    pub map: Vec<i8>,
    pub teams: Vec<Team>,
    pub players: Vec<RemotePlayer>,
    pub self_state: SelfState,
}

/// Incremental paint update. `map` is only present when a capture pass
/// converted enclosed cells, in which case clients resync the whole grid.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GamePatch {
    pub painted: PaintedCell,
    pub players: Vec<RemotePlayer>,
    pub map: Option<Vec<i8>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatUser {
    pub id: String,
    pub name: String,
    pub team: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: u64,
    pub user: ChatUser,
    pub text: String,
    pub created_at: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    // Client to server
    Connect { token: String },
    Move { direction: Direction },
    ChatSend { text: String },
    TeamChatSend { text: String },
    Disconnect,

    // Server to client
    Init { init: GameInit },
    Patch { patch: GamePatch },
    Players { players: Vec<RemotePlayer> },
    SelfUpdate { self_state: SelfState },
    Reject { reason: String },
    ChatHistory { messages: Vec<ChatMessage> },
    ChatMessage { message: ChatMessage },
    TeamChatHistory { messages: Vec<ChatMessage> },
    TeamChatMessage { message: ChatMessage },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_table() {
        let teams = teams();
        assert_eq!(teams.len(), TEAM_COUNT);
        assert_eq!(teams[0].name, "Blue");
        assert_eq!(teams[0].color, "#2563eb");
        assert_eq!(teams[3].name, "Purple");
    }

    #[test]
    fn test_team_index_from_name() {
        assert_eq!(team_index_from_name("Blue"), Some(0));
        assert_eq!(team_index_from_name("Green"), Some(1));
        assert_eq!(team_index_from_name("Red"), Some(2));
        assert_eq!(team_index_from_name("Purple"), Some(3));
        assert_eq!(team_index_from_name("Orange"), None);
        assert_eq!(team_index_from_name(""), None);
    }

    #[test]
    fn test_direction_deltas() {
        assert_eq!(Direction::Up.delta(), (0, -1));
        assert_eq!(Direction::Down.delta(), (0, 1));
        assert_eq!(Direction::Left.delta(), (-1, 0));
        assert_eq!(Direction::Right.delta(), (1, 0));
    }

    #[test]
    fn test_cell_index_row_major() {
        assert_eq!(cell_index(0, 0), 0);
        assert_eq!(cell_index(1, 0), 1);
        assert_eq!(cell_index(0, 1), MAP_SIZE);
        assert_eq!(
            cell_index(MAP_SIZE as i32 - 1, MAP_SIZE as i32 - 1),
            MAP_SIZE * MAP_SIZE - 1
        );
    }

    #[test]
    fn test_in_bounds() {
        assert!(in_bounds(0, 0));
        assert!(in_bounds(MAP_SIZE as i32 - 1, MAP_SIZE as i32 - 1));
        assert!(!in_bounds(-1, 0));
        assert!(!in_bounds(0, -1));
        assert!(!in_bounds(MAP_SIZE as i32, 0));
        assert!(!in_bounds(0, MAP_SIZE as i32));
    }

    #[test]
    fn test_move_error_wire_reasons() {
        assert_eq!(MoveError::NotFound.to_string(), "Player not found");
        assert_eq!(MoveError::NoMoves.to_string(), "No moves available");
        assert_eq!(MoveError::OutOfBounds.to_string(), "Out of bounds");
        assert_eq!(MoveError::Occupied.to_string(), "Pixel occupied");
    }

    #[test]
    fn test_packet_serialization_connect() {
        let packet = Packet::Connect {
            token: "uid:Name:Blue".to_string(),
        };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Connect { token } => assert_eq!(token, "uid:Name:Blue"),
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_move() {
        let packet = Packet::Move {
            direction: Direction::Right,
        };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Move { direction } => assert_eq!(direction, Direction::Right),
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_init() {
        let init = GameInit {
            map_size: MAP_SIZE as u32,
            map: vec![UNCLAIMED; MAP_SIZE * MAP_SIZE],
            teams: teams(),
            players: vec![RemotePlayer {
                id: 1,
                team_index: 2,
                x: 10,
                y: 20,
            }],
            self_state: SelfState {
                id: 1,
                team_index: 2,
                x: 10,
                y: 20,
                moves: MAX_MOVES,
                ms_to_next_move: 0,
            },
        };

        let packet = Packet::Init { init: init.clone() };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Init { init: decoded } => assert_eq!(decoded, init),
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_patch_with_capture() {
        let patch = GamePatch {
            painted: PaintedCell {
                x: 5,
                y: 6,
                team_index: 1,
            },
            players: vec![],
            map: Some(vec![1; MAP_SIZE * MAP_SIZE]),
        };

        let packet = Packet::Patch {
            patch: patch.clone(),
        };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Patch { patch: decoded } => {
                assert_eq!(decoded, patch);
                assert!(decoded.map.is_some());
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_chat_message() {
        let message = ChatMessage {
            id: 7,
            user: ChatUser {
                id: "uid-1".to_string(),
                name: "Ada".to_string(),
                team: "Red".to_string(),
            },
            text: "hello".to_string(),
            created_at: 1_700_000_000_000,
        };

        let packet = Packet::ChatMessage {
            message: message.clone(),
        };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::ChatMessage { message: decoded } => assert_eq!(decoded, message),
            _ => panic!("Wrong packet type after deserialization"),
        }
    }
}
