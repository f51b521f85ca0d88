//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::layout::{Team, TeamScores};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Request to join an arena
    JoinArena {
        /// Optional specific arena ID, otherwise the server assigns one
        arena_id: Option<Uuid>,
        /// Preferred team; the server balances when omitted
        team: Option<Team>,
        display_name: Option<String>,
    },

    /// Player input for current tick
    InputTick {
        /// Sequence number; out-of-order frames are dropped
        seq: u32,
        /// Throttle (0.0 - 1.0)
        gas: f32,
        /// Brake / reverse (0.0 - 1.0)
        brake: f32,
        /// Steering and air-roll/yaw axis (-1.0 = left, 1.0 = right)
        horizontal: f32,
        /// Air-pitch and dodge-direction axis (-1.0 = back, 1.0 = forward)
        vertical: f32,
        /// Jump / flip / dodge button
        jump: bool,
        /// Boost button
        boost: bool,
        /// Air-roll modifier: horizontal rolls instead of yawing
        roll: bool,
        /// Restart request (only honored after a match has ended)
        restart: bool,
    },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Leave current arena
    LeaveArena,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        user_id: Uuid,
        server_time: u64,
    },

    /// Confirmation of arena join
    ArenaJoined {
        arena_id: Uuid,
        /// Team the joining player was placed on
        team: Team,
        /// All players in the arena at join time
        players: Vec<PlayerInfo>,
    },

    /// Player joined the arena
    PlayerJoined {
        player: PlayerInfo,
    },

    /// Player left the arena
    PlayerLeft {
        user_id: Uuid,
        reason: String,
    },

    /// Game state snapshot (sent at regular intervals)
    Snapshot {
        /// Server tick number
        tick: u64,
        /// Current round phase name
        phase: String,
        scores: TeamScores,
        /// Match clock remaining, in seconds
        time_left: f32,
        /// Whether the match clock is currently counting down
        timer_running: bool,
        vehicles: Vec<VehicleSnapshot>,
        ball: BallSnapshot,
        /// Events that occurred since last snapshot
        events: Vec<GameEvent>,
    },

    /// Pre-round countdown display value (3, 2, 1); zero means "GO"
    Countdown {
        value: u32,
    },

    /// A fresh match is starting
    MatchStarted {
        scores: TeamScores,
    },

    /// Countdown finished, controls are live
    RoundLive {
        tick: u64,
    },

    /// A goal was scored
    GoalScored {
        /// Team credited with the goal
        team: Team,
        scores: TeamScores,
    },

    /// Match clock expired
    MatchEnded {
        /// Winning team, or `None` for a draw
        winner: Option<Team>,
        scores: TeamScores,
    },

    /// Error message
    Error {
        code: String,
        message: String,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// Player info for lobby/join
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub user_id: Uuid,
    pub display_name: String,
    pub team: Team,
}

/// One vehicle's state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub user_id: Uuid,
    pub team: Team,
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    /// Boost tank (0-100)
    pub boost: f32,
    pub grounded: bool,
    pub flipped: bool,
    pub boosting: bool,
    /// Last processed input sequence
    pub last_input_seq: u32,
}

/// Ball state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallSnapshot {
    pub position: Vec3,
    pub velocity: Vec3,
    /// False while the ball is out of play after a goal
    pub visible: bool,
}

/// Game events (maneuvers, pickups, impacts)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GameEvent {
    /// A vehicle jumped
    Jump {
        user_id: Uuid,
    },

    /// A vehicle flipped itself off its roof
    Flip {
        user_id: Uuid,
    },

    /// A vehicle performed a dodge flip
    DodgeFlip {
        user_id: Uuid,
    },

    /// A vehicle collected a boost pad
    BoostCollected {
        user_id: Uuid,
        amount: f32,
    },

    /// A vehicle struck the ball
    BallStruck {
        user_id: Uuid,
        /// Impact speed, for hit-sound intensity
        speed: f32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_msg_wire_format() {
        let json = r#"{
            "type": "input_tick",
            "seq": 7,
            "gas": 1.0,
            "brake": 0.0,
            "horizontal": -0.5,
            "vertical": 0.0,
            "jump": true,
            "boost": false,
            "roll": false,
            "restart": false
        }"#;
        let msg: ClientMsg = serde_json::from_str(json).unwrap();
        match msg {
            ClientMsg::InputTick { seq, horizontal, jump, .. } => {
                assert_eq!(seq, 7);
                assert_eq!(horizontal, -0.5);
                assert!(jump);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_server_msg_tags_snake_case() {
        let msg = ServerMsg::GoalScored {
            team: Team::Blue,
            scores: TeamScores { orange: 0, blue: 1 },
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"goal_scored""#));
        assert!(json.contains(r#""team":"blue""#));
    }
}
