//! WebSocket protocol message definitions
//! These are the wire types between the server, overlays and the control panel

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::agent::Weapon;
use crate::game::supply::SupplyKind;

/// Match lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Idle, configuration only
    Setup,
    /// Accepting chat joins
    Lobby,
    /// Simulation running
    Battle,
    /// Exactly one agent left standing
    Winner,
    /// Everyone died at once
    Draw,
}

impl MatchPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, MatchPhase::Winner | MatchPhase::Draw)
    }
}

/// Messages sent from overlay/control clients to the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Open the lobby for chat joins (admin)
    OpenLobby,

    /// Freeze the roster and start fighting (admin)
    StartBattle,

    /// Remove an agent from the fight (admin)
    Eliminate { username: String },

    /// Back to setup (admin)
    Reset,
}

/// Messages sent from server to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        server_time: u64,
        /// Whether this session may send admin messages
        admin: bool,
    },

    /// Game state snapshot (sent at regular intervals)
    Snapshot { snapshot: MatchSnapshot },

    /// Events that happened since the last broadcast
    Events { frame: u64, events: Vec<GameEvent> },

    /// Lifecycle transition
    PhaseChanged { phase: MatchPhase },

    /// Round is over
    MatchEnd {
        winner: Option<String>,
        stats: MatchStats,
    },

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// Immutable per-frame view handed to renderers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub match_id: Uuid,
    pub frame: u64,
    pub phase: MatchPhase,
    pub arena_radius: f32,
    pub zone_radius: f32,
    pub agents: Vec<AgentSnapshot>,
    pub supplies: Vec<SupplySnapshot>,
    /// Usernames waiting in the lobby
    pub lobby: Vec<String>,
    pub winner: Option<String>,
}

/// Agent state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub username: String,
    /// Resolved avatar reference; overlays draw initials when missing
    pub avatar: Option<String>,
    pub weapon: Weapon,
    pub x: f32,
    pub y: f32,
    /// Facing angle in radians
    pub facing: f32,
    pub radius: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub alive: bool,
    pub kills: u32,
    pub powered: bool,
    pub hasted: bool,
    pub slowed: bool,
}

/// Supply drop in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplySnapshot {
    pub id: u32,
    pub kind: SupplyKind,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

/// Why an agent died
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KillCause {
    Combat,
    Storm,
    Hazard,
    Eliminated,
}

/// Game events (joins, hits, kills, etc.)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GameEvent {
    /// Chat participant entered the lobby
    Joined {
        username: String,
        weapon: Option<Weapon>,
    },

    /// Roster frozen, fight begins
    BattleStarted { participants: u32 },

    /// Non-damaging weapon clash
    Clash { a: String, b: String, x: f32, y: f32 },

    /// Damage dealt in a combat exchange
    Hit {
        attacker: String,
        target: String,
        damage: f32,
    },

    /// Agent died
    Kill {
        killer: Option<String>,
        victim: String,
        cause: KillCause,
    },

    /// Supply landed
    SupplySpawned {
        id: u32,
        kind: SupplyKind,
        x: f32,
        y: f32,
    },

    /// Supply collected
    SupplyPicked {
        id: u32,
        kind: SupplyKind,
        username: String,
    },

    /// Supply despawned unclaimed
    SupplyExpired { id: u32 },

    /// Last agent standing
    Winner {
        username: String,
        kills: u32,
        points: u32,
    },

    /// Nobody survived
    Draw,
}

/// Match statistics at end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchStats {
    pub duration_secs: f32,
    pub total_participants: u32,
    pub agent_stats: Vec<AgentMatchStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMatchStats {
    pub username: String,
    pub weapon: Weapon,
    pub kills: u32,
    pub placement: u32,
    pub survived_secs: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_use_snake_case_tags() {
        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"eliminate","username":"sara"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::Eliminate { username } if username == "sara"));

        let msg: ClientMsg = serde_json::from_str(r#"{"type":"start_battle"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::StartBattle));
    }

    #[test]
    fn kill_event_serializes_with_cause() {
        let event = GameEvent::Kill {
            killer: None,
            victim: "omar".into(),
            cause: KillCause::Storm,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "kill");
        assert_eq!(json["cause"], "storm");
        assert!(json["killer"].is_null());
    }
}
