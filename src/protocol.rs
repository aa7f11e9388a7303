//! Wire shapes shared by the server and the browser client.
//!
//! Every event is a JSON object `{ "event": <name>, "data": { ... } }`. Moves use
//! `{ "type": "cell" | "wall" | "resign", "data": ... }` (see [`Move`]).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::board::{Cell, Wall};
use crate::config::GameConfig;
use crate::error::Result;
use crate::player::PlayerId;
use crate::rules::PawnMoves;
use crate::state::{EndReason, MatchState, Move, Status};

/// Server-assigned identity of one client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// The one canonical state shape sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateBroadcast {
    pub status: Status,
    pub winner: Option<PlayerId>,
    pub reason: Option<EndReason>,
    pub player_turn: Option<PlayerId>,
    pub pawn_positions: BTreeMap<PlayerId, Cell>,
    pub walls_left: BTreeMap<PlayerId, u8>,
    pub timers: BTreeMap<PlayerId, i64>,
    pub placed_walls: Vec<Wall>,
    pub available_pawn_moves: PawnMoves,
    pub active_player_ids: Vec<PlayerId>,
    pub draw_offer_from: Option<PlayerId>,
}

impl StateBroadcast {
    pub fn from_state(state: &MatchState, draw_offer_from: Option<PlayerId>) -> Self {
        Self {
            status: state.status,
            winner: state.winner,
            reason: state.reason,
            player_turn: state.player_turn(),
            pawn_positions: state.pawn_positions.clone(),
            walls_left: state.walls_left.clone(),
            timers: state.timers.clone(),
            placed_walls: state.placed_walls.clone(),
            available_pawn_moves: state.legal_pawn_moves.clone(),
            active_player_ids: state.active_players.clone(),
            draw_offer_from,
        }
    }

    /// Rebuild an engine state from a broadcast so the client can predict legality locally.
    pub fn to_state(&self, board_size: u8) -> MatchState {
        let turn_index = self
            .player_turn
            .and_then(|id| self.active_player_ids.iter().position(|&p| p == id))
            .unwrap_or(0);
        MatchState {
            board_size,
            status: self.status,
            winner: self.winner,
            reason: self.reason,
            pawn_positions: self.pawn_positions.clone(),
            walls_left: self.walls_left.clone(),
            placed_walls: self.placed_walls.clone(),
            active_players: self.active_player_ids.clone(),
            turn_index,
            timers: self.timers.clone(),
            legal_pawn_moves: self.available_pawn_moves.clone(),
        }
    }
}

/// Events sent by a client connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    FindGame { num_players: u8 },
    RequestMove {
        #[serde(rename = "move")]
        mv: Move,
    },
    Resign {},
    RequestDraw {},
    RespondToDraw { accepted: bool },
}

impl ClientEvent {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Events sent by the server to one or all participants of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    Waiting {
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    GameStart {
        room: String,
        player_map: BTreeMap<ConnectionId, PlayerId>,
        initial_state: StateBroadcast,
        config: GameConfig,
    },
    #[serde(rename = "game-state-updated")]
    GameStateUpdated { state: StateBroadcast },
    #[serde(rename = "timers-updated")]
    TimersUpdated { timers: BTreeMap<PlayerId, i64> },
    DrawOfferReceived { from: PlayerId },
    DrawOfferPending {},
    DrawOfferRescinded {},
    Error { message: String },
}

impl ServerEvent {
    pub fn error(message: impl fmt::Display) -> Self {
        ServerEvent::Error {
            message: message.to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
