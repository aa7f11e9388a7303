#![deny(clippy::unwrap_used)]
//! Quoridor rules engine with an authoritative match server and WebAssembly bindings.
//!
//! The crate is layered leaves first:
//!
//! * [`board`], [`rules`] and [`state`] – wall geometry, BFS reachability, legal pawn moves,
//!   wall validation and the immutable [`MatchState`] transitions (`apply_move`,
//!   `apply_player_loss`, draws and termination). Every rejection is a value; nothing here
//!   panics on malformed input.
//! * [`repetition`] and [`history`] – canonical position hashing for the threefold rule and a
//!   branch-on-edit timeline with replay navigation and onion-skin previews.
//! * [`session`] and [`lobby`] – the server side. A session is the sole mutator of one match
//!   (turn ownership, countdown, disconnection forfeits, draw offers) and, with the `server`
//!   feature, runs as its own tokio task next to a lobby task owning the matchmaking queues.
//! * [`local`], [`engine`] and [`automation`] – the client side: a tick-driven local match with
//!   human and automated seats, exported to JavaScript as [`QuoridorMatch`] and
//!   [`AutomatedSeat`].
//!
//! Logging goes through `tracing`; no subscriber is installed by the library.

pub mod automation;
pub mod board;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod local;
#[cfg(feature = "server")]
pub mod lobby;
pub mod player;
pub mod protocol;
pub mod repetition;
pub mod rules;
pub mod session;
pub mod state;

pub use automation::AutomatedSeat;
pub use board::{Cell, Orientation, Wall, DEFAULT_BOARD_SIZE};
pub use config::GameConfig;
pub use engine::QuoridorMatch;
pub use error::{Error, MoveRejection, Result};
pub use history::{Direction, HistoryLog};
pub use local::{LocalMatch, MoveTicket, SeatKind};
#[cfg(feature = "server")]
pub use lobby::{Lobby, LobbyConfig, LobbyHandle, LobbyStats};
pub use player::{GoalEdge, Player, PlayerId};
pub use protocol::{ClientEvent, ConnectionId, ServerEvent, StateBroadcast};
pub use rules::{calculate_legal_pawn_moves, is_wall_placement_legal};
#[cfg(feature = "server")]
pub use session::SessionHandle;
pub use session::{Audience, Outbound, Session};
pub use state::{EndReason, LossReason, MatchState, Move, Status};

use wasm_bindgen::prelude::*;

/// Install a panic hook sending Rust panics to the browser console. The hook is only compiled in
/// when the `console_error_panic_hook` feature is enabled (default).
#[wasm_bindgen(js_name = initPanicHook)]
pub fn init_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Board side length used when a configuration does not name one.
#[wasm_bindgen(js_name = defaultBoardSize)]
pub fn default_board_size() -> u8 {
    DEFAULT_BOARD_SIZE
}
