//! WebAssembly surface over [`LocalMatch`] and the legality engine.
//!
//! Values cross the boundary as plain JS objects in the wire shapes of [`crate::protocol`];
//! maps are emitted as objects, not `Map`s, so the browser sees exactly what the server sends.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::board::Wall;
use crate::config::GameConfig;
use crate::history::Direction;
use crate::local::{LocalMatch, MoveTicket, SeatKind};
use crate::player::PlayerId;
use crate::protocol::StateBroadcast;
use crate::rules::is_wall_placement_legal;
use crate::state::Move;

pub(crate) fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(JsValue::from)
}

pub(crate) fn from_js<T: DeserializeOwned>(value: JsValue) -> Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value).map_err(JsValue::from)
}

fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn is_absent(value: &JsValue) -> bool {
    value.is_undefined() || value.is_null()
}

/// A client-driven match: hot-seat humans and automated seats fed through move tickets.
#[wasm_bindgen]
pub struct QuoridorMatch {
    inner: LocalMatch,
}

#[wasm_bindgen]
impl QuoridorMatch {
    /// `config` is a partial `GameConfig` (or nothing for the standard duel); `seats` maps
    /// player ids to `"human"` or `"automated"`.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue, seats: JsValue) -> Result<QuoridorMatch, JsValue> {
        let config: GameConfig = if is_absent(&config) {
            GameConfig::default()
        } else {
            from_js(config)?
        };
        let seats: BTreeMap<PlayerId, SeatKind> = if is_absent(&seats) {
            BTreeMap::new()
        } else {
            from_js(seats)?
        };
        let inner = LocalMatch::new(config, seats).map_err(js_error)?;
        Ok(Self { inner })
    }

    #[wasm_bindgen(js_name = defaultConfig)]
    pub fn default_config(num_players: u8) -> Result<JsValue, JsValue> {
        let config = GameConfig::standard(num_players).map_err(js_error)?;
        to_js(&config)
    }

    #[wasm_bindgen(js_name = getConfig)]
    pub fn get_config(&self) -> Result<JsValue, JsValue> {
        to_js(self.inner.config())
    }

    /// The snapshot on screen as a state broadcast.
    #[wasm_bindgen(js_name = getState)]
    pub fn get_state(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.broadcast())
    }

    #[wasm_bindgen(js_name = getLiveState)]
    pub fn get_live_state(&self) -> Result<JsValue, JsValue> {
        to_js(&StateBroadcast::from_state(&self.inner.state(), None))
    }

    #[wasm_bindgen(js_name = getTimers)]
    pub fn get_timers(&self) -> Result<JsValue, JsValue> {
        to_js(self.inner.timers())
    }

    /// Apply a human move `{type, data}`; throws with the rejection reason.
    #[wasm_bindgen(js_name = applyMove)]
    pub fn apply_move(&mut self, mv: JsValue) -> Result<JsValue, JsValue> {
        let mv: Move = from_js(mv)?;
        let state = self.inner.handle_move(&mv).map_err(js_error)?;
        to_js(&StateBroadcast::from_state(state, None))
    }

    /// Charge `elapsed_ms` to the mover. Returns `true` if the tick ended their game.
    pub fn tick(&mut self, elapsed_ms: f64) -> bool {
        self.inner.tick(elapsed_ms.max(0.0) as i64)
    }

    /// `"start" | "prev" | "next" | "end"`.
    pub fn navigate(&mut self, direction: &str) -> Result<bool, JsValue> {
        let direction = Direction::parse(direction)
            .ok_or_else(|| js_error(format!("unknown direction {direction:?}")))?;
        Ok(self.inner.navigate(direction))
    }

    #[wasm_bindgen(js_name = isViewingPast)]
    pub fn is_viewing_past(&self) -> bool {
        self.inner.is_viewing_past()
    }

    #[wasm_bindgen(js_name = historyLength)]
    pub fn history_length(&self) -> usize {
        self.inner.history().len()
    }

    #[wasm_bindgen(js_name = viewingIndex)]
    pub fn viewing_index(&self) -> usize {
        self.inner.history().viewing_index()
    }

    /// The viewed snapshot followed by up to `ahead` later ones.
    #[wasm_bindgen(js_name = onionSkin)]
    pub fn onion_skin(&self, ahead: usize) -> Result<JsValue, JsValue> {
        let frames: Vec<StateBroadcast> = self
            .inner
            .onion_skin(ahead)
            .iter()
            .map(|state| StateBroadcast::from_state(state, None))
            .collect();
        to_js(&frames)
    }

    #[wasm_bindgen(js_name = isWallPlacementLegal)]
    pub fn is_wall_placement_legal(&self, wall: JsValue) -> Result<bool, JsValue> {
        let wall: Wall = from_js(wall)?;
        Ok(self.inner.is_wall_placement_legal(&wall))
    }

    /// A `{player, ply, generation}` ticket when an automated seat should be asked for a move,
    /// else `null`.
    #[wasm_bindgen(js_name = requestTicket)]
    pub fn request_ticket(&mut self) -> Result<JsValue, JsValue> {
        match self.inner.request_ticket() {
            Some(ticket) => to_js(&ticket),
            None => Ok(JsValue::NULL),
        }
    }

    /// Apply an automated answer; `mv` may be `null` when the chooser gave up.
    #[wasm_bindgen(js_name = applyDeferred)]
    pub fn apply_deferred(&mut self, ticket: JsValue, mv: JsValue) -> Result<JsValue, JsValue> {
        let ticket: MoveTicket = from_js(ticket)?;
        let mv: Option<Move> = if is_absent(&mv) { None } else { Some(from_js(mv)?) };
        let state = self.inner.apply_deferred(ticket, mv).map_err(js_error)?;
        to_js(&StateBroadcast::from_state(state, None))
    }

    pub fn resign(&mut self) -> Result<JsValue, JsValue> {
        let state = self.inner.resign().map_err(js_error)?;
        to_js(&StateBroadcast::from_state(state, None))
    }

    pub fn terminate(&mut self) -> bool {
        self.inner.terminate()
    }
}

/// Hover-time wall check against a state broadcast received from the server.
#[wasm_bindgen(js_name = isWallPlacementLegal)]
pub fn wall_legal_in_broadcast(
    state: JsValue,
    config: JsValue,
    wall: JsValue,
) -> Result<bool, JsValue> {
    let broadcast: StateBroadcast = from_js(state)?;
    let config: GameConfig = from_js(config)?;
    let config = config.normalised().map_err(js_error)?;
    let wall: Wall = from_js(wall)?;
    let state = broadcast.to_state(config.board_size);
    Ok(is_wall_placement_legal(&wall, &state, &config.players))
}
