//! Automated seats backed by a JavaScript move chooser.

use js_sys::{Function, Promise};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use crate::engine::{from_js, to_js};
use crate::local::MoveTicket;
use crate::protocol::StateBroadcast;
use crate::state::Move;

/// Bridge to a JavaScript move chooser for an automated seat.
///
/// The chooser is called as `chooser(state, ticket)` and may return a move or a Promise of one.
/// The answer is only decoded here; it is applied with `QuoridorMatch.applyDeferred` together
/// with the ticket it was asked for, which discards answers that arrive too late.
#[wasm_bindgen]
pub struct AutomatedSeat {
    chooser: Function,
}

#[wasm_bindgen]
impl AutomatedSeat {
    #[wasm_bindgen(constructor)]
    pub fn new(chooser: Function) -> AutomatedSeat {
        Self { chooser }
    }

    /// Resolves to a `{type, data}` move, or `null` when the chooser's answer is not one.
    #[wasm_bindgen(js_name = chooseMove)]
    pub async fn choose_move(&self, state: JsValue, ticket: JsValue) -> Result<JsValue, JsValue> {
        // Decode first so a malformed call fails before the chooser runs.
        let state: StateBroadcast = from_js(state)?;
        let ticket: MoveTicket = from_js(ticket)?;

        let state_js = to_js(&state)?;
        let ticket_js = to_js(&ticket)?;
        let answer = self.chooser.call2(&JsValue::NULL, &state_js, &ticket_js)?;
        let resolved = JsFuture::from(Promise::resolve(&answer)).await?;

        match decode_move(resolved) {
            Some(mv) => to_js(&mv),
            None => {
                tracing::warn!(
                    player = %ticket.player,
                    ply = ticket.ply,
                    "chooser answered with no move"
                );
                Ok(JsValue::NULL)
            }
        }
    }
}

fn decode_move(value: JsValue) -> Option<Move> {
    if value.is_undefined() || value.is_null() {
        return None;
    }
    serde_wasm_bindgen::from_value(value).ok()
}
