//! Client-side match driver for hot-seat and versus-automation play.
//!
//! A [`LocalMatch`] owns the history and the clock the way a server session does, but is
//! advanced by the host: `tick` from the frame loop, `handle_move` from input, and
//! `apply_deferred` when an automated seat's answer arrives. Answers are matched against the
//! [`MoveTicket`] handed out when they were requested, so a reply that outlived its position
//! is dropped instead of being applied to a different one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::board::Wall;
use crate::clock::Clock;
use crate::config::GameConfig;
use crate::error::{Error, MoveRejection, Result};
use crate::history::{Direction, HistoryLog};
use crate::player::PlayerId;
use crate::protocol::StateBroadcast;
use crate::rules::is_wall_placement_legal;
use crate::state::{LossReason, MatchState, Move};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatKind {
    #[default]
    Human,
    #[serde(alias = "ai")]
    Automated,
}

/// Identifies the position an automated move was requested for.
///
/// `generation` counts commits, so a ply reached again through a different line of play never
/// matches an older ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveTicket {
    pub player: PlayerId,
    pub ply: usize,
    pub generation: u64,
}

#[derive(Debug, Clone)]
pub struct LocalMatch {
    config: GameConfig,
    seats: BTreeMap<PlayerId, SeatKind>,
    history: HistoryLog,
    clock: Clock,
    pending: Option<MoveTicket>,
    generation: u64,
}

impl LocalMatch {
    /// Seats missing from `seats` are human.
    pub fn new(config: GameConfig, seats: BTreeMap<PlayerId, SeatKind>) -> Result<Self> {
        let config = config.normalised()?;
        if let Some(stray) = seats
            .keys()
            .find(|id| !config.players.iter().any(|p| p.id == **id))
        {
            return Err(Error::InvalidConfiguration(format!(
                "seat {stray} is not part of this match"
            )));
        }
        let seats = config
            .players
            .iter()
            .map(|p| (p.id, seats.get(&p.id).copied().unwrap_or_default()))
            .collect();
        let initial = MatchState::initial(&config);
        Ok(Self {
            clock: Clock::from_state(&initial),
            history: HistoryLog::new(initial),
            config,
            seats,
            pending: None,
            generation: 0,
        })
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn seat_kind(&self, player: PlayerId) -> Option<SeatKind> {
        self.seats.get(&player).copied()
    }

    pub fn is_viewing_past(&self) -> bool {
        self.history.is_viewing_past()
    }

    pub fn timers(&self) -> &BTreeMap<PlayerId, i64> {
        self.clock.timers()
    }

    /// The live position with the running clock.
    pub fn state(&self) -> MatchState {
        self.clock.stamp(self.history.live().clone())
    }

    /// What is on screen: a past snapshot as recorded, or the live position.
    pub fn viewed(&self) -> MatchState {
        if self.is_viewing_past() {
            self.history.viewed().clone()
        } else {
            self.state()
        }
    }

    pub fn broadcast(&self) -> StateBroadcast {
        StateBroadcast::from_state(&self.viewed(), None)
    }

    /// Advance the mover's clock. Suspended while a past snapshot is viewed or once the match
    /// has ended. Returns `true` when the tick ended the mover's game.
    pub fn tick(&mut self, elapsed_ms: i64) -> bool {
        if self.is_viewing_past() {
            return false;
        }
        let Some(mover) = self.history.live().player_turn() else {
            return false;
        };
        if self.clock.charge(mover, elapsed_ms) {
            self.forfeit(mover, LossReason::Timeout);
            return true;
        }
        false
    }

    /// Apply a move from the human seat holding the turn in the viewed snapshot.
    ///
    /// Moving while a past snapshot is viewed discards every later snapshot and continues
    /// from the viewed one, with the clocks it recorded.
    pub fn handle_move(&mut self, mv: &Move) -> Result<&MatchState> {
        let viewed = self.history.viewed();
        let mover = viewed.player_turn().ok_or(Error::MatchEnded)?;
        if self.seat_kind(mover) != Some(SeatKind::Human) {
            return Err(Error::NotYourTurn);
        }
        let next = viewed.apply_move(mv, &self.config.players)?;
        if self.is_viewing_past() {
            tracing::debug!(from = self.history.viewing_index(), "branching history");
            self.clock = Clock::from_state(self.history.viewed());
        }
        Ok(self.commit(next))
    }

    /// Hand out a ticket when an automated seat is due to move and none is outstanding.
    pub fn request_ticket(&mut self) -> Option<MoveTicket> {
        if self.pending.is_some() || self.is_viewing_past() {
            return None;
        }
        let player = self.history.live().player_turn()?;
        if self.seat_kind(player) != Some(SeatKind::Automated) {
            return None;
        }
        let ticket = MoveTicket {
            player,
            ply: self.history.live_index(),
            generation: self.generation,
        };
        self.pending = Some(ticket);
        Some(ticket)
    }

    pub fn pending_ticket(&self) -> Option<MoveTicket> {
        self.pending
    }

    /// Apply an automated seat's answer.
    ///
    /// Fails with `StaleTicket`, changing nothing, unless nothing was committed since the ticket
    /// was issued and the live position is on screen with the ticket's player to move. A missing
    /// or illegal answer forfeits the seat with `IllegalMove`; the error is still returned.
    pub fn apply_deferred(
        &mut self,
        ticket: MoveTicket,
        mv: Option<Move>,
    ) -> Result<&MatchState> {
        if self.pending == Some(ticket) {
            self.pending = None;
        }
        let live = self.history.live();
        if self.is_viewing_past()
            || self.generation != ticket.generation
            || self.history.live_index() != ticket.ply
            || live.player_turn() != Some(ticket.player)
        {
            tracing::debug!(?ticket, "discarding stale automated move");
            return Err(Error::StaleTicket);
        }

        let Some(mv) = mv else {
            tracing::warn!(player = %ticket.player, "automated seat returned no move");
            self.forfeit(ticket.player, LossReason::IllegalMove);
            return Err(MoveRejection::IllegalPawnMove.into());
        };
        match live.apply_move(&mv, &self.config.players) {
            Ok(next) => Ok(self.commit(next)),
            Err(rejection) => {
                tracing::warn!(
                    player = %ticket.player,
                    ?mv,
                    %rejection,
                    "automated seat moved illegally"
                );
                self.forfeit(ticket.player, LossReason::IllegalMove);
                Err(rejection.into())
            }
        }
    }

    /// Resign the human seat holding the turn in the live match.
    pub fn resign(&mut self) -> Result<&MatchState> {
        let mover = self.history.live().player_turn().ok_or(Error::MatchEnded)?;
        if self.seat_kind(mover) != Some(SeatKind::Human) {
            return Err(Error::NotYourTurn);
        }
        self.forfeit(mover, LossReason::Resignation);
        Ok(self.history.live())
    }

    pub fn terminate(&mut self) -> bool {
        if !self.history.live().is_active() {
            return false;
        }
        self.history.navigate(Direction::End);
        let ended = self.history.live().terminate();
        self.commit(ended);
        true
    }

    pub fn navigate(&mut self, direction: Direction) -> bool {
        self.history.navigate(direction)
    }

    pub fn onion_skin(&self, ahead: usize) -> &[MatchState] {
        self.history.onion_skin(ahead)
    }

    /// Hover-time check against the snapshot on screen.
    pub fn is_wall_placement_legal(&self, wall: &Wall) -> bool {
        is_wall_placement_legal(wall, self.history.viewed(), &self.config.players)
    }

    fn forfeit(&mut self, player: PlayerId, reason: LossReason) {
        self.history.navigate(Direction::End);
        let next = self
            .history
            .live()
            .apply_player_loss(&self.config.players, player, reason);
        if next != *self.history.live() {
            self.commit(next);
        }
    }

    fn commit(&mut self, next: MatchState) -> &MatchState {
        self.pending = None;
        self.generation += 1;
        let stamped = self.clock.stamp(next);
        let stored = self.history.commit(stamped);
        if !stored.is_active() {
            tracing::info!(winner = ?stored.winner, reason = ?stored.reason, "local match ended");
        }
        stored
    }
}
