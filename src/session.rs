//! Authoritative orchestration of a single match.
//!
//! [`Session`] is the sole mutator of its match: it binds connections to seats, enforces turn
//! ownership, runs the countdown clock and the draw-offer side protocol, and turns disconnection
//! into forfeiture. It is synchronous and returns the events to deliver as [`Outbound`] values.
//! With the `server` feature, [`SessionHandle`] runs one session per tokio task so every
//! command, tick and disconnect for that match is applied in a single serial stream.

use std::collections::{BTreeMap, BTreeSet};

use crate::clock::Clock;
use crate::config::GameConfig;
use crate::error::{Error, Result};
use crate::history::HistoryLog;
use crate::player::PlayerId;
use crate::protocol::{ConnectionId, ServerEvent, StateBroadcast};
use crate::state::{EndReason, LossReason, MatchState, Move};

/// Who receives an outbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    All,
    Only(ConnectionId),
    AllExcept(ConnectionId),
}

impl Audience {
    pub fn includes(&self, connection: ConnectionId) -> bool {
        match *self {
            Audience::All => true,
            Audience::Only(target) => target == connection,
            Audience::AllExcept(skipped) => skipped != connection,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub to: Audience,
    pub event: ServerEvent,
}

impl Outbound {
    fn all(event: ServerEvent) -> Self {
        Self {
            to: Audience::All,
            event,
        }
    }
}

pub struct Session {
    room: String,
    config: GameConfig,
    history: HistoryLog,
    clock: Clock,
    seats: BTreeMap<ConnectionId, PlayerId>,
    connected: BTreeSet<ConnectionId>,
    draw_offer_from: Option<PlayerId>,
}

impl Session {
    /// Bind `participants` to the configured seats in order.
    pub fn new(
        room: impl Into<String>,
        config: GameConfig,
        participants: &[ConnectionId],
    ) -> Result<Self> {
        let config = config.normalised()?;
        if participants.len() != config.players.len() {
            return Err(Error::InvalidConfiguration(format!(
                "{} participants for {} seats",
                participants.len(),
                config.players.len()
            )));
        }
        let seats: BTreeMap<_, _> = participants
            .iter()
            .copied()
            .zip(config.players.iter().map(|p| p.id))
            .collect();
        if seats.len() != participants.len() {
            return Err(Error::invalid_config("duplicate participant"));
        }
        let initial = MatchState::initial(&config);
        Ok(Self {
            room: room.into(),
            clock: Clock::from_state(&initial),
            history: HistoryLog::new(initial),
            connected: participants.iter().copied().collect(),
            seats,
            config,
            draw_offer_from: None,
        })
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn is_active(&self) -> bool {
        self.history.live().is_active()
    }

    pub fn seat_of(&self, connection: ConnectionId) -> Option<PlayerId> {
        self.seats.get(&connection).copied()
    }

    pub fn player_map(&self) -> &BTreeMap<ConnectionId, PlayerId> {
        &self.seats
    }

    pub fn draw_offer_from(&self) -> Option<PlayerId> {
        self.draw_offer_from
    }

    /// No participant is connected any more.
    pub fn is_vacant(&self) -> bool {
        self.connected.is_empty()
    }

    /// The live snapshot with the current clock.
    pub fn state(&self) -> MatchState {
        self.clock.stamp(self.history.live().clone())
    }

    pub fn broadcast(&self) -> StateBroadcast {
        StateBroadcast::from_state(&self.state(), self.draw_offer_from)
    }

    pub fn start_events(&self) -> Vec<Outbound> {
        vec![Outbound::all(ServerEvent::GameStart {
            room: self.room.clone(),
            player_map: self.seats.clone(),
            initial_state: self.broadcast(),
            config: self.config.clone(),
        })]
    }

    /// Apply a move from `connection`, which must hold the turn.
    pub fn submit_move(&mut self, connection: ConnectionId, mv: Move) -> Result<Vec<Outbound>> {
        let player = self.active_seat(connection)?;
        let live = self.history.live();
        if live.player_turn() != Some(player) {
            return Err(Error::NotYourTurn);
        }
        let next = live.apply_move(&mv, &self.config.players).map_err(|rejection| {
            tracing::warn!(room = %self.room, %player, ?mv, %rejection, "move rejected");
            Error::from(rejection)
        })?;
        tracing::debug!(room = %self.room, %player, ?mv, "move accepted");

        let mut out = self.rescind_offer();
        out.extend(self.commit(next));
        Ok(out)
    }

    /// Resign at any point of an active match, on turn or not.
    pub fn resign(&mut self, connection: ConnectionId) -> Result<Vec<Outbound>> {
        let player = self.active_seat(connection)?;
        Ok(self.forfeit(player, LossReason::Resignation))
    }

    pub fn offer_draw(&mut self, connection: ConnectionId) -> Result<Vec<Outbound>> {
        let player = self.active_seat(connection)?;
        match self.draw_offer_from {
            // Offering while someone else's offer is open accepts it.
            Some(offerer) if offerer != player => return self.respond_to_draw(connection, true),
            _ => {}
        }
        self.draw_offer_from = Some(player);
        tracing::debug!(room = %self.room, %player, "draw offered");
        Ok(vec![
            Outbound {
                to: Audience::Only(connection),
                event: ServerEvent::DrawOfferPending {},
            },
            Outbound {
                to: Audience::AllExcept(connection),
                event: ServerEvent::DrawOfferReceived { from: player },
            },
            Outbound::all(ServerEvent::GameStateUpdated {
                state: self.broadcast(),
            }),
        ])
    }

    pub fn respond_to_draw(
        &mut self,
        connection: ConnectionId,
        accepted: bool,
    ) -> Result<Vec<Outbound>> {
        let player = self.active_seat(connection)?;
        let offerer = self.draw_offer_from.ok_or(Error::NoDrawOffer)?;
        if offerer == player {
            return Err(Error::CannotAnswerOwnOffer);
        }
        self.draw_offer_from = None;
        if accepted {
            let drawn = self.history.live().end_in_draw(EndReason::DrawByAgreement);
            return Ok(self.commit(drawn));
        }
        Ok(vec![
            Outbound::all(ServerEvent::DrawOfferRescinded {}),
            Outbound::all(ServerEvent::GameStateUpdated {
                state: self.broadcast(),
            }),
        ])
    }

    /// Charge `elapsed_ms` to the player to move; a flag fall forfeits with `Timeout`.
    pub fn tick(&mut self, elapsed_ms: i64) -> Vec<Outbound> {
        let Some(mover) = self.history.live().player_turn() else {
            return Vec::new();
        };
        let expired = self.clock.charge(mover, elapsed_ms);
        let mut out = vec![Outbound::all(ServerEvent::TimersUpdated {
            timers: self.clock.timers().clone(),
        })];
        if expired {
            out.extend(self.forfeit(mover, LossReason::Timeout));
        }
        out
    }

    /// Drop `connection`; a seated player still in the rotation forfeits.
    pub fn disconnect(&mut self, connection: ConnectionId) -> Vec<Outbound> {
        if !self.connected.remove(&connection) {
            return Vec::new();
        }
        let Some(player) = self.seat_of(connection) else {
            return Vec::new();
        };
        let live = self.history.live();
        if live.is_active() && live.active_players.contains(&player) {
            return self.forfeit(player, LossReason::Disconnection);
        }
        Vec::new()
    }

    /// Operator-forced end.
    pub fn terminate(&mut self) -> Vec<Outbound> {
        if !self.is_active() {
            return Vec::new();
        }
        self.draw_offer_from = None;
        let ended = self.history.live().terminate();
        self.commit(ended)
    }

    fn active_seat(&self, connection: ConnectionId) -> Result<PlayerId> {
        let player = self.seat_of(connection).ok_or(Error::UnknownParticipant)?;
        let live = self.history.live();
        if !live.is_active() {
            return Err(Error::MatchEnded);
        }
        if !live.active_players.contains(&player) {
            return Err(Error::NotInGame);
        }
        Ok(player)
    }

    fn forfeit(&mut self, player: PlayerId, reason: LossReason) -> Vec<Outbound> {
        tracing::warn!(room = %self.room, %player, ?reason, "player eliminated");
        let next = self
            .history
            .live()
            .apply_player_loss(&self.config.players, player, reason);
        let mut out = self.rescind_offer();
        out.extend(self.commit(next));
        out
    }

    fn rescind_offer(&mut self) -> Vec<Outbound> {
        match self.draw_offer_from.take() {
            Some(_) => vec![Outbound::all(ServerEvent::DrawOfferRescinded {})],
            None => Vec::new(),
        }
    }

    fn commit(&mut self, next: MatchState) -> Vec<Outbound> {
        let stamped = self.clock.stamp(next);
        let (ended, winner, reason) = {
            let stored = self.history.commit(stamped);
            (!stored.is_active(), stored.winner, stored.reason)
        };
        if ended {
            self.draw_offer_from = None;
            tracing::info!(
                room = %self.room,
                ?winner,
                ?reason,
                plies = self.history.live_index(),
                "match ended"
            );
        }
        vec![Outbound::all(ServerEvent::GameStateUpdated {
            state: StateBroadcast::from_state(self.history.live(), self.draw_offer_from),
        })]
    }
}

#[cfg(feature = "server")]
pub use task::{EventSender, MatchEndHook, SessionCommand, SessionHandle};

#[cfg(feature = "server")]
mod task {
    use std::collections::HashMap;
    use std::time::Duration;

    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;
    use tokio::time::{self, Instant, MissedTickBehavior};

    use super::{Outbound, Session};
    use crate::error::{Error, Result};
    use crate::protocol::{ConnectionId, ServerEvent};
    use crate::state::Move;

    /// Outbound channel of one client connection.
    pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

    /// Called once with the room code when the match reaches `Ended`.
    pub type MatchEndHook = Box<dyn FnOnce(String) + Send + 'static>;

    #[derive(Debug)]
    pub enum SessionCommand {
        Move { connection: ConnectionId, mv: Move },
        Resign { connection: ConnectionId },
        OfferDraw { connection: ConnectionId },
        RespondToDraw { connection: ConnectionId, accepted: bool },
        Disconnect { connection: ConnectionId },
        Terminate,
        Shutdown,
    }

    /// Inbox of a running session task.
    pub struct SessionHandle {
        room: String,
        commands: mpsc::UnboundedSender<SessionCommand>,
        task: JoinHandle<()>,
    }

    impl SessionHandle {
        /// Spawn the session task. It announces `gameStart` to every participant, then serves
        /// commands and clock ticks until shut down. `on_end` fires once the match has ended.
        pub fn spawn(
            session: Session,
            senders: HashMap<ConnectionId, EventSender>,
            tick: Duration,
            on_end: Option<MatchEndHook>,
        ) -> Self {
            let room = session.room().to_string();
            let (commands, inbox) = mpsc::unbounded_channel();
            let task = tokio::spawn(run(session, senders, inbox, tick, on_end));
            Self {
                room,
                commands,
                task,
            }
        }

        pub fn room(&self) -> &str {
            &self.room
        }

        pub fn send(&self, command: SessionCommand) -> Result<()> {
            self.commands
                .send(command)
                .map_err(|_| Error::NotInGame)
        }

        pub fn is_finished(&self) -> bool {
            self.task.is_finished()
        }

        /// Stop the task; the returned handle resolves once it has exited.
        pub fn shutdown(self) -> JoinHandle<()> {
            if self.commands.send(SessionCommand::Shutdown).is_err() {
                tracing::debug!(room = %self.room, "session task already gone");
            }
            self.task
        }
    }

    async fn run(
        mut session: Session,
        mut senders: HashMap<ConnectionId, EventSender>,
        mut inbox: mpsc::UnboundedReceiver<SessionCommand>,
        period: Duration,
        mut on_end: Option<MatchEndHook>,
    ) {
        dispatch(&senders, session.start_events());

        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let period_ms = period.as_millis() as i64;

        loop {
            tokio::select! {
                command = inbox.recv() => {
                    let Some(command) = command else { break };
                    let (origin, result) = match command {
                        SessionCommand::Move { connection, mv } => {
                            (Some(connection), session.submit_move(connection, mv))
                        }
                        SessionCommand::Resign { connection } => {
                            (Some(connection), session.resign(connection))
                        }
                        SessionCommand::OfferDraw { connection } => {
                            (Some(connection), session.offer_draw(connection))
                        }
                        SessionCommand::RespondToDraw { connection, accepted } => {
                            (Some(connection), session.respond_to_draw(connection, accepted))
                        }
                        SessionCommand::Disconnect { connection } => {
                            senders.remove(&connection);
                            (None, Ok(session.disconnect(connection)))
                        }
                        SessionCommand::Terminate => (None, Ok(session.terminate())),
                        SessionCommand::Shutdown => break,
                    };
                    match result {
                        Ok(out) => dispatch(&senders, out),
                        Err(err) => {
                            if let Some(sender) = origin.and_then(|c| senders.get(&c)) {
                                let _ = sender.send(ServerEvent::error(&err));
                            }
                        }
                    }
                }
                _ = ticker.tick(), if session.is_active() => {
                    dispatch(&senders, session.tick(period_ms));
                }
            }
            if !session.is_active() {
                if let Some(hook) = on_end.take() {
                    hook(session.room().to_string());
                }
            }
        }
        tracing::info!(
            room = %session.room(),
            plies = session.history().live_index(),
            "session closed"
        );
    }

    fn dispatch(senders: &HashMap<ConnectionId, EventSender>, out: Vec<Outbound>) {
        for outbound in out {
            for (connection, sender) in senders {
                if !outbound.to.includes(*connection) {
                    continue;
                }
                if sender.send(outbound.event.clone()).is_err() {
                    tracing::debug!(%connection, "connection channel closed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Cell, Wall};
    use crate::state::Status;

    const A: ConnectionId = ConnectionId(1);
    const B: ConnectionId = ConnectionId(2);

    fn duel() -> Session {
        let config = GameConfig::standard(2).expect("valid");
        Session::new("room-test", config, &[A, B]).expect("session")
    }

    fn latest_state(out: &[Outbound]) -> Option<&StateBroadcast> {
        out.iter().rev().find_map(|o| match &o.event {
            ServerEvent::GameStateUpdated { state } => Some(state),
            _ => None,
        })
    }

    #[test]
    fn binds_participants_in_seat_order() {
        let session = duel();
        assert_eq!(session.seat_of(A), Some(PlayerId::P1));
        assert_eq!(session.seat_of(B), Some(PlayerId::P3));
        assert_eq!(session.history().len(), 1);

        let config = GameConfig::standard(2).expect("valid");
        assert!(matches!(
            Session::new("room-bad", config, &[A]),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn turn_ownership_is_enforced() {
        let mut session = duel();
        let before = session.state();
        let err = session
            .submit_move(B, Move::Pawn(Cell::new(1, 4)))
            .expect_err("p3 is not on turn");
        assert!(matches!(err, Error::NotYourTurn));
        assert_eq!(session.state(), before);
        assert_eq!(session.history().len(), 1);

        let out = session
            .submit_move(A, Move::Pawn(Cell::new(7, 4)))
            .expect("p1 on turn");
        let state = latest_state(&out).expect("broadcast");
        assert_eq!(state.player_turn, Some(PlayerId::P3));
        assert!(matches!(
            session.submit_move(ConnectionId(9), Move::Resign),
            Err(Error::UnknownParticipant)
        ));
    }

    #[test]
    fn illegal_moves_leave_state_alone() {
        let mut session = duel();
        let err = session
            .submit_move(A, Move::Wall(Wall::horizontal(9, 9)))
            .expect_err("off the slot grid");
        assert!(matches!(err, Error::IllegalMove(_)));
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn draw_by_agreement() {
        let mut session = duel();
        let out = session.offer_draw(A).expect("offer");
        assert!(out.iter().any(|o| o.to == Audience::Only(A)
            && o.event == ServerEvent::DrawOfferPending {}));
        assert!(out.iter().any(|o| o.to == Audience::AllExcept(A)
            && o.event == ServerEvent::DrawOfferReceived { from: PlayerId::P1 }));
        assert!(matches!(
            session.respond_to_draw(A, true),
            Err(Error::CannotAnswerOwnOffer)
        ));

        let out = session.respond_to_draw(B, true).expect("accept");
        let state = latest_state(&out).expect("broadcast");
        assert_eq!(state.status, Status::Ended);
        assert_eq!(state.reason, Some(EndReason::DrawByAgreement));
        assert_eq!(state.winner, None);
        assert!(matches!(session.offer_draw(A), Err(Error::MatchEnded)));
    }

    #[test]
    fn rejected_or_rescinded_offers_keep_playing() {
        let mut session = duel();
        session.offer_draw(B).expect("offer");
        let out = session.respond_to_draw(A, false).expect("reject");
        assert!(out.iter().any(|o| o.event == ServerEvent::DrawOfferRescinded {}));
        assert!(session.is_active());
        assert!(matches!(session.respond_to_draw(A, true), Err(Error::NoDrawOffer)));

        session.offer_draw(B).expect("offer again");
        let out = session
            .submit_move(A, Move::Pawn(Cell::new(7, 4)))
            .expect("move");
        assert!(out.iter().any(|o| o.event == ServerEvent::DrawOfferRescinded {}));
        assert_eq!(session.draw_offer_from(), None);
        assert_eq!(latest_state(&out).and_then(|s| s.draw_offer_from), None);
    }

    #[test]
    fn clock_runs_out() {
        let mut config = GameConfig::standard(2).expect("valid");
        config.time_per_player = 2_000;
        let mut session = Session::new("room-clock", config, &[A, B]).expect("session");

        let out = session.tick(1_000);
        assert_eq!(out.len(), 1);
        assert_eq!(session.state().timers[&PlayerId::P1], 1_000);

        let out = session.tick(1_000);
        let state = latest_state(&out).expect("forfeit broadcast");
        assert_eq!(state.winner, Some(PlayerId::P3));
        assert_eq!(state.reason, Some(EndReason::LastPlayerStanding));
        assert!(session.tick(1_000).is_empty());
    }

    #[test]
    fn disconnection_forfeits_and_vacates() {
        let config = GameConfig::standard(4).expect("valid");
        let (c, d) = (ConnectionId(3), ConnectionId(4));
        let mut session = Session::new("room-four", config, &[A, B, c, d]).expect("session");

        let out = session.disconnect(B);
        let state = latest_state(&out).expect("broadcast");
        assert_eq!(
            state.active_player_ids,
            vec![PlayerId::P1, PlayerId::P3, PlayerId::P4]
        );
        assert_eq!(state.player_turn, Some(PlayerId::P1));
        assert!(session.disconnect(B).is_empty());
        assert!(matches!(session.resign(B), Err(Error::NotInGame)));

        session.resign(c).expect("resign off turn");
        let out = session.disconnect(A);
        let state = latest_state(&out).expect("broadcast");
        assert_eq!(state.winner, Some(PlayerId::P4));
        assert!(!session.is_vacant());
        assert!(session.disconnect(d).is_empty());
        // `c` resigned but is still connected.
        assert!(!session.is_vacant());
        assert!(session.disconnect(c).is_empty());
        assert!(session.is_vacant());
    }

    #[test]
    fn terminate_ends_without_winner() {
        let mut session = duel();
        let out = session.terminate();
        let state = latest_state(&out).expect("broadcast");
        assert_eq!(state.reason, Some(EndReason::Terminated));
        assert!(session.terminate().is_empty());
    }

    #[cfg(feature = "server")]
    #[tokio::test(start_paused = true)]
    async fn session_task_reports_the_end_once() {
        use std::collections::HashMap;
        use std::time::Duration;

        use tokio::sync::{mpsc, oneshot};

        let (tx, mut rx) = mpsc::unbounded_channel();
        let senders = HashMap::from([(A, tx)]);
        let (ended, ended_rx) = oneshot::channel();
        let hook: MatchEndHook = Box::new(move |room| {
            let _ = ended.send(room);
        });
        let handle = SessionHandle::spawn(duel(), senders, Duration::from_secs(1), Some(hook));

        handle.send(SessionCommand::Resign { connection: B }).expect("running");
        assert_eq!(ended_rx.await.expect("hook fired"), "room-test");
        handle.send(SessionCommand::Terminate).expect("running");
        handle.shutdown().await.expect("task exits");

        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            if let ServerEvent::GameStateUpdated { state } = event {
                last = Some(state);
            }
        }
        let last = last.expect("final broadcast");
        assert_eq!(last.winner, Some(PlayerId::P1));
        assert_eq!(last.reason, Some(EndReason::LastPlayerStanding));
    }
}
