//! Matchmaking queues and the room table, driven by a single actor task.
//!
//! Connections are registered with [`LobbyHandle::connect`] and given an outbound event
//! channel. `findGame` queues them per player count; a full queue opens a room with a fresh
//! [`SessionHandle`]. The lobby routes in-game events to the seat's session. A room closes
//! when its match ends, which frees its players to queue again, or once nobody is left in it.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::time::Duration;

use rand::distributions::Alphanumeric;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::board::DEFAULT_BOARD_SIZE;
use crate::config::GameConfig;
use crate::error::{Error, Result};
use crate::player::seats_for;
use crate::protocol::{ClientEvent, ConnectionId, ServerEvent};
use crate::session::{EventSender, MatchEndHook, Session, SessionCommand, SessionHandle};

const ROOM_CODE_LEN: usize = 6;

/// Server-wide settings applied to every room the lobby opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyConfig {
    /// Clock resolution in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    #[serde(default = "default_board_size")]
    pub board_size: u8,
    #[serde(default)]
    pub time_per_player: Option<u64>,
    #[serde(default)]
    pub walls_per_player: Option<u8>,
}

fn default_tick_ms() -> u64 {
    1_000
}
fn default_board_size() -> u8 {
    DEFAULT_BOARD_SIZE
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            board_size: default_board_size(),
            time_per_player: None,
            walls_per_player: None,
        }
    }
}

impl LobbyConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    /// Game configuration for a room of `num_players`.
    pub fn game_config(&self, num_players: u8) -> Result<GameConfig> {
        if seats_for(num_players).is_none() {
            return Err(Error::InvalidConfiguration(format!(
                "unsupported player count {num_players}"
            )));
        }
        let mut config = GameConfig {
            board_size: self.board_size,
            num_players,
            walls_per_player: self.walls_per_player,
            ..GameConfig::default()
        };
        if let Some(time) = self.time_per_player {
            config.time_per_player = time;
        }
        config.normalised()
    }
}

/// Queue lengths and open rooms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyStats {
    pub connections: usize,
    pub rooms: usize,
    pub waiting: BTreeMap<u8, usize>,
}

struct Room {
    session: SessionHandle,
    members: HashSet<ConnectionId>,
}

pub struct Lobby {
    config: LobbyConfig,
    connections: HashMap<ConnectionId, EventSender>,
    queues: BTreeMap<u8, VecDeque<ConnectionId>>,
    rooms: HashMap<String, Room>,
    seated: HashMap<ConnectionId, String>,
    next_connection: u64,
    rng: SmallRng,
    /// Lobby inbox, for sessions to report the end of their match.
    inbox: Option<mpsc::WeakUnboundedSender<LobbyCommand>>,
}

impl Lobby {
    pub fn new(config: LobbyConfig) -> Self {
        Self::with_rng(config, SmallRng::from_entropy())
    }

    pub fn with_rng(config: LobbyConfig, rng: SmallRng) -> Self {
        let queues = [2, 4].into_iter().map(|n| (n, VecDeque::new())).collect();
        Self {
            config,
            connections: HashMap::new(),
            queues,
            rooms: HashMap::new(),
            seated: HashMap::new(),
            next_connection: 1,
            rng,
            inbox: None,
        }
    }

    pub fn connect(&mut self, sender: EventSender) -> ConnectionId {
        let id = ConnectionId(self.next_connection);
        self.next_connection += 1;
        self.connections.insert(id, sender);
        tracing::debug!(connection = %id, "connected");
        id
    }

    pub fn stats(&self) -> LobbyStats {
        LobbyStats {
            connections: self.connections.len(),
            rooms: self.rooms.len(),
            waiting: self.queues.iter().map(|(n, q)| (*n, q.len())).collect(),
        }
    }

    pub fn room_of(&self, connection: ConnectionId) -> Option<&str> {
        self.seated.get(&connection).map(String::as_str)
    }

    /// Handle one client event; failures are reported to that connection only.
    pub fn handle(&mut self, connection: ConnectionId, event: ClientEvent) {
        if let Err(err) = self.dispatch(connection, event) {
            tracing::debug!(%connection, %err, "client event refused");
            self.notify(connection, ServerEvent::error(&err));
        }
    }

    fn dispatch(&mut self, connection: ConnectionId, event: ClientEvent) -> Result<()> {
        match event {
            ClientEvent::FindGame { num_players } => {
                self.find_game(connection, num_players)?;
                Ok(())
            }
            ClientEvent::RequestMove { mv } => {
                self.route(connection, SessionCommand::Move { connection, mv })
            }
            ClientEvent::Resign {} => self.route(connection, SessionCommand::Resign { connection }),
            ClientEvent::RequestDraw {} => {
                self.route(connection, SessionCommand::OfferDraw { connection })
            }
            ClientEvent::RespondToDraw { accepted } => self.route(
                connection,
                SessionCommand::RespondToDraw {
                    connection,
                    accepted,
                },
            ),
        }
    }

    /// Queue `connection`; returns the room code when this join filled the queue.
    pub fn find_game(
        &mut self,
        connection: ConnectionId,
        num_players: u8,
    ) -> Result<Option<String>> {
        if !self.connections.contains_key(&connection) {
            return Err(Error::UnknownParticipant);
        }
        if self.seated.contains_key(&connection)
            || self.queues.values().any(|q| q.contains(&connection))
        {
            return Err(Error::AlreadyJoined);
        }
        let config = self.config.game_config(num_players)?;
        let needed = usize::from(num_players);
        let queue = self
            .queues
            .get_mut(&num_players)
            .ok_or_else(|| Error::invalid_config("no queue for player count"))?;
        queue.push_back(connection);

        if queue.len() < needed {
            let message = format!("Waiting for {} more player(s)...", needed - queue.len());
            self.notify(connection, ServerEvent::Waiting { message });
            return Ok(None);
        }
        let members: Vec<_> = queue.drain(..needed).collect();
        self.open_room(members, config).map(Some)
    }

    fn open_room(&mut self, members: Vec<ConnectionId>, config: GameConfig) -> Result<String> {
        let room = self.room_code();
        let session = Session::new(room.clone(), config, &members)?;
        let senders = members
            .iter()
            .filter_map(|id| self.connections.get(id).map(|tx| (*id, tx.clone())))
            .collect();
        let on_end = self.inbox.clone().map(|inbox| -> MatchEndHook {
            Box::new(move |room| {
                if let Some(inbox) = inbox.upgrade() {
                    let _ = inbox.send(LobbyCommand::RoomEnded { room });
                }
            })
        });
        let handle = SessionHandle::spawn(session, senders, self.config.tick(), on_end);
        for id in &members {
            self.seated.insert(*id, room.clone());
        }
        tracing::info!(%room, players = members.len(), "room opened");
        self.rooms.insert(
            room.clone(),
            Room {
                session: handle,
                members: members.into_iter().collect(),
            },
        );
        Ok(room)
    }

    fn room_code(&mut self) -> String {
        loop {
            let code: String = (0..ROOM_CODE_LEN)
                .map(|_| char::from(self.rng.sample(Alphanumeric)))
                .collect();
            let room = format!("room-{code}");
            if !self.rooms.contains_key(&room) {
                return room;
            }
        }
    }

    fn route(&self, connection: ConnectionId, command: SessionCommand) -> Result<()> {
        let room = self.seated.get(&connection).ok_or(Error::NotInGame)?;
        let entry = self.rooms.get(room).ok_or(Error::NotInGame)?;
        entry.session.send(command)
    }

    /// Force-end the match in `room`.
    pub fn terminate_room(&self, room: &str) -> Result<()> {
        let entry = self.rooms.get(room).ok_or(Error::NotInGame)?;
        entry.session.send(SessionCommand::Terminate)
    }

    /// Retire a room whose match has ended and free its participants to queue again.
    pub fn room_ended(&mut self, room: &str) {
        let Some(entry) = self.rooms.remove(room) else {
            return;
        };
        for member in &entry.members {
            if self.seated.get(member).is_some_and(|seat| seat == room) {
                self.seated.remove(member);
            }
        }
        drop(entry.session.shutdown());
        tracing::info!(%room, "match over, room closed");
    }

    /// Forget `connection`: leave any queue, forfeit any seat, close an emptied room.
    pub fn disconnect(&mut self, connection: ConnectionId) {
        self.connections.remove(&connection);
        for queue in self.queues.values_mut() {
            queue.retain(|id| *id != connection);
        }
        let Some(room) = self.seated.remove(&connection) else {
            tracing::debug!(%connection, "disconnected");
            return;
        };
        let Some(entry) = self.rooms.get_mut(&room) else {
            return;
        };
        if let Err(err) = entry.session.send(SessionCommand::Disconnect { connection }) {
            tracing::debug!(%room, %err, "session already stopped");
        }
        entry.members.remove(&connection);
        if entry.members.is_empty() {
            if let Some(entry) = self.rooms.remove(&room) {
                drop(entry.session.shutdown());
            }
            tracing::info!(%room, "room empty, torn down");
        }
    }

    fn notify(&self, connection: ConnectionId, event: ServerEvent) {
        if let Some(sender) = self.connections.get(&connection) {
            if sender.send(event).is_err() {
                tracing::debug!(%connection, "connection channel closed");
            }
        }
    }
}

pub enum LobbyCommand {
    Connect {
        sender: EventSender,
        reply: oneshot::Sender<ConnectionId>,
    },
    Event {
        connection: ConnectionId,
        event: ClientEvent,
    },
    Disconnect {
        connection: ConnectionId,
    },
    Terminate {
        room: String,
    },
    RoomEnded {
        room: String,
    },
    Stats {
        reply: oneshot::Sender<LobbyStats>,
    },
}

/// Cloneable front door of the lobby task.
#[derive(Clone)]
pub struct LobbyHandle {
    commands: mpsc::UnboundedSender<LobbyCommand>,
}

impl LobbyHandle {
    pub fn spawn(config: LobbyConfig) -> Self {
        Self::spawn_lobby(Lobby::new(config))
    }

    pub fn spawn_lobby(mut lobby: Lobby) -> Self {
        let (commands, mut inbox) = mpsc::unbounded_channel();
        lobby.inbox = Some(commands.downgrade());
        tokio::spawn(async move {
            while let Some(command) = inbox.recv().await {
                match command {
                    LobbyCommand::Connect { sender, reply } => {
                        let _ = reply.send(lobby.connect(sender));
                    }
                    LobbyCommand::Event { connection, event } => lobby.handle(connection, event),
                    LobbyCommand::Disconnect { connection } => lobby.disconnect(connection),
                    LobbyCommand::Terminate { room } => {
                        if let Err(err) = lobby.terminate_room(&room) {
                            tracing::warn!(%room, %err, "terminate failed");
                        }
                    }
                    LobbyCommand::RoomEnded { room } => lobby.room_ended(&room),
                    LobbyCommand::Stats { reply } => {
                        let _ = reply.send(lobby.stats());
                    }
                }
            }
            tracing::info!("lobby closed");
        });
        Self { commands }
    }

    /// Register a connection; `events` receives everything the server sends it.
    pub async fn connect(&self, events: EventSender) -> Result<ConnectionId> {
        let (reply, rx) = oneshot::channel();
        self.submit(LobbyCommand::Connect {
            sender: events,
            reply,
        })?;
        rx.await.map_err(|_| Error::LobbyClosed)
    }

    pub fn send(&self, connection: ConnectionId, event: ClientEvent) -> Result<()> {
        self.submit(LobbyCommand::Event { connection, event })
    }

    /// Decode a raw JSON frame and forward it.
    pub fn send_json(&self, connection: ConnectionId, text: &str) -> Result<()> {
        self.send(connection, ClientEvent::from_json(text)?)
    }

    pub fn disconnect(&self, connection: ConnectionId) -> Result<()> {
        self.submit(LobbyCommand::Disconnect { connection })
    }

    pub fn terminate(&self, room: impl Into<String>) -> Result<()> {
        self.submit(LobbyCommand::Terminate { room: room.into() })
    }

    pub async fn stats(&self) -> Result<LobbyStats> {
        let (reply, rx) = oneshot::channel();
        self.submit(LobbyCommand::Stats { reply })?;
        rx.await.map_err(|_| Error::LobbyClosed)
    }

    fn submit(&self, command: LobbyCommand) -> Result<()> {
        self.commands.send(command).map_err(|_| Error::LobbyClosed)
    }
}
