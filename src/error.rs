//! Error types shared by the engine, the local match and the server.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Why the state machine refused a move. State is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoveRejection {
    #[error("match is over")]
    MatchOver,

    #[error("destination is not a legal pawn move")]
    IllegalPawnMove,

    #[error("wall placement is not legal")]
    IllegalWall,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("illegal move: {0}")]
    IllegalMove(#[from] MoveRejection),

    #[error("not your turn")]
    NotYourTurn,

    #[error("match has ended")]
    MatchEnded,

    #[error("participant is not seated in this match")]
    UnknownParticipant,

    #[error("no draw offer is pending")]
    NoDrawOffer,

    #[error("cannot answer your own draw offer")]
    CannotAnswerOwnOffer,

    #[error("already queued or seated in a game")]
    AlreadyJoined,

    #[error("not in a game")]
    NotInGame,

    #[error("move ticket is stale")]
    StaleTicket,

    #[error("lobby is closed")]
    LobbyClosed,

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Error::InvalidConfiguration(message.into())
    }
}
