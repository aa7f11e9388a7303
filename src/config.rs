//! Match configuration with defaults, normalisation and validation.

use serde::{Deserialize, Serialize};

use crate::board::DEFAULT_BOARD_SIZE;
use crate::error::{Error, Result};
use crate::player::{seats_for, Player, PlayerId};

const MIN_BOARD_SIZE: u8 = 3;
const MAX_BOARD_SIZE: u8 = 25;

/// Match configuration consumed at session creation.
///
/// Every field has a default so partial objects coming from JavaScript or JSON are accepted;
/// an empty `players` list is filled with the standard seats for `numPlayers` by
/// [`GameConfig::normalised`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    #[serde(default = "default_board_size")]
    pub board_size: u8,
    #[serde(default = "default_num_players")]
    pub num_players: u8,
    /// Walls handed to each seat. Falls back to the player-count default when omitted.
    #[serde(default)]
    pub walls_per_player: Option<u8>,
    /// Clock per seat in milliseconds.
    #[serde(default = "default_time_per_player", alias = "timePerPlayerMs")]
    pub time_per_player: u64,
    #[serde(default)]
    pub players: Vec<Player>,
}

fn default_board_size() -> u8 {
    DEFAULT_BOARD_SIZE
}
fn default_num_players() -> u8 {
    2
}
fn default_time_per_player() -> u64 {
    5 * 60 * 1000
}

/// Ten walls each head-to-head, five each in a four-way game.
pub fn default_walls_for(num_players: u8) -> u8 {
    if num_players >= 4 {
        5
    } else {
        10
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            board_size: default_board_size(),
            num_players: default_num_players(),
            walls_per_player: None,
            time_per_player: default_time_per_player(),
            players: Vec::new(),
        }
    }
}

impl GameConfig {
    /// Standard 9×9 configuration for a supported player count.
    pub fn standard(num_players: u8) -> Result<Self> {
        Self {
            num_players,
            ..Self::default()
        }
        .normalised()
    }

    pub fn walls_per_player(&self) -> u8 {
        self.walls_per_player
            .unwrap_or_else(|| default_walls_for(self.num_players))
    }

    /// Fill in defaulted seats and check the result.
    pub fn normalised(mut self) -> Result<Self> {
        let walls = self.walls_per_player();
        self.walls_per_player = Some(walls);
        if self.players.is_empty() {
            let seats = seats_for(self.num_players).ok_or_else(|| {
                Error::invalid_config(format!(
                    "unsupported player count {}",
                    self.num_players
                ))
            })?;
            self.players = seats
                .iter()
                .map(|&id| Player::standard(id, self.board_size, walls))
                .collect();
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if seats_for(self.num_players).is_none() {
            return Err(Error::invalid_config(format!(
                "unsupported player count {}",
                self.num_players
            )));
        }
        if !(MIN_BOARD_SIZE..=MAX_BOARD_SIZE).contains(&self.board_size) {
            return Err(Error::invalid_config(format!(
                "board size {} outside {MIN_BOARD_SIZE}..={MAX_BOARD_SIZE}",
                self.board_size
            )));
        }
        if self.players.len() != usize::from(self.num_players) {
            return Err(Error::invalid_config(format!(
                "expected {} players, got {}",
                self.num_players,
                self.players.len()
            )));
        }
        let mut seen: Vec<PlayerId> = Vec::with_capacity(self.players.len());
        for player in &self.players {
            if seen.contains(&player.id) {
                return Err(Error::invalid_config(format!("duplicate seat {}", player.id)));
            }
            seen.push(player.id);
            if !player.start.in_bounds(self.board_size) {
                return Err(Error::invalid_config(format!(
                    "{} starts off the board at {}",
                    player.id, player.start
                )));
            }
            if player.goal_reached(player.start, self.board_size) {
                return Err(Error::invalid_config(format!(
                    "{} starts on its own goal",
                    player.id
                )));
            }
        }
        for (i, a) in self.players.iter().enumerate() {
            if self.players[i + 1..].iter().any(|b| b.start == a.start) {
                return Err(Error::invalid_config(format!(
                    "{} shares its start cell",
                    a.id
                )));
            }
        }
        if self.time_per_player == 0 {
            return Err(Error::invalid_config("time per player must be positive"));
        }
        Ok(())
    }
}
