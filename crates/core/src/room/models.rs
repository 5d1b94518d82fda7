#![allow(missing_docs)]

//! Room record and the identifiers it carries.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    error::RoomError,
    rules::{Board, ForcedBoard, GameResult, Mark, SubResult, GRID_SIZE},
};

/// Characters used for generated room codes.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
/// Length of generated room codes unless configured otherwise.
pub const DEFAULT_ROOM_CODE_LENGTH: usize = 5;
/// Longest accepted room code.
pub const MAX_ROOM_ID_LEN: usize = 16;
/// Longest accepted seat label, in characters.
pub const MAX_SEAT_ID_LEN: usize = 20;

static ROOM_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]{1,16}$").expect("invalid room id regex"));

/// Short human-enterable room code, normalised to uppercase.
///
/// Lookups are case-insensitive because parsing folds the input; two ids
/// compare equal whenever their codes match ignoring case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(String);

impl RoomId {
    /// Parse user input into a room id.
    pub fn parse(raw: &str) -> Result<Self, RoomError> {
        let trimmed = raw.trim();
        if !ROOM_ID_RE.is_match(trimmed) {
            return Err(RoomError::InvalidRoomId(raw.to_string()));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Draw a random code of `len` characters (clamped to `1..=16`).
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, len: usize) -> Self {
        let len = len.clamp(1, MAX_ROOM_ID_LEN);
        let code = (0..len)
            .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Borrow the normalised code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RoomId {
    type Err = RoomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RoomId {
    type Error = RoomError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomId> for String {
    fn from(id: RoomId) -> Self {
        id.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque label of the participant holding a seat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SeatId(String);

impl SeatId {
    /// Validate a participant label: trimmed, non-empty, at most 20 characters.
    pub fn parse(raw: &str) -> Result<Self, RoomError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RoomError::InvalidSeatId("must not be empty".to_string()));
        }
        if trimmed.chars().count() > MAX_SEAT_ID_LEN {
            return Err(RoomError::InvalidSeatId(format!(
                "must be at most {MAX_SEAT_ID_LEN} characters"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Borrow the label.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for SeatId {
    type Err = RoomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SeatId {
    type Error = RoomError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SeatId> for String {
    fn from(id: SeatId) -> Self {
        id.0
    }
}

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Coarse lifecycle phase of a room, derived from its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    /// At least one seat is free and the game is not over.
    WaitingForSeats,
    /// Both seats are held and the game is not over.
    InProgress,
    /// Won, drawn, or forfeited. Only a reset leaves this state.
    Terminated,
}

impl fmt::Display for RoomState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RoomState::WaitingForSeats => "waiting for seats",
            RoomState::InProgress => "in progress",
            RoomState::Terminated => "terminated",
        })
    }
}

/// Persisted room record, the aggregate root of a game.
///
/// Field names on the wire follow the shared room table: `mini_winners`,
/// `allowed_board` and `winner` hold the derived results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub board: Board,
    #[serde(rename = "mini_winners")]
    pub sub_results: [SubResult; GRID_SIZE],
    pub current_player: Mark,
    #[serde(rename = "allowed_board")]
    pub forced_board: ForcedBoard,
    #[serde(rename = "winner")]
    pub result: GameResult,
    pub player_x: Option<SeatId>,
    pub player_o: Option<SeatId>,
    pub draw_proposed_by: Option<Mark>,
    pub forfeit_by: Option<Mark>,
    /// Bumped by the store on every persisted write.
    #[serde(default)]
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Room {
    /// Fresh room: empty board, X to move anywhere, no seats taken.
    pub fn new(id: RoomId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            board: Board::default(),
            sub_results: [SubResult::Undecided; GRID_SIZE],
            current_player: Mark::X,
            forced_board: None,
            result: GameResult::Ongoing,
            player_x: None,
            player_o: None,
            draw_proposed_by: None,
            forfeit_by: None,
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Participant holding the seat for `mark`.
    pub fn seat(&self, mark: Mark) -> Option<&SeatId> {
        match mark {
            Mark::X => self.player_x.as_ref(),
            Mark::O => self.player_o.as_ref(),
        }
    }

    /// Mark held by `seat`, if it holds one. X wins ties.
    pub fn mark_of(&self, seat: &SeatId) -> Option<Mark> {
        [Mark::X, Mark::O]
            .into_iter()
            .find(|mark| self.seat(*mark) == Some(seat))
    }

    pub fn is_terminal(&self) -> bool {
        self.result.is_terminal()
    }

    pub fn state(&self) -> RoomState {
        if self.is_terminal() {
            RoomState::Terminated
        } else if self.player_x.is_some() && self.player_o.is_some() {
            RoomState::InProgress
        } else {
            RoomState::WaitingForSeats
        }
    }
}
