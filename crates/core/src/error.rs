//! Rejections produced by the room state machine and the room stores.
//!
//! Every variant is an ordinary return value. Nothing here aborts the
//! process; the worst outcome of a rejected intent is that the room stays as
//! it was.

use thiserror::Error;

use crate::{
    room::RoomId,
    rules::{GridIndex, Mark, Move},
};

/// Why a move was refused by the rules engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IllegalMoveReason {
    /// The target sub-board is already won or drawn.
    #[error("sub-board {0} is already decided")]
    SubBoardDecided(GridIndex),
    /// The target cell already holds a mark.
    #[error("cell is already occupied")]
    CellOccupied,
    /// The previous move forced play into another sub-board.
    #[error("play must continue in sub-board {0}")]
    WrongBoard(GridIndex),
}

/// Rejection of an intent against a room.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    /// Move breaks the placement rules.
    #[error("illegal move {mv}: {reason}")]
    IllegalMove {
        /// The refused move.
        mv: Move,
        /// Which rule it broke.
        reason: IllegalMoveReason,
    },
    /// Acting mark is not the player to move.
    #[error("it is {expected}'s turn, not {actual}'s")]
    NotYourTurn {
        /// Player to move.
        expected: Mark,
        /// Mark that tried to act.
        actual: Mark,
    },
    /// Room is won, drawn, or forfeited.
    #[error("the game is already over")]
    GameAlreadyTerminal,
    /// X and O are both held.
    #[error("both seats are taken")]
    SeatsFull,
    /// Nothing to answer.
    #[error("no draw proposal is pending")]
    NoPendingDrawProposal,
    /// The proposer tried to answer their own proposal.
    #[error("{0} cannot answer their own draw proposal")]
    SelfResponseForbidden(Mark),
    /// Only one proposal may be open at a time.
    #[error("{0} already has a draw proposal pending")]
    DrawAlreadyProposed(Mark),
    /// Intent came from a mark whose seat nobody holds.
    #[error("seat {0} is not occupied")]
    SeatUnoccupied(Mark),
    /// Seat-bound intent arrived without an actor.
    #[error("this intent needs an acting seat")]
    MissingActor,
    /// Raw grid index out of range.
    #[error("index {0} is outside 0..=8")]
    InvalidIndex(u8),
    /// Room code is not 1 to 16 ASCII alphanumerics.
    #[error("invalid room id {0:?}")]
    InvalidRoomId(String),
    /// Seat label is blank or too long.
    #[error("invalid seat id: {0}")]
    InvalidSeatId(String),
    /// No room under this code.
    #[error("room {0} not found")]
    RoomNotFound(RoomId),
}

/// Failure while reading or writing room records.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record under this id.
    #[error("room {0} not found")]
    NotFound(RoomId),
    /// Insert would overwrite an existing record.
    #[error("room {0} already exists")]
    AlreadyExists(RoomId),
    /// Conditional update lost a race against another writer.
    #[error("room {id} changed concurrently (expected revision {expected}, found {found})")]
    Conflict {
        /// Room that was being written.
        id: RoomId,
        /// Revision the writer based its change on.
        expected: u64,
        /// Revision currently stored.
        found: u64,
    },
    /// Every generated code collided.
    #[error("no free room code after {0} attempts")]
    CodesExhausted(usize),
    /// The state machine refused the intent.
    #[error(transparent)]
    Rejected(#[from] RoomError),
    /// Filesystem failure.
    #[error("room storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// Record could not be encoded or decoded.
    #[error("room record is malformed: {0}")]
    Serde(#[from] serde_json::Error),
}
