#![warn(clippy::all, missing_docs)]

//! Core logic for ultimate tic-tac-toe rooms.
//!
//! The crate holds the pure rules engine, the room state machine built on
//! top of it, room persistence, the service that applies intents and fans
//! out updates, and configuration shared by every frontend.

pub mod config;
pub mod error;
pub mod room;
pub mod rules;
pub mod store;
pub mod sync;

pub use config::AppConfig;
pub use error::{IllegalMoveReason, RoomError, StoreError};
pub use room::{apply_intent, Intent, Room, RoomId, RoomState, SeatId, Transition};
pub use rules::{
    apply_move, is_legal_move, legal_moves, GameResult, GridIndex, Mark, Move, SubResult,
};
pub use store::{FileStore, MemoryStore, RoomStore};
pub use sync::{Envelope, RoomEvent, RoomService};
