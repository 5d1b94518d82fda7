//! Room state machine.
//!
//! A room wraps one game plus its seats and draw negotiation. Transitions are
//! pure functions from the current room and an intent to the next room or a
//! rejection; persistence and broadcasting belong to [`crate::sync`].

pub mod intent;
pub mod machine;
mod models;

pub use intent::{apply_intent, Intent, Transition};
pub use machine::{forfeit, join_seat, propose_draw, reset, respond_draw, submit_move};
pub use models::{
    Room, RoomId, RoomState, SeatId, DEFAULT_ROOM_CODE_LENGTH, MAX_ROOM_ID_LEN, MAX_SEAT_ID_LEN,
    ROOM_CODE_ALPHABET,
};
