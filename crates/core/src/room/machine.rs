//! Room transitions: seats, moves, draw negotiation, forfeit and reset.
//!
//! Each transition takes the current room by reference and either returns the
//! next room or a [`RoomError`]; a rejection never carries a partial change.
//! None of these functions stamp `updated_at` or `revision`, the store does
//! that when the result is persisted.

use chrono::{DateTime, Utc};

use crate::{
    error::RoomError,
    rules::{self, GameResult, Mark, Move},
};

use super::models::{Room, RoomId, SeatId};

/// Seat `requester` as X when free, otherwise as O.
///
/// There is no reconnection by identity: a participant who already holds a
/// seat and joins again takes the other free seat, if any.
pub fn join_seat(room: &Room, requester: SeatId) -> Result<(Room, Mark), RoomError> {
    if room.is_terminal() {
        return Err(RoomError::GameAlreadyTerminal);
    }
    let mark = if room.player_x.is_none() {
        Mark::X
    } else if room.player_o.is_none() {
        Mark::O
    } else {
        return Err(RoomError::SeatsFull);
    };

    let mut next = room.clone();
    match mark {
        Mark::X => next.player_x = Some(requester),
        Mark::O => next.player_o = Some(requester),
    }
    Ok((next, mark))
}

/// Place a mark. Callers may drop the rejection and re-prompt the same player.
pub fn submit_move(room: &Room, actor: Mark, mv: Move) -> Result<Room, RoomError> {
    rules::apply_move(room, mv, actor)
}

/// Record a draw offer from a seated player.
pub fn propose_draw(room: &Room, proposer: Mark) -> Result<Room, RoomError> {
    if room.is_terminal() {
        return Err(RoomError::GameAlreadyTerminal);
    }
    if room.seat(proposer).is_none() {
        return Err(RoomError::SeatUnoccupied(proposer));
    }
    if let Some(pending) = room.draw_proposed_by {
        return Err(RoomError::DrawAlreadyProposed(pending));
    }

    let mut next = room.clone();
    next.draw_proposed_by = Some(proposer);
    Ok(next)
}

/// Answer the other player's pending proposal.
///
/// Accepting ends the game as a draw without moving the turn; rejecting only
/// clears the proposal.
pub fn respond_draw(room: &Room, responder: Mark, accept: bool) -> Result<Room, RoomError> {
    if room.is_terminal() {
        return Err(RoomError::GameAlreadyTerminal);
    }
    let proposer = room
        .draw_proposed_by
        .ok_or(RoomError::NoPendingDrawProposal)?;
    if proposer == responder {
        return Err(RoomError::SelfResponseForbidden(responder));
    }

    let mut next = room.clone();
    next.draw_proposed_by = None;
    if accept {
        next.result = GameResult::Draw;
    }
    Ok(next)
}

/// Concede: the opponent wins and the forfeiting mark is recorded.
pub fn forfeit(room: &Room, forfeiting: Mark) -> Result<Room, RoomError> {
    if room.is_terminal() {
        return Err(RoomError::GameAlreadyTerminal);
    }

    let mut next = room.clone();
    next.result = GameResult::Won(forfeiting.opponent());
    next.forfeit_by = Some(forfeiting);
    next.draw_proposed_by = None;
    Ok(next)
}

/// Discard `room` and start over, under `id` or the old id.
///
/// Seats are not carried over; both participants join again.
pub fn reset(room: &Room, id: Option<RoomId>, now: DateTime<Utc>) -> Room {
    Room::new(id.unwrap_or_else(|| room.id.clone()), now)
}
