//! Client intents and the single dispatch point that applies them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::RoomError,
    rules::{Mark, Move},
};

use super::{
    machine,
    models::{Room, RoomId, SeatId},
};

/// Something a participant asks the room to do.
///
/// Serialized with a `type` tag, e.g.
/// `{"type":"submit_move","boardIndex":0,"cellIndex":4}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    /// Claim the first free seat.
    JoinSeat {
        /// Label of the joining participant.
        requester: SeatId,
    },
    /// Place the actor's mark.
    SubmitMove(Move),
    /// Offer the opponent a draw.
    ProposeDraw,
    /// Answer a pending draw proposal from the opponent.
    RespondDraw {
        /// `true` ends the game as a draw.
        accept: bool,
    },
    /// Concede the game.
    Forfeit,
    /// Replace the room with a fresh one, optionally under another id.
    Reset {
        /// Id for the new room; the current id when absent.
        #[serde(default)]
        new_id: Option<RoomId>,
    },
}

impl Intent {
    /// Whether the intent must be tagged with the acting seat.
    pub fn needs_actor(&self) -> bool {
        !matches!(self, Intent::JoinSeat { .. } | Intent::Reset { .. })
    }
}

/// Accepted outcome of an intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The room changed in place.
    Updated(Room),
    /// A participant took a seat.
    Joined {
        /// Room with the seat assigned.
        room: Room,
        /// Seat that was assigned.
        mark: Mark,
    },
    /// The old room is discarded in favour of this one.
    Reset(Room),
}

impl Transition {
    /// Borrow the resulting room.
    pub fn room(&self) -> &Room {
        match self {
            Transition::Updated(room) | Transition::Reset(room) => room,
            Transition::Joined { room, .. } => room,
        }
    }

    /// Take the resulting room.
    pub fn into_room(self) -> Room {
        match self {
            Transition::Updated(room) | Transition::Reset(room) => room,
            Transition::Joined { room, .. } => room,
        }
    }
}

/// Apply `intent` on behalf of `actor`. `now` is only used by a reset.
pub fn apply_intent(
    room: &Room,
    actor: Option<Mark>,
    intent: Intent,
    now: DateTime<Utc>,
) -> Result<Transition, RoomError> {
    let acting = || actor.ok_or(RoomError::MissingActor);
    match intent {
        Intent::JoinSeat { requester } => {
            let (room, mark) = machine::join_seat(room, requester)?;
            Ok(Transition::Joined { room, mark })
        }
        Intent::SubmitMove(mv) => {
            machine::submit_move(room, acting()?, mv).map(Transition::Updated)
        }
        Intent::ProposeDraw => machine::propose_draw(room, acting()?).map(Transition::Updated),
        Intent::RespondDraw { accept } => {
            machine::respond_draw(room, acting()?, accept).map(Transition::Updated)
        }
        Intent::Forfeit => machine::forfeit(room, acting()?).map(Transition::Updated),
        Intent::Reset { new_id } => Ok(Transition::Reset(machine::reset(room, new_id, now))),
    }
}
