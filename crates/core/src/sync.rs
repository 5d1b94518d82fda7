//! Synchronisation layer between clients and the room store.
//!
//! [`RoomService`] loads the authoritative record, runs the pure state
//! machine, writes the result back with a conditional update, and fans the
//! new state out to every subscriber. Intents that lose a race are dropped,
//! never retried.

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::{
    config::AppConfig,
    error::StoreError,
    room::{apply_intent, Intent, Room, RoomId, Transition},
    rules::Mark,
    store::RoomStore,
};

/// Attempts at finding an unused room code before giving up.
pub const MAX_CREATE_ATTEMPTS: usize = 16;

/// An intent addressed to a room, tagged with the acting seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Target room.
    pub room_id: RoomId,
    /// Seat the intent acts for; joins and resets carry none.
    #[serde(default)]
    pub actor: Option<Mark>,
    /// What is being asked.
    pub intent: Intent,
}

impl Envelope {
    /// Build an envelope.
    pub fn new(room_id: RoomId, actor: Option<Mark>, intent: Intent) -> Self {
        Self {
            room_id,
            actor,
            intent,
        }
    }
}

/// Broadcast to subscribers after every accepted change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RoomEvent {
    /// A new empty room was created.
    Created {
        /// The stored room.
        room: Room,
    },
    /// A room changed in place.
    Updated {
        /// The stored room after the change.
        room: Room,
        /// Seat assigned by this change, for joins.
        #[serde(skip_serializing_if = "Option::is_none")]
        joined: Option<Mark>,
    },
    /// A room was discarded and replaced.
    Reset {
        /// Id of the discarded room.
        previous: RoomId,
        /// The replacement.
        room: Room,
    },
}

impl RoomEvent {
    /// Room carried by the event.
    pub fn room(&self) -> &Room {
        match self {
            RoomEvent::Created { room }
            | RoomEvent::Updated { room, .. }
            | RoomEvent::Reset { room, .. } => room,
        }
    }

    /// Take the room carried by the event.
    pub fn into_room(self) -> Room {
        match self {
            RoomEvent::Created { room }
            | RoomEvent::Updated { room, .. }
            | RoomEvent::Reset { room, .. } => room,
        }
    }

    /// Whether subscribers of `id` should see this event.
    pub fn concerns(&self, id: &RoomId) -> bool {
        match self {
            RoomEvent::Reset { previous, room } => previous == id || &room.id == id,
            _ => &self.room().id == id,
        }
    }
}

/// Applies intents against a store and broadcasts the outcome.
pub struct RoomService<S> {
    store: S,
    events: broadcast::Sender<RoomEvent>,
    room_code_length: usize,
}

impl<S: RoomStore> RoomService<S> {
    /// Create a service over `store`.
    pub fn new(store: S, config: &AppConfig) -> Self {
        let (events, _) = broadcast::channel(config.broadcast_capacity.max(1));
        Self {
            store,
            events,
            room_code_length: config.room_code_length,
        }
    }

    /// Underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Receive every event published from now on. Filter with
    /// [`RoomEvent::concerns`] to follow a single room.
    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.events.subscribe()
    }

    /// Create an empty room under a freshly generated code.
    pub fn create_room<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Room, StoreError> {
        for _ in 0..MAX_CREATE_ATTEMPTS {
            let id = RoomId::generate(rng, self.room_code_length);
            match self.store.insert(Room::new(id, Utc::now())) {
                Ok(room) => {
                    info!(room = %room.id, "room created");
                    self.publish(RoomEvent::Created { room: room.clone() });
                    return Ok(room);
                }
                Err(StoreError::AlreadyExists(id)) => {
                    debug!(room = %id, "room code taken, drawing another");
                }
                Err(err) => return Err(err),
            }
        }
        Err(StoreError::CodesExhausted(MAX_CREATE_ATTEMPTS))
    }

    /// Look a room up from user input. Absence is `Ok(None)`.
    pub fn find(&self, raw_id: &str) -> Result<Option<Room>, StoreError> {
        let id = RoomId::parse(raw_id)?;
        match self.store.load(&id) {
            Ok(room) => Ok(Some(room)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Apply one intent. Rejections and lost races leave the store untouched
    /// and publish nothing.
    pub fn handle(&self, envelope: Envelope) -> Result<RoomEvent, StoreError> {
        let Envelope {
            room_id,
            actor,
            intent,
        } = envelope;
        let current = self.store.load(&room_id)?;

        let transition = apply_intent(&current, actor, intent, Utc::now()).map_err(|err| {
            debug!(room = %room_id, "intent rejected: {err}");
            err
        })?;

        let event = match transition {
            Transition::Updated(next) => RoomEvent::Updated {
                room: self.store.replace(next, current.revision)?,
                joined: None,
            },
            Transition::Joined { room, mark } => {
                let room = self.store.replace(room, current.revision)?;
                info!(room = %room.id, seat = %mark, "seat taken");
                RoomEvent::Updated {
                    room,
                    joined: Some(mark),
                }
            }
            Transition::Reset(fresh) => {
                let room = self.reset_room(&current, fresh)?;
                info!(previous = %current.id, room = %room.id, "room reset");
                RoomEvent::Reset {
                    previous: current.id,
                    room,
                }
            }
        };

        self.publish(event.clone());
        Ok(event)
    }

    /// Single-writer loop: handle queued envelopes in arrival order until the
    /// sending side closes.
    pub async fn run(&self, mut intents: mpsc::Receiver<Envelope>) {
        while let Some(envelope) = intents.recv().await {
            let room_id = envelope.room_id.clone();
            match self.handle(envelope) {
                Ok(event) => debug!(room = %event.room().id, "intent applied"),
                Err(StoreError::Conflict { .. }) => {
                    warn!(room = %room_id, "dropping intent based on a stale room");
                }
                Err(StoreError::Rejected(err)) => {
                    debug!(room = %room_id, "dropping rejected intent: {err}");
                }
                Err(err) => warn!(room = %room_id, "failed to apply intent: {err}"),
            }
        }
        debug!("intent queue closed");
    }

    /// Swap `current` for `fresh`. Revisions keep counting across the reset,
    /// so a writer still holding the discarded game can never match the new one.
    fn reset_room(&self, current: &Room, mut fresh: Room) -> Result<Room, StoreError> {
        if fresh.id == current.id {
            return self.store.replace(fresh, current.revision);
        }

        fresh.revision = current.revision + 1;
        let room = self.store.insert(fresh)?;
        if let Err(err) = self.store.remove(&current.id, current.revision) {
            if let Err(rollback) = self.store.remove(&room.id, room.revision) {
                warn!(room = %room.id, "failed to undo reset: {rollback}");
            }
            return Err(err);
        }
        Ok(room)
    }

    fn publish(&self, event: RoomEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
