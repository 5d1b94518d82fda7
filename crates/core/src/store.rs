//! Room persistence.
//!
//! Stores hold the single authoritative record per room. Writes are
//! conditional on the revision the writer read, so two transitions based on
//! the same prior state can never both land.

use std::{
    collections::HashMap,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::{
    config,
    error::StoreError,
    room::{Room, RoomId},
};

/// Backing storage for room records.
pub trait RoomStore: Send + Sync {
    /// Fetch a room by id.
    fn load(&self, id: &RoomId) -> Result<Room, StoreError>;

    /// Store a new room; fails if the id is taken.
    fn insert(&self, room: Room) -> Result<Room, StoreError>;

    /// Overwrite a room if its stored revision still equals `expected_revision`.
    ///
    /// On success the stored copy has its revision bumped and `updated_at`
    /// stamped, and that copy is returned.
    fn replace(&self, room: Room, expected_revision: u64) -> Result<Room, StoreError>;

    /// Delete a room if its stored revision still equals `expected_revision`.
    fn remove(&self, id: &RoomId, expected_revision: u64) -> Result<Room, StoreError>;

    /// Ids of all stored rooms, sorted.
    fn ids(&self) -> Result<Vec<RoomId>, StoreError>;

    /// Whether a room exists.
    fn contains(&self, id: &RoomId) -> Result<bool, StoreError> {
        match self.load(id) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

fn check_revision(stored: &Room, expected: u64) -> Result<(), StoreError> {
    if stored.revision == expected {
        Ok(())
    } else {
        Err(StoreError::Conflict {
            id: stored.id.clone(),
            expected,
            found: stored.revision,
        })
    }
}

fn stamp(mut room: Room, previous_revision: u64) -> Room {
    room.revision = previous_revision + 1;
    room.updated_at = Utc::now();
    room
}

/// In-process store, for tests and single-process hosts.
#[derive(Default)]
pub struct MemoryStore {
    rooms: RwLock<HashMap<RoomId, Room>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoomStore for MemoryStore {
    fn load(&self, id: &RoomId) -> Result<Room, StoreError> {
        self.rooms
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn insert(&self, room: Room) -> Result<Room, StoreError> {
        let mut rooms = self.rooms.write();
        if rooms.contains_key(&room.id) {
            return Err(StoreError::AlreadyExists(room.id));
        }
        rooms.insert(room.id.clone(), room.clone());
        Ok(room)
    }

    fn replace(&self, room: Room, expected_revision: u64) -> Result<Room, StoreError> {
        let mut rooms = self.rooms.write();
        let stored = rooms
            .get_mut(&room.id)
            .ok_or_else(|| StoreError::NotFound(room.id.clone()))?;
        check_revision(stored, expected_revision)?;
        *stored = stamp(room, expected_revision);
        Ok(stored.clone())
    }

    fn remove(&self, id: &RoomId, expected_revision: u64) -> Result<Room, StoreError> {
        let mut rooms = self.rooms.write();
        let stored = rooms
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        check_revision(stored, expected_revision)?;
        rooms
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn ids(&self) -> Result<Vec<RoomId>, StoreError> {
        let mut ids: Vec<RoomId> = self.rooms.read().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

/// Store keeping one pretty-printed JSON file per room.
///
/// Files are replaced atomically through a temporary file in the same
/// directory. Writers inside one process are serialised by a mutex; separate
/// processes sharing a directory are not coordinated.
pub struct FileStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Create a store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Default location under the user's data directory.
    pub fn default_root() -> PathBuf {
        config::default_data_root()
    }

    /// Directory holding the room files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &RoomId) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    fn read_room(&self, id: &RoomId) -> Result<Room, StoreError> {
        let path = self.path_for(id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.clone()))
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    fn write_room(&self, room: &Room) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root)?;
        let mut file = NamedTempFile::new_in(&self.root)?;
        serde_json::to_writer_pretty(&mut file, room)?;
        file.write_all(b"\n")?;
        file.persist(self.path_for(&room.id))
            .map_err(|err| StoreError::Io(err.error))?;
        debug!(room = %room.id, revision = room.revision, "room written");
        Ok(())
    }
}

impl RoomStore for FileStore {
    fn load(&self, id: &RoomId) -> Result<Room, StoreError> {
        self.read_room(id)
    }

    fn insert(&self, room: Room) -> Result<Room, StoreError> {
        let _guard = self.write_lock.lock();
        if self.path_for(&room.id).exists() {
            return Err(StoreError::AlreadyExists(room.id));
        }
        self.write_room(&room)?;
        Ok(room)
    }

    fn replace(&self, room: Room, expected_revision: u64) -> Result<Room, StoreError> {
        let _guard = self.write_lock.lock();
        let stored = self.read_room(&room.id)?;
        check_revision(&stored, expected_revision)?;
        let room = stamp(room, expected_revision);
        self.write_room(&room)?;
        Ok(room)
    }

    fn remove(&self, id: &RoomId, expected_revision: u64) -> Result<Room, StoreError> {
        let _guard = self.write_lock.lock();
        let stored = self.read_room(id)?;
        check_revision(&stored, expected_revision)?;
        fs::remove_file(self.path_for(id))?;
        Ok(stored)
    }

    fn ids(&self) -> Result<Vec<RoomId>, StoreError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            match RoomId::parse(stem) {
                Ok(id) => ids.push(id),
                Err(err) => warn!("Skipping {}: {err}", path.display()),
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Mark;
    use tempfile::tempdir;

    fn room(code: &str) -> Room {
        Room::new(RoomId::parse(code).expect("valid id"), Utc::now())
    }

    fn exercise_store(store: &dyn RoomStore) {
        let created = store.insert(room("ABCDE")).expect("insert");
        assert_eq!(created.revision, 0);
        assert!(matches!(
            store.insert(room("abcde")),
            Err(StoreError::AlreadyExists(_))
        ));

        let lookup = RoomId::parse("aBcDe").expect("valid id");
        assert!(store.contains(&lookup).expect("contains"));
        assert!(!store.contains(&RoomId::parse("ZZZZZ").expect("valid id")).expect("contains"));

        let mut next = store.load(&lookup).expect("load");
        next.draw_proposed_by = Some(Mark::X);
        let saved = store.replace(next.clone(), 0).expect("first writer wins");
        assert_eq!(saved.revision, 1);
        assert!(saved.updated_at >= created.updated_at);

        // A second writer based on revision 0 loses.
        let err = store.replace(next, 0).expect_err("stale writer");
        assert!(matches!(
            err,
            StoreError::Conflict {
                expected: 0,
                found: 1,
                ..
            }
        ));
        assert_eq!(store.load(&lookup).expect("load").draw_proposed_by, Some(Mark::X));

        store.insert(room("AAAAA")).expect("insert");
        let ids = store.ids().expect("ids");
        assert_eq!(
            ids.iter().map(RoomId::as_str).collect::<Vec<_>>(),
            vec!["AAAAA", "ABCDE"]
        );

        assert!(matches!(
            store.remove(&lookup, 0),
            Err(StoreError::Conflict { .. })
        ));
        store.remove(&lookup, 1).expect("remove");
        assert!(matches!(store.load(&lookup), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn memory_store_contract() {
        exercise_store(&MemoryStore::new());
    }

    #[test]
    fn file_store_contract() -> anyhow::Result<()> {
        let dir = tempdir()?;
        exercise_store(&FileStore::new(dir.path().join("rooms")));
        Ok(())
    }

    #[test]
    fn file_store_skips_foreign_files() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store = FileStore::new(dir.path());
        store.insert(room("ROOM1"))?;
        fs::write(dir.path().join("notes.txt"), "hello")?;
        fs::write(dir.path().join("bad-name.json"), "{}")?;

        let ids = store.ids()?;
        assert_eq!(ids, vec![RoomId::parse("ROOM1")?]);
        Ok(())
    }

    #[test]
    fn file_store_reports_corrupt_records() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store = FileStore::new(dir.path());
        fs::write(dir.path().join("BROKE.json"), "{ not json")?;
        let err = store
            .load(&RoomId::parse("broke")?)
            .expect_err("corrupt record");
        assert!(matches!(err, StoreError::Serde(_)));
        Ok(())
    }

    #[test]
    fn missing_root_lists_nothing() {
        let store = FileStore::new("/nonexistent/uttt/rooms");
        assert!(store.ids().expect("ids").is_empty());
    }
}
