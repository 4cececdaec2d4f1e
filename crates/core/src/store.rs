//! File-backed profile library.
//!
//! Four JSON documents under one data directory, each an ordered array of
//! flat objects. Every mutation is a synchronous whole-file replace; the
//! store is single-writer, last-writer-wins. Loading a missing or malformed
//! file yields an empty collection, never an error.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use utoipa::ToSchema;

use crate::profile::{Guest, HistoryEntry, Named, Staff, World};
use crate::rating::{self, RatingChange};

pub const WORLDS_FILE: &str = "worlds.json";
pub const GUESTS_FILE: &str = "guests.json";
pub const STAFF_FILE: &str = "staff.json";
pub const HISTORY_FILE: &str = "history.json";

/// Persistence failure, carrying the path that was being touched.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not create data directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Handle on the data directory holding the four library files.
#[derive(Debug, Clone)]
pub struct Library {
    dir: PathBuf,
}

impl Library {
    /// Opens (and creates if needed) the data directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    fn load_values(&self, file: &str) -> Vec<Value> {
        let path = self.path(file);
        let Ok(bytes) = fs::read(&path) else {
            return Vec::new();
        };
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Array(items)) => items,
            Ok(_) | Err(_) => {
                warn!(path = %path.display(), "ignoring malformed library file");
                Vec::new()
            }
        }
    }

    /// Loads a name-keyed collection. Entries that fail to decode or lack a
    /// name are dropped.
    fn load_named<T>(&self, file: &str) -> Vec<T>
    where
        T: DeserializeOwned + Named,
    {
        self.load_values(file)
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<T>(value) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(file, %err, "dropping undecodable library entry");
                    None
                }
            })
            .filter(|entry| !entry.name().trim().is_empty())
            .collect()
    }

    fn save<T: Serialize>(&self, file: &str, entries: &[T]) -> Result<(), StoreError> {
        let path = self.path(file);
        let text = serde_json::to_string_pretty(entries).map_err(|source| StoreError::Encode {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, text).map_err(|source| StoreError::Write { path, source })
    }

    fn upsert_in<T>(&self, file: &str, profile: T) -> Result<(), StoreError>
    where
        T: Serialize + DeserializeOwned + Named,
    {
        // Deliberate no-op: a nameless profile is unsavable, not an error.
        if profile.name().trim().is_empty() {
            warn!(file, "skipping upsert of profile without a name");
            return Ok(());
        }
        let mut entries = self.load_named::<T>(file);
        entries.retain(|entry| entry.name() != profile.name());
        entries.insert(0, profile);
        self.save(file, &entries)
    }

    fn delete_in<T>(&self, file: &str, name: &str) -> Result<(), StoreError>
    where
        T: Serialize + DeserializeOwned + Named,
    {
        let mut entries = self.load_named::<T>(file);
        let before = entries.len();
        entries.retain(|entry| entry.name() != name);
        if entries.len() == before {
            return Ok(());
        }
        self.save(file, &entries)
    }

    pub fn worlds(&self) -> Vec<World> {
        self.load_named(WORLDS_FILE)
    }

    pub fn guests(&self) -> Vec<Guest> {
        self.load_named(GUESTS_FILE)
    }

    pub fn staff(&self) -> Vec<Staff> {
        self.load_named(STAFF_FILE)
    }

    /// History bypasses the name check: every decodable entry is kept, newest
    /// first by file order.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.load_values(HISTORY_FILE)
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<HistoryEntry>(value) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(%err, "dropping undecodable history entry");
                    None
                }
            })
            .collect()
    }

    pub fn find_world(&self, name: &str) -> Option<World> {
        self.worlds().into_iter().find(|world| world.name == name)
    }

    pub fn find_guest(&self, name: &str) -> Option<Guest> {
        self.guests().into_iter().find(|guest| guest.name == name)
    }

    pub fn find_staff(&self, name: &str) -> Option<Staff> {
        self.staff().into_iter().find(|staff| staff.name == name)
    }

    pub fn upsert_world(&self, world: World) -> Result<(), StoreError> {
        self.upsert_in(WORLDS_FILE, world)
    }

    pub fn upsert_guest(&self, guest: Guest) -> Result<(), StoreError> {
        self.upsert_in(GUESTS_FILE, guest)
    }

    pub fn upsert_staff(&self, staff: Staff) -> Result<(), StoreError> {
        self.upsert_in(STAFF_FILE, staff)
    }

    pub fn delete_world(&self, name: &str) -> Result<(), StoreError> {
        self.delete_in::<World>(WORLDS_FILE, name)
    }

    pub fn delete_guest(&self, name: &str) -> Result<(), StoreError> {
        self.delete_in::<Guest>(GUESTS_FILE, name)
    }

    pub fn delete_staff(&self, name: &str) -> Result<(), StoreError> {
        self.delete_in::<Staff>(STAFF_FILE, name)
    }

    /// Inserts at position 0 unconditionally: no dedup, no name requirement.
    pub fn append_history(&self, entry: HistoryEntry) -> Result<(), StoreError> {
        let mut entries = self.history();
        entries.insert(0, entry);
        self.save(HISTORY_FILE, &entries)
    }

    /// Applies one satisfaction score to the named world and persists it.
    /// Returns `None` when the world no longer exists.
    pub fn update_world_rating(
        &self,
        name: &str,
        satisfaction: u8,
    ) -> Result<Option<RatingChange>, StoreError> {
        let mut worlds = self.worlds();
        let Some(world) = worlds.iter_mut().find(|world| world.name == name) else {
            return Ok(None);
        };
        let change = rating::apply(world, satisfaction);
        self.save(WORLDS_FILE, &worlds)?;
        Ok(Some(change))
    }

    pub fn export(&self) -> LibraryExport {
        LibraryExport {
            worlds: Some(self.worlds()),
            guests: Some(self.guests()),
            staffs: Some(self.staff()),
            history: Some(self.history()),
        }
    }

    /// Replaces each collection that is present in the document; absent keys
    /// leave the corresponding file untouched.
    pub fn import(&self, document: LibraryExport) -> Result<(), StoreError> {
        if let Some(worlds) = document.worlds {
            self.save(WORLDS_FILE, &worlds)?;
        }
        if let Some(guests) = document.guests {
            self.save(GUESTS_FILE, &guests)?;
        }
        if let Some(staffs) = document.staffs {
            self.save(STAFF_FILE, &staffs)?;
        }
        if let Some(history) = document.history {
            self.save(HISTORY_FILE, &history)?;
        }
        Ok(())
    }
}

/// Combined backup document: four optional named sequences.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LibraryExport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worlds: Option<Vec<World>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guests: Option<Vec<Guest>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staffs: Option<Vec<Staff>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryEntry>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::Evaluation;
    use approx::assert_abs_diff_eq;
    use chrono::Utc;
    use tempfile::tempdir;

    fn world(name: &str) -> World {
        World {
            name: name.to_string(),
            kind: "シティホテル".to_string(),
            ..World::default()
        }
    }

    fn guest(name: &str) -> Guest {
        Guest {
            name: name.to_string(),
            ..Guest::default()
        }
    }

    fn entry(summary: &str) -> HistoryEntry {
        HistoryEntry {
            timestamp: Utc::now(),
            role: crate::profile::PlayerRole::Staff,
            world: "w".to_string(),
            guest: "g".to_string(),
            staff: "s".to_string(),
            score: 70,
            satisfaction: "★★★☆☆".to_string(),
            summary: summary.to_string(),
            result: Evaluation::default(),
        }
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempdir().expect("tempdir");
        let library = Library::open(dir.path()).expect("open");
        assert!(library.worlds().is_empty());
        assert!(library.history().is_empty());
    }

    #[test]
    fn test_malformed_file_loads_empty() {
        let dir = tempdir().expect("tempdir");
        let library = Library::open(dir.path()).expect("open");
        std::fs::write(dir.path().join(WORLDS_FILE), "not json at all").expect("write");
        assert!(library.worlds().is_empty());
    }

    #[test]
    fn test_upsert_inserts_at_front_and_replaces() {
        let dir = tempdir().expect("tempdir");
        let library = Library::open(dir.path()).expect("open");
        library.upsert_world(world("古都")).expect("upsert");
        library.upsert_world(world("海風")).expect("upsert");

        let names: Vec<String> = library.worlds().into_iter().map(|w| w.name).collect();
        assert_eq!(names, vec!["海風", "古都"]);

        // Re-upserting an existing name moves it to the front, no duplicate.
        let mut updated = world("古都");
        updated.condition = "満室".to_string();
        library.upsert_world(updated).expect("upsert");
        let worlds = library.worlds();
        assert_eq!(worlds.len(), 2);
        assert_eq!(worlds[0].name, "古都");
        assert_eq!(worlds[0].condition, "満室");
    }

    #[test]
    fn test_upsert_identical_twice_is_idempotent() {
        let dir = tempdir().expect("tempdir");
        let library = Library::open(dir.path()).expect("open");
        library.upsert_guest(guest("鈴木")).expect("upsert");
        library.upsert_guest(guest("鈴木")).expect("upsert");
        assert_eq!(library.guests().len(), 1);
    }

    #[test]
    fn test_upsert_without_name_is_silent_noop() {
        let dir = tempdir().expect("tempdir");
        let library = Library::open(dir.path()).expect("open");
        library.upsert_world(world("  ")).expect("upsert");
        assert!(library.worlds().is_empty());
        assert!(!dir.path().join(WORLDS_FILE).exists());
    }

    #[test]
    fn test_delete_missing_name_is_noop() {
        let dir = tempdir().expect("tempdir");
        let library = Library::open(dir.path()).expect("open");
        library.upsert_world(world("古都")).expect("upsert");
        library.delete_world("存在しない").expect("delete");
        assert_eq!(library.worlds().len(), 1);
    }

    #[test]
    fn test_delete_removes_all_matching_entries() {
        let dir = tempdir().expect("tempdir");
        let library = Library::open(dir.path()).expect("open");
        // Duplicate names can only arrive via hand-edited files; delete still
        // clears every match.
        let doubled = serde_json::json!([
            { "name": "古都" },
            { "name": "海風" },
            { "name": "古都" }
        ]);
        std::fs::write(
            dir.path().join(WORLDS_FILE),
            serde_json::to_string(&doubled).expect("encode"),
        )
        .expect("write");

        library.delete_world("古都").expect("delete");
        let names: Vec<String> = library.worlds().into_iter().map(|w| w.name).collect();
        assert_eq!(names, vec!["海風"]);
    }

    #[test]
    fn test_nameless_entries_dropped_except_history() {
        let dir = tempdir().expect("tempdir");
        let library = Library::open(dir.path()).expect("open");
        let raw = serde_json::json!([{ "name": "古都" }, { "condition": "満室" }, 42]);
        std::fs::write(
            dir.path().join(WORLDS_FILE),
            serde_json::to_string(&raw).expect("encode"),
        )
        .expect("write");
        assert_eq!(library.worlds().len(), 1);

        library.append_history(entry("a")).expect("append");
        // History entries have no name and are still listed.
        assert_eq!(library.history().len(), 1);
    }

    #[test]
    fn test_append_history_newest_first() {
        let dir = tempdir().expect("tempdir");
        let library = Library::open(dir.path()).expect("open");
        library.append_history(entry("最初")).expect("append");
        library.append_history(entry("二番目")).expect("append");
        let summaries: Vec<String> = library.history().into_iter().map(|e| e.summary).collect();
        assert_eq!(summaries, vec!["二番目", "最初"]);
    }

    #[test]
    fn test_export_import_round_trip() {
        let source_dir = tempdir().expect("tempdir");
        let source = Library::open(source_dir.path()).expect("open");
        source.upsert_world(world("古都")).expect("upsert");
        source.upsert_guest(guest("鈴木")).expect("upsert");
        source
            .upsert_staff(Staff {
                name: "佐藤".to_string(),
                ..Staff::default()
            })
            .expect("upsert");
        source.append_history(entry("a")).expect("append");
        source.append_history(entry("b")).expect("append");

        let target_dir = tempdir().expect("tempdir");
        let target = Library::open(target_dir.path()).expect("open");
        target.import(source.export()).expect("import");

        assert_eq!(target.worlds().len(), 1);
        assert_eq!(target.guests().len(), 1);
        assert_eq!(target.staff().len(), 1);
        // History order survives the round trip.
        let summaries: Vec<String> = target.history().into_iter().map(|e| e.summary).collect();
        assert_eq!(summaries, vec!["b", "a"]);
    }

    #[test]
    fn test_import_only_replaces_present_keys() {
        let dir = tempdir().expect("tempdir");
        let library = Library::open(dir.path()).expect("open");
        library.upsert_guest(guest("鈴木")).expect("upsert");

        let document = LibraryExport {
            worlds: Some(vec![world("新天地")]),
            ..LibraryExport::default()
        };
        library.import(document).expect("import");

        assert_eq!(library.worlds().len(), 1);
        // Guests were absent from the document and must be untouched.
        assert_eq!(library.guests().len(), 1);
    }

    #[test]
    fn test_update_world_rating_bootstrap() {
        let dir = tempdir().expect("tempdir");
        let library = Library::open(dir.path()).expect("open");
        library.upsert_world(world("古都")).expect("upsert");

        let change = library
            .update_world_rating("古都", 5)
            .expect("update")
            .expect("world exists");
        assert_abs_diff_eq!(change.new, 3.18, epsilon = 1e-9);

        let persisted = library.find_world("古都").expect("find");
        assert_eq!(persisted.rating_count, Some(11));
        assert_abs_diff_eq!(persisted.current_rating.expect("rating"), 3.18, epsilon = 1e-9);
    }

    #[test]
    fn test_update_world_rating_unknown_world() {
        let dir = tempdir().expect("tempdir");
        let library = Library::open(dir.path()).expect("open");
        let change = library.update_world_rating("どこにもない", 5).expect("update");
        assert!(change.is_none());
    }
}
