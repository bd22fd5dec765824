//! lq-save: progress persistence for LearnQuest
//!
//! One JSON snapshot per level, stored under the platform data directory.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use lq_core::state::SNAPSHOT_VERSION;
use lq_core::{Level, Snapshot, SnapshotError};

/// Save/restore errors
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Snapshot not found")]
    NotFound,

    #[error("Incompatible snapshot version: expected {expected}, found {found}")]
    IncompatibleVersion { expected: u32, found: u32 },

    #[error("Snapshot is for level {found}, not {expected}")]
    WrongLevel { expected: String, found: String },
}

impl From<SnapshotError> for SaveError {
    fn from(err: SnapshotError) -> Self {
        match err {
            SnapshotError::Version { expected, found } => {
                SaveError::IncompatibleVersion { expected, found }
            }
            SnapshotError::WrongLevel { expected, found } => {
                SaveError::WrongLevel { expected, found }
            }
        }
    }
}

/// Write a snapshot, creating parent directories as needed
pub fn save_snapshot(snapshot: &Snapshot, path: impl AsRef<Path>) -> Result<(), SaveError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, snapshot)?;
    info!(level = %snapshot.level_id, path = %path.display(), "snapshot saved");
    Ok(())
}

/// Read a snapshot and check its format version
pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Snapshot, SaveError> {
    let file = File::open(path).map_err(|_| SaveError::NotFound)?;
    let reader = BufReader::new(file);
    let snapshot: Snapshot = serde_json::from_reader(reader)?;

    if snapshot.version != SNAPSHOT_VERSION {
        return Err(SaveError::IncompatibleVersion {
            expected: SNAPSHOT_VERSION,
            found: snapshot.version,
        });
    }
    Ok(snapshot)
}

/// Read a snapshot and check that it belongs to `level`
pub fn load_snapshot_for(level: &Level, path: impl AsRef<Path>) -> Result<Snapshot, SaveError> {
    let snapshot = load_snapshot(path)?;
    snapshot.validate(level)?;
    Ok(snapshot)
}

/// Check if a snapshot file exists
pub fn snapshot_exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().exists()
}

/// Delete a snapshot file
pub fn delete_snapshot(path: impl AsRef<Path>) -> Result<(), SaveError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(SaveError::NotFound),
        Err(e) => Err(e.into()),
    }
}

/// Directory holding one snapshot per level
pub fn default_snapshot_dir() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("learnquest");
    path.push("progress");
    path
}

/// Snapshot file for a level inside `dir`
pub fn snapshot_path(dir: impl AsRef<Path>, level_id: &str) -> PathBuf {
    dir.as_ref().join(format!("{}.json", level_id))
}

/// Get the default snapshot path for a level
pub fn default_snapshot_path(level_id: &str) -> PathBuf {
    snapshot_path(default_snapshot_dir(), level_id)
}

/// List the readable snapshots in `dir`, newest first
pub fn list_snapshots_in(dir: impl AsRef<Path>) -> Result<Vec<(PathBuf, Snapshot)>, SaveError> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut snapshots = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_none_or(|e| e != "json") {
            continue;
        }
        match load_snapshot(&path) {
            Ok(snapshot) => snapshots.push((path, snapshot)),
            Err(err) => warn!(path = %path.display(), error = %err, "skipping unreadable snapshot"),
        }
    }
    debug!(dir = %dir.display(), count = snapshots.len(), "snapshots listed");

    // RFC 3339 UTC stamps sort lexically
    snapshots.sort_by(|a, b| b.1.saved_at.cmp(&a.1.saved_at));
    Ok(snapshots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lq_core::WorldState;

    fn level() -> Level {
        Level::from_json(
            r#"{
            "id": "save-test",
            "board": { "w": 4, "h": 4 },
            "spawn": { "hero": { "x": 1, "y": 1 } },
            "pois": [],
            "allowed": ["hero.moveUp"],
            "goals": []
        }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join("learnquest_test_save.json");
        let level = level();
        let mut state = WorldState::new(&level);
        state.hero.y = 0;
        state.vars.insert("msg".to_string(), "hi".to_string());

        let snapshot = Snapshot::capture(&level.id, &state, "hero.moveUp()");
        save_snapshot(&snapshot, &path).unwrap();
        assert!(snapshot_exists(&path));

        let loaded = load_snapshot_for(&level, &path).unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.hydrate(&level).hero, state.hero);

        delete_snapshot(&path).unwrap();
        assert!(!snapshot_exists(&path));
    }

    #[test]
    fn test_incompatible_version() {
        let path = std::env::temp_dir().join("learnquest_test_version.json");
        std::fs::write(&path, r#"{ "v": 2, "levelId": "save-test" }"#).unwrap();
        assert!(matches!(
            load_snapshot(&path),
            Err(SaveError::IncompatibleVersion { expected: 1, found: 2 })
        ));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_version_reads_as_current() {
        let path = std::env::temp_dir().join("learnquest_test_unversioned.json");
        std::fs::write(
            &path,
            r#"{ "levelId": "save-test", "state": { "hero": { "x": 3, "y": 0 }, "vars": null } }"#,
        )
        .unwrap();
        let level = level();
        let loaded = load_snapshot_for(&level, &path).unwrap();
        assert_eq!(loaded.version, SNAPSHOT_VERSION);
        let state = loaded.hydrate(&level);
        assert_eq!((state.hero.x, state.hero.y), (3, 0));
        assert!(state.vars.is_empty());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_wrong_level() {
        let path = std::env::temp_dir().join("learnquest_test_wrong_level.json");
        std::fs::write(&path, r#"{ "v": 1, "levelId": "other" }"#).unwrap();
        assert!(matches!(
            load_snapshot_for(&level(), &path),
            Err(SaveError::WrongLevel { found, .. }) if found == "other"
        ));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_nonexistent() {
        let result = load_snapshot("/nonexistent/path/progress.json");
        assert!(matches!(result, Err(SaveError::NotFound)));
        assert!(matches!(
            delete_snapshot("/nonexistent/path/progress.json"),
            Err(SaveError::NotFound)
        ));
    }

    #[test]
    fn test_default_path() {
        let path = default_snapshot_path("strings-01");
        assert!(path.ends_with("learnquest/progress/strings-01.json"));
    }
}
