use std::fs;
use std::io::{ErrorKind, Write};

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::Builder;

use crate::error::ReconcileError;
use crate::standings::StandingsSnapshot;

#[derive(Debug, Clone, PartialEq)]
pub enum PreviousSnapshot {
    Missing,
    Corrupt(String),
    Present(StandingsSnapshot),
}

/// The standings file on disk.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: Utf8PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl AsRef<Utf8Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Unreadable JSON is reported as `Corrupt`, not as an error, so callers
    /// can overwrite it.
    pub fn read(&self) -> Result<PreviousSnapshot, ReconcileError> {
        let content = match fs::read(self.path.as_std_path()) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(PreviousSnapshot::Missing),
            Err(err) => return Err(ReconcileError::Filesystem(err.to_string())),
        };
        match serde_json::from_slice(&content) {
            Ok(snapshot) => Ok(PreviousSnapshot::Present(snapshot)),
            Err(err) => Ok(PreviousSnapshot::Corrupt(err.to_string())),
        }
    }

    /// Writes pretty JSON into a temp file next to the target, then renames it
    /// over the target.
    pub fn write(&self, snapshot: &StandingsSnapshot) -> Result<(), ReconcileError> {
        let content = serde_json::to_vec_pretty(snapshot)
            .map_err(|err| ReconcileError::Filesystem(err.to_string()))?;
        write_bytes_atomic(&self.path, &content)
    }
}

pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), ReconcileError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| ReconcileError::Filesystem(err.to_string()))?;
    let mut temp = Builder::new()
        .prefix(".prospect-rc")
        .suffix(".tmp")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| ReconcileError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| ReconcileError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| ReconcileError::Filesystem(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    use super::*;
    use crate::standings::StandingRow;

    fn snapshot() -> StandingsSnapshot {
        StandingsSnapshot {
            updated_at: "2025-01-01T00:00:00+00:00".to_string(),
            season: "2025-26".parse().unwrap(),
            source: "nba-stats".to_string(),
            lottery: vec![StandingRow {
                team: "DET".parse().unwrap(),
                wins: 10,
                losses: 50,
            }],
            playoff: Vec::new(),
        }
    }

    fn store_in(temp: &TempDir) -> SnapshotStore {
        let path = temp.path().join("data").join("standings.json");
        let path = Utf8PathBuf::from_path_buf(path).unwrap();
        SnapshotStore::new(path)
    }

    #[test]
    fn missing_file_reads_as_missing() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        assert!(!store.exists());
        assert_matches!(store.read().unwrap(), PreviousSnapshot::Missing);
    }

    #[test]
    fn write_creates_parent_and_round_trips() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        store.write(&snapshot()).unwrap();
        assert!(store.exists());
        assert_eq!(store.read().unwrap(), PreviousSnapshot::Present(snapshot()));

        let text = fs::read_to_string(store.path().as_std_path()).unwrap();
        assert!(text.contains("\n  \"updatedAt\""));
        let leftovers = fs::read_dir(store.path().parent().unwrap().as_std_path())
            .unwrap()
            .count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn garbage_reads_as_corrupt() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        fs::create_dir_all(store.path().parent().unwrap().as_std_path()).unwrap();
        fs::write(store.path().as_std_path(), b"{ not json").unwrap();
        assert_matches!(store.read().unwrap(), PreviousSnapshot::Corrupt(_));
    }
}
