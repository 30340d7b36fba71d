use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

/// Neutral mood assumed when no history exists yet.
const DEFAULT_MOOD: f64 = 50.0;

#[derive(Debug, Serialize, Deserialize)]
struct HistoryFile {
    last_mood: f64,
    /// Epoch seconds of the cycle that wrote this value.
    updated_at: i64,
}

/// The previous cycle's mood index, persisted as a small JSON file so the
/// trend survives restarts.
///
/// Reads never fail: a missing or unreadable file yields the neutral
/// default, so the first cycle after a wipe reports a flat trend instead
/// of aborting.
pub struct MoodHistory {
    path: PathBuf,
}

impl MoodHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> f64 {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return DEFAULT_MOOD,
        };
        match serde_json::from_str::<HistoryFile>(&raw) {
            Ok(file) => file.last_mood,
            Err(e) => {
                warn!(path = %self.path.display(), "mood history unreadable, using default: {e}");
                DEFAULT_MOOD
            }
        }
    }

    pub fn save(&self, mood: f64, updated_at: i64) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = HistoryFile {
            last_mood: mood,
            updated_at,
        };
        fs::write(&self.path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_the_neutral_default() {
        let dir = tempfile::tempdir().unwrap();
        let history = MoodHistory::new(dir.path().join("mood.json"));
        assert_eq!(history.load(), 50.0);
    }

    #[test]
    fn corrupt_file_yields_the_neutral_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mood.json");
        fs::write(&path, "not json at all").unwrap();

        let history = MoodHistory::new(&path);
        assert_eq!(history.load(), 50.0);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let history = MoodHistory::new(dir.path().join("mood.json"));

        history.save(67.3, 1_700_000_000).unwrap();
        assert_eq!(history.load(), 67.3);

        history.save(41.0, 1_700_000_060).unwrap();
        assert_eq!(history.load(), 41.0);
    }

    #[test]
    fn save_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let history = MoodHistory::new(dir.path().join("data/state/mood.json"));

        history.save(55.0, 1_700_000_000).unwrap();
        assert_eq!(history.load(), 55.0);
    }
}
