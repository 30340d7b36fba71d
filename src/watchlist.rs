use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Source of the user's watched stock codes, used by the anomaly scan's
/// watchlist filter.
pub trait WatchlistLookup: Send + Sync {
    fn codes(&self) -> HashSet<String>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Watchlist backed by a JSON array of entries on disk.
///
/// The file is re-read on every lookup so external edits take effect on the
/// next scan without a restart. Missing or unreadable files act as an empty
/// watchlist.
pub struct FileWatchlist {
    path: PathBuf,
}

impl FileWatchlist {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn entries(&self) -> Vec<WatchlistEntry> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.path.display(), "watchlist unreadable, treating as empty: {e}");
                Vec::new()
            }
        }
    }
}

impl WatchlistLookup for FileWatchlist {
    fn codes(&self) -> HashSet<String> {
        self.entries().into_iter().map(|e| e.code).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
