use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::defs::TrackingStore;

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("state file {path} is malformed: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error on state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to move new state into {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },
}

pub type Result<T> = std::result::Result<T, StateError>;

/// Upper bound for any day-count window (retention, lookback): 100 years.
pub const MAX_WINDOW_DAYS: i64 = 36_500;

/// `days` as a `Duration` when it lies within `0..=MAX_WINDOW_DAYS`.
pub fn window_days(days: i64) -> Option<Duration> {
    (0..=MAX_WINDOW_DAYS).contains(&days).then(|| Duration::days(days))
}

/// JSON-backed persistence for the [`TrackingStore`].
///
/// A run loads the store once, mutates it in memory and saves it once. The
/// file must not be shared by two runs at the same time; nothing here locks it.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load persisted state, or start empty when no file exists yet.
    ///
    /// A file that exists but does not parse is an error: starting fresh
    /// would re-announce every item we have already reported.
    pub fn load(&self) -> Result<TrackingStore> {
        self.load_at(Utc::now())
    }

    pub fn load_at(&self, now: DateTime<Utc>) -> Result<TrackingStore> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No state file at {}, starting fresh", self.path.display());
                return Ok(TrackingStore::empty(now));
            }
            Err(e) => {
                return Err(StateError::Io {
                    path: self.path.clone(),
                    source: e,
                });
            }
        };

        let store: TrackingStore = serde_json::from_slice(&bytes).map_err(|e| StateError::Corrupt {
            path: self.path.clone(),
            source: e,
        })?;

        info!("Loaded state with {} tracked items (last check {})", store.len(), store.last_check);
        Ok(store)
    }

    /// Write the whole store through a sibling temp file and rename it into
    /// place, so a crash leaves either the old or the new file.
    pub fn save(&self, store: &TrackingStore) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| self.io_error(e))?;

        let mut encoded = serde_json::to_vec_pretty(store)?;
        encoded.push(b'\n');

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| self.io_error(e))?;
        tmp.write_all(&encoded).map_err(|e| self.io_error(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| StateError::Persist {
            path: self.path.clone(),
            source: e,
        })?;

        info!("Saved state with {} tracked items to {}", store.len(), self.path.display());
        Ok(())
    }

    /// Delete the state file. Returns whether there was one.
    pub fn reset(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                warn!("Removed state file {}", self.path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn io_error(&self, source: std::io::Error) -> StateError {
        StateError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Drop records not observed within `retention` of `now`.
///
/// A record exactly at the edge of the window is kept. A window reaching
/// past the earliest representable instant keeps everything.
pub fn cleanup(store: &mut TrackingStore, retention: Duration, now: DateTime<Utc>) -> usize {
    let Some(cutoff) = now.checked_sub_signed(retention) else {
        debug!("Retention window {} exceeds the calendar, nothing expires", retention);
        return 0;
    };
    let before = store.items.len();
    store.items.retain(|item_id, record| {
        let keep = record.last_seen >= cutoff;
        if !keep {
            debug!("Expiring {} (last seen {})", item_id, record.last_seen);
        }
        keep
    });
    let removed = before - store.items.len();
    if removed > 0 {
        info!("Retention cleanup removed {} records older than {}", removed, cutoff);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defs::{Item, SeenRecord, SourceKind};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, day, 12, 0, 0).unwrap()
    }

    fn sample_store() -> TrackingStore {
        let mut store = TrackingStore::empty(at(2));
        let bill = Item::new("hr1-119", SourceKind::Legislation, "Flood Insurance Act", at(1)).with_status("introduced");
        let doc = Item::new("FR-2026-00123", SourceKind::Regulation, "Floodplain Standard", at(2));
        for item in [bill, doc] {
            store.items.insert(item.item_id.clone(), SeenRecord::first_observation(&item));
        }
        store
    }

    #[test]
    fn missing_file_loads_empty_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = StateStore::new(dir.path().join("state.json"));

        let store = state.load_at(at(5)).unwrap();

        assert!(store.is_empty());
        assert_eq!(store.last_check, at(5));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ \"last_check\": ").unwrap();

        let err = StateStore::new(&path).load().unwrap_err();

        assert!(matches!(err, StateError::Corrupt { .. }));
    }

    #[test]
    fn empty_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "").unwrap();

        assert!(matches!(StateStore::new(&path).load(), Err(StateError::Corrupt { .. })));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = StateStore::new(dir.path().join("nested").join("state.json"));
        let store = sample_store();

        state.save(&store).unwrap();
        let loaded = state.load().unwrap();

        assert_eq!(loaded, store);
    }

    #[test]
    fn resaving_unmodified_store_is_byte_identical() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = StateStore::new(dir.path().join("state.json"));
        state.save(&sample_store()).unwrap();
        let first = fs::read(state.path()).unwrap();

        let loaded = state.load().unwrap();
        state.save(&loaded).unwrap();
        let second = fs::read(state.path()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn save_leaves_no_temp_files_behind() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = StateStore::new(dir.path().join("state.json"));
        state.save(&sample_store()).unwrap();
        state.save(&sample_store()).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn reset_removes_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = StateStore::new(dir.path().join("state.json"));
        assert!(!state.reset().unwrap());

        state.save(&sample_store()).unwrap();
        assert!(state.reset().unwrap());
        assert!(!state.path().exists());
    }

    #[test]
    fn cleanup_honours_retention_window() {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let mut store = TrackingStore::empty(now);
        for (id, age_days) in [("old", 91), ("recent", 89), ("edge", 90)] {
            let seen = now - Duration::days(age_days);
            let item = Item::new(id, SourceKind::Disaster, id, seen);
            store.items.insert(id.to_string(), SeenRecord::first_observation(&item));
        }

        let removed = cleanup(&mut store, Duration::days(90), now);

        assert_eq!(removed, 1);
        assert!(store.get("old").is_none());
        assert!(store.get("recent").is_some());
        assert!(store.get("edge").is_some());
    }

    #[test]
    fn oversized_retention_keeps_everything() {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let mut store = sample_store();
        let before = store.len();

        let removed = cleanup(&mut store, Duration::days(100_000_000), now);

        assert_eq!(removed, 0);
        assert_eq!(store.len(), before);
    }

    #[test]
    fn window_days_rejects_out_of_range_counts() {
        assert_eq!(window_days(90), Some(Duration::days(90)));
        assert_eq!(window_days(0), Some(Duration::zero()));
        assert_eq!(window_days(-1), None);
        assert_eq!(window_days(MAX_WINDOW_DAYS + 1), None);
        assert_eq!(window_days(200_000_000_000), None);
    }
}
