use crate::error::PersistenceError;
use crate::state::TimerState;
use directories::ProjectDirs;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Durable slot holding a single serialized [`TimerState`].
pub trait TimerStore: Send {
    /// `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> Result<Option<TimerState>, PersistenceError>;
    fn save(&mut self, state: &TimerState) -> Result<(), PersistenceError>;
}

/// One JSON file per storage key.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store for `key` inside `data_dir`.
    pub fn in_dir(data_dir: &Path, key: &str) -> Self {
        Self::new(data_dir.join(format!("{key}.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TimerStore for FileStore {
    fn load(&self) -> Result<Option<TimerState>, PersistenceError> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(PersistenceError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let state: TimerState = serde_json::from_str(&json)?;
        Ok(Some(state))
    }

    fn save(&mut self, state: &TimerState) -> Result<(), PersistenceError> {
        let write_err = |source| PersistenceError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let json = serde_json::to_string_pretty(state).map_err(PersistenceError::Encode)?;
        // Write beside the target and rename so a crash never leaves half a record.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)?;
        Ok(())
    }
}

/// In-process slot. Clones share the same record, which lets tests simulate
/// a restart by handing a clone to a fresh engine.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<Option<String>>>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose writes always fail, as if storage were full.
    #[cfg(test)]
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    /// Raw stored text, if any.
    pub fn raw(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }

    /// Replace the stored text verbatim.
    #[cfg(test)]
    pub fn put_raw(&self, json: impl Into<String>) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(json.into());
        }
    }
}

impl TimerStore for MemoryStore {
    fn load(&self) -> Result<Option<TimerState>, PersistenceError> {
        match self.raw() {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn save(&mut self, state: &TimerState) -> Result<(), PersistenceError> {
        if self.fail_writes {
            return Err(PersistenceError::Unavailable("memory quota exceeded".to_string()));
        }
        let json = serde_json::to_string(state).map_err(PersistenceError::Encode)?;
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| PersistenceError::Unavailable("memory slot poisoned".to_string()))?;
        *slot = Some(json);
        Ok(())
    }
}

/// Storage key for a profile. Without a profile every user of this machine
/// account shares the base key.
pub fn storage_key(base: &str, profile: Option<&str>) -> String {
    let sanitized: Option<String> = profile
        .map(|p| {
            p.chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
                .collect()
        })
        .filter(|p: &String| !p.is_empty());

    match sanitized {
        Some(profile) => format!("{base}.{profile}"),
        None => base.to_string(),
    }
}

/// Platform data directory for focus.
pub fn default_data_dir() -> Result<PathBuf, PersistenceError> {
    let proj_dirs = ProjectDirs::from("com", "onboarding", "Focus").ok_or_else(|| {
        PersistenceError::Unavailable("could not determine data directory".to_string())
    })?;
    Ok(proj_dirs.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_state() -> TimerState {
        TimerState {
            is_running: true,
            started_at_epoch_ms: Some(1_000),
            last_persisted_at_epoch_ms: Some(4_000),
            last_persisted_remaining_seconds: Some(1497),
            run_budget_seconds: Some(1500),
            ..TimerState::idle(1497)
        }
    }

    #[test]
    fn file_store_round_trips_and_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::in_dir(&dir.path().join("nested"), "focus-timer");

        assert!(store.load().unwrap().is_none());
        store.save(&running_state()).unwrap();

        assert_eq!(store.load().unwrap(), Some(running_state()));
        assert!(store.path().ends_with("nested/focus-timer.json"));
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn file_store_reports_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::in_dir(dir.path(), "focus-timer");
        fs::write(store.path(), "{\"timeRemainingSeconds\": ").unwrap();

        assert!(matches!(
            store.load(),
            Err(PersistenceError::ReadCorruption(_))
        ));
    }

    #[test]
    fn file_store_write_failure_is_typed() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();
        let mut store = FileStore::in_dir(&blocker, "focus-timer");

        assert!(matches!(
            store.save(&TimerState::idle(1500)),
            Err(PersistenceError::Write { .. })
        ));
    }

    #[test]
    fn encode_failures_are_not_read_corruption() {
        let source = serde_json::from_str::<u8>("x").unwrap_err();
        let err = PersistenceError::Encode(source);
        assert!(!matches!(err, PersistenceError::ReadCorruption(_)));
        assert!(err.to_string().starts_with("failed to encode timer state"));
    }

    #[test]
    fn memory_store_clones_share_slot() {
        let mut store = MemoryStore::new();
        let reader = store.clone();
        store.save(&running_state()).unwrap();
        assert_eq!(reader.load().unwrap(), Some(running_state()));
    }

    #[test]
    fn failing_memory_store_rejects_writes() {
        let mut store = MemoryStore::failing();
        assert!(store.save(&TimerState::idle(1)).is_err());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn storage_key_namespaces_profiles() {
        assert_eq!(storage_key("focus-timer", None), "focus-timer");
        assert_eq!(storage_key("focus-timer", Some("alice")), "focus-timer.alice");
        assert_eq!(
            storage_key("focus-timer", Some("../bob smith")),
            "focus-timer.bobsmith"
        );
        assert_eq!(storage_key("focus-timer", Some("///")), "focus-timer");
    }
}
