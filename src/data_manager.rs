use crate::recovery_state::PersistedClockRecord;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

const ACTIVE_WORKOUT_FILE: &str = "active_workout.json";

#[derive(Debug, Error)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Store lock poisoned")]
    Lock,
}

pub type DataResult<T> = Result<T, DataError>;

/// Single-slot key-value persistence for the session clock record.
///
/// Only the session clock writes through this trait.
pub trait ClockStore: Send + Sync {
    fn load_record(&self) -> DataResult<Option<PersistedClockRecord>>;

    fn save_record(&self, record: &PersistedClockRecord) -> DataResult<()>;

    /// Erase the record. Erasing a missing record is not an error.
    fn clear_record(&self) -> DataResult<()>;
}

/// File-backed store rooted at the configured data directory.
#[derive(Debug, Clone)]
pub struct DataManager {
    base_dir: PathBuf,
    active_workout_path: PathBuf,
}

impl DataManager {
    pub fn new(base_dir: impl Into<PathBuf>) -> DataResult<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        let active_workout_path = base_dir.join(ACTIVE_WORKOUT_FILE);
        Ok(Self {
            base_dir,
            active_workout_path,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn active_workout_path(&self) -> &Path {
        &self.active_workout_path
    }

    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> DataResult<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)?;
        if contents.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> DataResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = path.with_extension("tmp");
        let file = fs::File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        drop(writer);

        match fs::rename(&temp_path, path) {
            Ok(()) => Ok(()),
            Err(_err) if path.exists() => {
                let _ = fs::remove_file(path);
                fs::rename(&temp_path, path).map_err(DataError::from)
            }
            Err(err) => Err(DataError::from(err)),
        }
    }
}

impl ClockStore for DataManager {
    fn load_record(&self) -> DataResult<Option<PersistedClockRecord>> {
        self.read_json(&self.active_workout_path)
    }

    fn save_record(&self, record: &PersistedClockRecord) -> DataResult<()> {
        self.write_json(&self.active_workout_path, record)
    }

    fn clear_record(&self) -> DataResult<()> {
        match fs::remove_file(&self.active_workout_path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(DataError::from(err)),
        }
    }
}

/// In-process store for hosts without a writable data directory.
#[derive(Debug, Default)]
pub struct MemoryClockStore {
    record: Mutex<Option<PersistedClockRecord>>,
}

impl MemoryClockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: PersistedClockRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
        }
    }
}

impl ClockStore for MemoryClockStore {
    fn load_record(&self) -> DataResult<Option<PersistedClockRecord>> {
        let guard = self.record.lock().map_err(|_| DataError::Lock)?;
        Ok(guard.clone())
    }

    fn save_record(&self, record: &PersistedClockRecord) -> DataResult<()> {
        let mut guard = self.record.lock().map_err(|_| DataError::Lock)?;
        *guard = Some(record.clone());
        Ok(())
    }

    fn clear_record(&self) -> DataResult<()> {
        let mut guard = self.record.lock().map_err(|_| DataError::Lock)?;
        *guard = None;
        Ok(())
    }
}
