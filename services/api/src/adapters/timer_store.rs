//! services/api/src/adapters/timer_store.rs
//!
//! Implements the `TimerStorage` port with one small JSON file per key inside
//! a directory. Each write lands in a uniquely named temp file in the same
//! directory and is then renamed over the entry, so concurrent writers never
//! see a half-written file and the last rename wins.

use bookflow_core::ports::{PortError, PortResult, TimerStorage};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct FileTimerStorage {
    dir: PathBuf,
}

impl FileTimerStorage {
    /// Creates the directory if it does not exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }
}

fn storage_error(e: std::io::Error) -> PortError {
    PortError::Storage(e.to_string())
}

impl TimerStorage for FileTimerStorage {
    fn load(&self, key: &str) -> PortResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error(e)),
        }
    }

    fn save(&self, key: &str, value: &str) -> PortResult<()> {
        let path = self.path_for(key);
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(storage_error)?;
        tmp.write_all(value.as_bytes()).map_err(storage_error)?;
        tmp.as_file().sync_all().map_err(storage_error)?;
        tmp.persist(&path).map_err(|e| storage_error(e.error))?;
        debug!("Timer state written to {}", path.display());
        Ok(())
    }

    fn clear(&self, key: &str) -> PortResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(e)),
        }
    }
}
