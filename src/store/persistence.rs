//! Backing storage for the reading store.
//!
//! The store keeps its authoritative state in memory; a persistence backend
//! mirrors every accepted write so the latest snapshot can be inspected from
//! disk. Persisting happens inside the store's critical section, before the
//! new state is published, so a failed write leaves the visible state as it
//! was.

use std::{
    io,
    path::{Path, PathBuf},
};

use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use super::StoreError;
use crate::readings::Reading;

#[derive(Debug, Clone, Default)]
pub enum Persistence {
    /// Nothing leaves the process.
    #[default]
    Memory,
    /// Mirror the current reading and the history into JSON files.
    JsonFiles(JsonFiles),
}

impl Persistence {
    /// Bring the backing storage to the empty state used at service start.
    pub async fn reset(&self) -> Result<(), StoreError> {
        match self {
            Self::Memory => Ok(()),
            Self::JsonFiles(files) => files.reset().await,
        }
    }

    /// Persist the state that is about to be published.
    pub async fn save(&self, current: &Reading, history: &[Reading]) -> Result<(), StoreError> {
        match self {
            Self::Memory => Ok(()),
            Self::JsonFiles(files) => files.save(current, history).await,
        }
    }
}

/// `current.json` + `history.json` inside a data directory.
///
/// Each file is replaced by writing a uniquely named temporary file next to
/// it and renaming it into place, so readers of the files never see a
/// half-written document.
#[derive(Debug, Clone)]
pub struct JsonFiles {
    dir: PathBuf,
}

impl JsonFiles {
    pub const CURRENT_FILE: &'static str = "current.json";
    pub const HISTORY_FILE: &'static str = "history.json";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn current_path(&self) -> PathBuf {
        self.dir.join(Self::CURRENT_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.join(Self::HISTORY_FILE)
    }

    async fn reset(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(StoreError::storage("creating the data directory"))?;

        self.replace(b"{}", b"[]").await?;
        debug!(dir = %self.dir.display(), "json store reset");
        Ok(())
    }

    async fn save(&self, current: &Reading, history: &[Reading]) -> Result<(), StoreError> {
        let current = serde_json::to_vec_pretty(current)
            .map_err(|e| StoreError::storage("serialising the current reading")(e.into()))?;
        let history = serde_json::to_vec_pretty(history)
            .map_err(|e| StoreError::storage("serialising the history")(e.into()))?;

        self.replace(&current, &history).await
    }

    /// Stage both documents, then move them into place. Nothing is renamed
    /// unless both temporary files were written. The previous history is
    /// set aside first and moved back if the current file cannot be
    /// replaced, so a failed write leaves both files as they were.
    async fn replace(&self, current: &[u8], history: &[u8]) -> Result<(), StoreError> {
        let current_tmp = self.temp_path(Self::CURRENT_FILE, "tmp");
        let history_tmp = self.temp_path(Self::HISTORY_FILE, "tmp");

        let staged = async {
            fs::write(&current_tmp, current).await?;
            fs::write(&history_tmp, history).await
        }
        .await;

        if let Err(e) = staged {
            discard(&current_tmp).await;
            discard(&history_tmp).await;
            return Err(StoreError::storage("staging json files")(e));
        }

        let history_path = self.history_path();
        let backup = self.temp_path(Self::HISTORY_FILE, "bak");
        let backed_up = match fs::rename(&history_path, &backup).await {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                discard(&current_tmp).await;
                discard(&history_tmp).await;
                return Err(StoreError::storage("setting aside the history file")(e));
            }
        };

        if let Err(e) = fs::rename(&history_tmp, &history_path).await {
            discard(&current_tmp).await;
            discard(&history_tmp).await;
            restore(backed_up, &backup, &history_path).await;
            return Err(StoreError::storage("replacing the history file")(e));
        }

        if let Err(e) = fs::rename(&current_tmp, self.current_path()).await {
            discard(&current_tmp).await;
            restore(backed_up, &backup, &history_path).await;
            return Err(StoreError::storage("replacing the current reading file")(e));
        }

        if backed_up {
            discard(&backup).await;
        }
        Ok(())
    }

    fn temp_path(&self, file: &str, suffix: &str) -> PathBuf {
        self.dir
            .join(format!(".{file}.{}.{suffix}", Uuid::new_v4().simple()))
    }
}

/// Put the set-aside history back, or drop the new one if there was none.
async fn restore(backed_up: bool, backup: &Path, history: &Path) {
    let restored = if backed_up {
        fs::rename(backup, history).await
    } else {
        fs::remove_file(history).await
    };
    if let Err(e) = restored {
        warn!(path = %history.display(), error = %e, "previous history file not restored");
    }
}

async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        debug!(path = %path.display(), error = %e, "temporary file not removed");
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::{json, Value};

    use super::*;
    use crate::readings::parse_fields;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("air-station-persistence-{}", Uuid::new_v4()))
    }

    async fn read_json(path: PathBuf) -> Value {
        serde_json::from_slice(&fs::read(path).await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn reset_creates_empty_documents() {
        let files = JsonFiles::new(temp_dir());
        Persistence::JsonFiles(files.clone()).reset().await.unwrap();

        assert_eq!(read_json(files.current_path()).await, json!({}));
        assert_eq!(read_json(files.history_path()).await, json!([]));

        fs::remove_dir_all(files.dir()).await.unwrap();
    }

    #[tokio::test]
    async fn save_writes_current_and_history() {
        let files = JsonFiles::new(temp_dir());
        let persistence = Persistence::JsonFiles(files.clone());
        persistence.reset().await.unwrap();

        let reading = Reading::stamped(parse_fields(br#"{"co": 1.0}"#).unwrap(), Utc::now());
        persistence
            .save(&reading, std::slice::from_ref(&reading))
            .await
            .unwrap();

        let current = read_json(files.current_path()).await;
        assert_eq!(current["co"], json!(1.0));
        assert!(current["timestamp"].is_string());

        let history = read_json(files.history_path()).await;
        assert_eq!(history.as_array().unwrap().len(), 1);

        // No temporary files left behind.
        assert_eq!(file_names(files.dir()).await, vec!["current.json", "history.json"]);

        fs::remove_dir_all(files.dir()).await.unwrap();
    }

    #[tokio::test]
    async fn save_into_missing_directory_is_a_storage_fault() {
        let files = JsonFiles::new(temp_dir());
        let reading = Reading::stamped(parse_fields(b"{}").unwrap(), Utc::now());

        let err = Persistence::JsonFiles(files)
            .save(&reading, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::StorageFault { .. }));
    }

    async fn file_names(dir: &Path) -> Vec<String> {
        let mut entries = fs::read_dir(dir).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        names
    }

    #[tokio::test]
    async fn failed_current_replace_restores_previous_history() {
        let files = JsonFiles::new(temp_dir());
        let persistence = Persistence::JsonFiles(files.clone());
        persistence.reset().await.unwrap();

        let first = Reading::stamped(parse_fields(br#"{"co": 1.0}"#).unwrap(), Utc::now());
        persistence
            .save(&first, std::slice::from_ref(&first))
            .await
            .unwrap();

        // A non-empty directory where current.json should be makes the final
        // rename fail after history.json has already been replaced.
        fs::remove_file(files.current_path()).await.unwrap();
        fs::create_dir(files.current_path()).await.unwrap();
        fs::write(files.current_path().join("keep"), b"x").await.unwrap();

        let second = Reading::stamped(parse_fields(br#"{"co": 9.9}"#).unwrap(), Utc::now());
        let err = persistence
            .save(&second, &[first.clone(), second.clone()])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::StorageFault { .. }));
        assert!(err.to_string().contains("current reading file"));

        let history = read_json(files.history_path()).await;
        assert_eq!(history, serde_json::to_value([&first]).unwrap());
        assert_eq!(file_names(files.dir()).await, vec!["current.json", "history.json"]);

        fs::remove_dir_all(files.dir()).await.unwrap();
    }

    #[tokio::test]
    async fn memory_backend_never_fails() {
        let reading = Reading::stamped(parse_fields(b"{}").unwrap(), Utc::now());
        Persistence::Memory.reset().await.unwrap();
        Persistence::Memory.save(&reading, &[]).await.unwrap();
    }
}
