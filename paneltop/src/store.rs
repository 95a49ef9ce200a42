//! Keyed persisted UI state (e.g. `"<server>:command_history"`).
//! Stored as one JSON object under the config dir: $XDG_CONFIG_HOME/paneltop/state.json

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::profiles::config_dir;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode value: {0}")]
    Encode(#[from] serde_json::Error),
}

pub fn state_path() -> PathBuf {
    config_dir().join("state.json")
}

pub fn history_key(server: &str) -> String {
    format!("{server}:command_history")
}

#[derive(Debug)]
pub struct KeyedStore {
    path: PathBuf,
    values: BTreeMap<String, Value>,
}

impl KeyedStore {
    /// Open the store at `path`. A missing or corrupt file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable state file");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self { path, values }
    }

    pub fn open_default() -> Self {
        Self::open(state_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Value under `key`, or `None` if absent or of another shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let v = self.values.get(key)?;
        serde_json::from_value(v.clone()).ok()
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), serde_json::to_value(value)?);
        self.save()
    }

    fn save(&self) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let data = serde_json::to_vec_pretty(&self.values)?;
        fs::write(&self.path, data).map_err(io_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_disk() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("nested").join("state.json");
        let mut s = KeyedStore::open(&path);
        let key = history_key("abc123");
        s.set(&key, &vec!["restart".to_string(), "status".to_string()])
            .unwrap();

        let reopened = KeyedStore::open(&path);
        let got: Vec<String> = reopened.get(&key).unwrap();
        assert_eq!(got, vec!["restart", "status"]);
        assert_eq!(reopened.get::<Vec<String>>("other"), None);
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("state.json");
        fs::write(&path, b"{oops").unwrap();
        let s = KeyedStore::open(&path);
        assert_eq!(s.get::<Vec<String>>("x"), None);
    }

    #[test]
    fn history_key_is_server_scoped() {
        assert_eq!(history_key("srv"), "srv:command_history");
    }
}
