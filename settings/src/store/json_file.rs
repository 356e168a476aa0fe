//! Settings kept under one key of a JSON object file.
//!
//! The file may be shared with other preferences; keys other than ours are
//! preserved on save.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::fs;
use tracing::{debug, instrument, warn};

use super::SettingsStore;
use crate::error::PersistenceError;
use crate::model::EngineSettings;

pub struct JsonFileSettingsStore {
    path: PathBuf,
    key: String,
}

impl JsonFileSettingsStore {
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_root(&self) -> Result<Option<Map<String, Value>>, PersistenceError> {
        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<Value>(&text)? {
            Value::Object(map) => Ok(Some(map)),
            _ => Err(PersistenceError::NotAnObject),
        }
    }
}

#[async_trait]
impl SettingsStore for JsonFileSettingsStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> Result<Option<EngineSettings>, PersistenceError> {
        let Some(root) = self.read_root().await? else {
            debug!("settings file not found");
            return Ok(None);
        };

        match root.get(&self.key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn save(&self, settings: &EngineSettings) -> Result<(), PersistenceError> {
        let mut root = match self.read_root().await {
            Ok(root) => root.unwrap_or_default(),
            Err(err) => {
                warn!(error = %err, "existing settings file unreadable, overwriting");
                Map::new()
            }
        };
        root.insert(self.key.clone(), serde_json::to_value(settings)?);

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&Value::Object(root))?).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
