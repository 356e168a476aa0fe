pub mod json_file;
pub mod sqlite_store;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::logger::warn_if_slow;
use tracing::{debug, info, instrument, warn};

use crate::error::PersistenceError;
use crate::model::EngineSettings;
use json_file::JsonFileSettingsStore;
use sqlite_store::SqliteSettingsStore;

/// Settings I/O above this is reported as slow.
pub const SLOW_IO: Duration = Duration::from_millis(250);

#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    async fn load(&self) -> Result<Option<EngineSettings>, PersistenceError>;
    async fn save(&self, settings: &EngineSettings) -> Result<(), PersistenceError>;
}

/// Reads the persisted flag, falling back to `default` when nothing is
/// stored or the store cannot be read. Never fails.
#[instrument(skip(store))]
pub async fn load_enabled(store: &dyn SettingsStore, default: bool) -> bool {
    match warn_if_slow("settings.load", SLOW_IO, store.load()).await {
        Ok(Some(settings)) => {
            debug!(enabled = settings.events_enabled, "loaded persisted settings");
            settings.events_enabled
        }
        Ok(None) => {
            debug!(default, "no persisted settings, using default");
            default
        }
        Err(err) => {
            warn!(error = %err, default, "failed to load settings, using default");
            default
        }
    }
}

/// Opens SQLite when a database URL is given, otherwise the JSON file at
/// `path`. A database that cannot be opened falls back to the file.
#[instrument(skip(path, key))]
pub async fn open_store(
    database_url: Option<&str>,
    path: PathBuf,
    key: String,
) -> Arc<dyn SettingsStore> {
    if let Some(url) = database_url {
        match SqliteSettingsStore::connect(url, key.clone()).await {
            Ok(store) => {
                info!("settings stored in sqlite");
                return Arc::new(store);
            }
            Err(err) => warn!(
                error = %err,
                path = %path.display(),
                "sqlite unavailable, falling back to settings file"
            ),
        }
    }

    Arc::new(JsonFileSettingsStore::new(path, key))
}
