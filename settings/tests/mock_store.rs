use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use settings::{EngineSettings, PersistenceError, SettingsStore};

/// Keeps the last saved settings in memory and counts saves.
#[derive(Default, Clone)]
pub struct InMemorySettingsStore {
    pub value: Arc<Mutex<Option<EngineSettings>>>,
    pub saves: Arc<Mutex<u32>>,
}

#[allow(dead_code)]
impl InMemorySettingsStore {
    pub fn with(enabled: bool) -> Self {
        Self {
            value: Arc::new(Mutex::new(Some(EngineSettings::new(enabled)))),
            saves: Arc::default(),
        }
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn load(&self) -> Result<Option<EngineSettings>, PersistenceError> {
        Ok(*self.value.lock().await)
    }

    async fn save(&self, settings: &EngineSettings) -> Result<(), PersistenceError> {
        *self.value.lock().await = Some(*settings);
        *self.saves.lock().await += 1;
        Ok(())
    }
}
