use serde::{Deserialize, Serialize};

/// Persisted engine preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Older builds wrote this flag as `enabledEffects`.
    #[serde(rename = "eventsEnabled", alias = "enabledEffects")]
    pub events_enabled: bool,
}

impl EngineSettings {
    pub fn new(events_enabled: bool) -> Self {
        Self { events_enabled }
    }
}
