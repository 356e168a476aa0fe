pub mod error;
pub mod model;
pub mod store;

pub use error::PersistenceError;
pub use model::EngineSettings;
pub use store::json_file::JsonFileSettingsStore;
pub use store::sqlite_store::SqliteSettingsStore;
pub use store::{SettingsStore, load_enabled, open_store};
