use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("settings io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings are not valid json: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("settings database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("settings file root is not a json object")]
    NotAnObject,
}
