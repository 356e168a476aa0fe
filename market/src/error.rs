use thiserror::Error;

/// A snapshot that cannot be run through the detection rules.
///
/// Scoped to one ticker: the rest of the batch is still processed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectionError {
    #[error("snapshot has no ticker")]
    MissingTicker,

    #[error("{ticker}: invalid price {price}")]
    InvalidPrice { ticker: String, price: f64 },

    #[error("{ticker}: invalid percent change {percent_change}")]
    InvalidPercentChange { ticker: String, percent_change: f64 },

    #[error("{ticker}: malformed snapshot: {reason}")]
    Malformed { ticker: String, reason: String },
}

impl DetectionError {
    pub fn ticker(&self) -> Option<&str> {
        match self {
            DetectionError::MissingTicker => None,
            DetectionError::InvalidPrice { ticker, .. }
            | DetectionError::InvalidPercentChange { ticker, .. }
            | DetectionError::Malformed { ticker, .. } => Some(ticker),
        }
    }
}

/// A transport message that could not be normalised into the internal model.
#[derive(Error, Debug)]
pub enum WireError {
    #[error("malformed message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{event_type}: missing field `{field}`")]
    MissingField {
        event_type: &'static str,
        field: &'static str,
    },

    #[error("unknown event type `{0}`")]
    UnknownEventType(String),
}

/// Feed interruptions. The engine holds its last known state until the
/// feed resumes.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid payload: {0}")]
    Payload(#[from] serde_json::Error),
}
