use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("config error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Suggestion(String),

    #[error("no suggestion available")]
    NoSuggestion,

    #[error("endpoint {0} needs a patient id")]
    MissingPatient(String),

    #[error("unknown screen: {0}")]
    UnknownScreen(String),

    #[error("screen {0} has no summary")]
    NoSummary(String),

    #[error("unknown field {field} on screen {screen}")]
    UnknownField { screen: String, field: String },
}

pub type Result<T> = std::result::Result<T, ContextError>;
