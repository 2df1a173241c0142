use thiserror::Error;

/// Infrastructure failures of the harness itself.
///
/// Faults raised by candidate code are not errors; they travel as
/// [`crate::fault::Fault`] values and end up in the report.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("reference '{name}' failed: {reason}")]
    Reference { name: String, reason: String },

    #[error("failed to start runner '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("runner protocol violation: {0}")]
    Protocol(String),

    #[error("invalid checker definition: {0}")]
    Checker(String),

    #[error("language config error: {0}")]
    Config(String),

    #[error("language '{0}' is not configured")]
    UnknownLanguage(String),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HarnessError>;
