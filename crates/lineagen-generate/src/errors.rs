use thiserror::Error;

/// Errors emitted by the synthesis engine and its exporters.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("state error: {0}")]
    State(String),
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("xml error: {0}")]
    Xml(String),
}

impl From<lineagen_core::Error> for GenerationError {
    fn from(err: lineagen_core::Error) -> Self {
        match err {
            lineagen_core::Error::Configuration(message) => GenerationError::Configuration(message),
            lineagen_core::Error::State(message) => GenerationError::State(message),
            lineagen_core::Error::UnsupportedFormat(message) => {
                GenerationError::UnsupportedFormat(message)
            }
        }
    }
}
