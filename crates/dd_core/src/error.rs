use thiserror::Error;

/// Failure of a single driver inside a chain.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("No element found for {0}")]
    NotFound(String),

    #[error("Invalid number: {0:?}")]
    InvalidNumber(String),

    #[error("No match for pattern {0:?}")]
    NoMatch(String),

    #[error("Disallowed expression: {0}")]
    DisallowedExpression(String),

    #[error("Field {0:?} has not been evaluated")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Failed to evaluate field {field:?}: {source}")]
    Evaluation {
        field: String,
        #[source]
        source: DriverError,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

impl Error {
    pub fn evaluation(field: impl Into<String>, source: DriverError) -> Self {
        Error::Evaluation {
            field: field.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
