use thiserror::Error;

#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("unknown role: {0}")]
    UnknownRole(String),
    #[error("invalid tool pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("invalid regex '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid role definition: {0}")]
    Invalid(String),
    #[error("io error: {0}")]
    Io(String),
}
