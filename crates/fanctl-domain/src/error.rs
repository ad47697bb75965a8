use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Malformed telemetry payload: {0}")]
    MalformedPayload(String),

    #[error("Missing message attribute: {0}")]
    MissingAttribute(String),

    #[error("Config update failed: {0}")]
    ConfigError(#[from] anyhow::Error),
}
