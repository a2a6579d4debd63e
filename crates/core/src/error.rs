use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Option {field} out of range [{min}, {max}]: {value}")]
    OptionOutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
        value: i64,
    },

    #[error("Validation error: {0}")]
    Validation(String),
}
