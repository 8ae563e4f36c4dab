//! Error types for lfring.
//!
//! Only construction can fail with an error. Full, empty and lost-race
//! outcomes of `offer`/`poll` are ordinary return values.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LfringError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LfringError {
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Unknown buffer type: {tag:?}")]
    UnknownBufferType { tag: String },
}

impl LfringError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig { message: message.into() }
    }

    pub fn unknown_buffer_type(tag: impl Into<String>) -> Self {
        Self::UnknownBufferType { tag: tag.into() }
    }
}
