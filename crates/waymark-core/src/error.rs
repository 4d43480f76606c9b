//! Error types for the Waymark core.

use thiserror::Error;

/// Core errors that can occur during policy and encoding operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}
