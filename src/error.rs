//! Error types for the streaming adapters.
//!
//! Construction reports [`Error::Configuration`]. Encode and decode failures
//! raised by the codec engine are handled inside a `work` call.

use thiserror::Error;

/// Result type alias for adapter and codec operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Invalid parameters or codec engine construction failure
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The codec engine could not encode a frame
    #[error("encode failed: {0}")]
    Encode(String),

    /// The bytes did not form a valid packet for the codec state
    #[error("decode failed: {0}")]
    Decode(String),
}

impl Error {
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Error::Configuration(msg.into())
    }

    pub fn encode<S: Into<String>>(msg: S) -> Self {
        Error::Encode(msg.into())
    }

    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Error::Decode(msg.into())
    }
}
