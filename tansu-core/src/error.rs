//! # Error Handling
//!
//! Error types shared by all TansuDB components.
//!
//! Errors carry their context as strings so they stay `Clone`: the table
//! builder latches the first error it sees and hands out copies of it from
//! every subsequent call. Contract violations (out-of-order keys, use after
//! finish) are not errors; they are asserted.

use thiserror::Error;

/// Result type alias for TansuDB operations
pub type Result<T> = std::result::Result<T, Error>;

/// Primary error type for TansuDB
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("io error: {message}")]
    Io { message: String },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Reserved for readers; the write path never produces it.
    #[error("corruption: {message}")]
    Corruption { message: String },

    /// Reserved; an unavailable compressor downgrades silently instead.
    #[error("not supported: {message}")]
    NotSupported { message: String },
}

impl Error {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn corruption(message: impl Into<String>) -> Self {
        Error::Corruption {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            message: err.to_string(),
        }
    }
}
