//! Error types for ofswitch

use thiserror::Error;

/// Result type alias for ofswitch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ofswitch
///
/// Codec errors (`OutOfBounds`, `MalformedFrame`) are always returned to the
/// immediate caller. An unknown discriminator while decoding a frame stack is
/// not an error, and neither is a stale FIB timer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An access or requested length exceeds the buffer extent
    #[error("out of bounds: offset {offset} + length {len} exceeds {available} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        available: usize,
    },

    /// Declared length or discriminator is inconsistent with the actual bytes
    #[error("malformed {protocol} frame: {reason}")]
    MalformedFrame {
        protocol: &'static str,
        reason: String,
    },

    /// Packet construction error (invalid layer chain, oversized payload, ...)
    #[error("Packet construction error: {0}")]
    PacketConstruction(String),

    /// Hardware address not usable as a FIB key
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Invalid parameter error
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Datapath facade failure
    #[error("Datapath error: {0}")]
    Datapath(String),

    /// A service channel was closed before the request completed
    #[error("Channel closed: {0}")]
    ChannelClosed(String),
}

impl Error {
    /// Create an out-of-bounds error
    pub fn out_of_bounds(offset: usize, len: usize, available: usize) -> Self {
        Error::OutOfBounds {
            offset,
            len,
            available,
        }
    }

    /// Create a malformed frame error for `protocol`
    pub fn malformed<S: Into<String>>(protocol: &'static str, reason: S) -> Self {
        Error::MalformedFrame {
            protocol,
            reason: reason.into(),
        }
    }

    /// Create a packet construction error with a custom message
    pub fn construction<S: Into<String>>(msg: S) -> Self {
        Error::PacketConstruction(msg.into())
    }

    /// Create a datapath error with a custom message
    pub fn datapath<S: Into<String>>(msg: S) -> Self {
        Error::Datapath(msg.into())
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter<S: Into<String>>(name: S, reason: S) -> Self {
        Error::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// True for the two codec-level failures
    pub fn is_codec_error(&self) -> bool {
        matches!(self, Error::OutOfBounds { .. } | Error::MalformedFrame { .. })
    }
}
