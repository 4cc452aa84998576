//! Core error types for ARBOR.

use std::fmt;

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Token-level failure while decoding a log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Timestamp does not match `yyyy/MM/dd-HH:mm:ss,SSS`
    InvalidTimestamp {
        /// Offending token
        raw: String,
        /// Underlying parser message
        reason: String,
    },

    /// Token is not a dotted-decimal IPv4 literal
    InvalidAddress {
        /// Offending token
        raw: String,
    },

    /// Enum literal not known for this field
    UnknownLiteral {
        /// Field being decoded
        field: &'static str,
        /// Offending literal
        literal: String,
    },

    /// List token is not bracket-delimited
    MalformedList {
        /// Offending token
        raw: String,
    },

    /// Numeric token could not be parsed
    InvalidNumber {
        /// Offending token
        raw: String,
    },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTimestamp { raw, reason } => {
                write!(f, "Invalid timestamp {:?}: {}", raw, reason)
            }
            Self::InvalidAddress { raw } => write!(f, "Invalid IPv4 address: {:?}", raw),
            Self::UnknownLiteral { field, literal } => {
                write!(f, "Unknown {} literal: {:?}", field, literal)
            }
            Self::MalformedList { raw } => write!(f, "Malformed list: {:?}", raw),
            Self::InvalidNumber { raw } => write!(f, "Invalid number: {:?}", raw),
        }
    }
}

impl std::error::Error for CoreError {}
