//! Error types for address parsing.

use thiserror::Error;

/// Errors produced while parsing an address string.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The input was empty or all whitespace
    #[error("empty address")]
    Empty,

    /// A segment was not a valid identifier
    #[error("invalid identifier {ident:?} in address {input:?}")]
    InvalidIdentifier {
        /// The offending segment
        ident: String,
        /// The full input being parsed
        input: String,
    },

    /// An instance key was malformed (unterminated bracket, bad index)
    #[error("invalid instance key in address {input:?}: {message}")]
    InvalidKey {
        /// The full input being parsed
        input: String,
        /// What was wrong with the key
        message: String,
    },

    /// The address had too few or too many segments for its kind
    #[error("malformed address {input:?}: {message}")]
    Malformed {
        /// The full input being parsed
        input: String,
        /// What was wrong with the shape
        message: String,
    },

    /// An unknown phase qualifier followed `#`
    #[error("unknown phase {phase:?} in address {input:?}")]
    UnknownPhase {
        /// The phase string after `#`
        phase: String,
        /// The full input being parsed
        input: String,
    },
}

/// Result type for address operations.
pub type Result<T> = std::result::Result<T, ParseError>;
