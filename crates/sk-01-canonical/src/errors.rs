//! Canonical-encoding error types.

use thiserror::Error;

/// Failures while normalizing or encoding a value tree.
///
/// `path` is a JSON pointer (`/a/0/b`) into the rejected input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CanonicalError {
    /// NaN or ±∞ cannot be encoded.
    #[error("Number at {path} is not finite")]
    NumberNotFinite {
        /// Location of the rejected number.
        path: String,
    },

    /// Negative zero is disallowed (it is indistinguishable from zero after
    /// a parse round-trip).
    #[error("Negative zero at {path} is disallowed")]
    NegativeZero {
        /// Location of the rejected number.
        path: String,
    },

    /// Value nests deeper than [`crate::MAX_DEPTH`].
    #[error("Value at {path} exceeds maximum nesting depth")]
    DepthExceeded {
        /// Location where the depth limit was hit.
        path: String,
    },

    /// A map carried a key outside the allowed set.
    #[error("Unknown key \"{key}\" at {path}")]
    UnknownKey {
        /// Location of the map.
        path: String,
        /// The offending key.
        key: String,
    },

    /// A required key was absent.
    #[error("Missing key \"{key}\" at {path}")]
    MissingKey {
        /// Location of the map.
        path: String,
        /// The missing key.
        key: String,
    },

    /// A map was required at this location.
    #[error("Expected an object at {path}")]
    NotAnObject {
        /// Location of the non-object value.
        path: String,
    },
}

impl CanonicalError {
    /// Stable wire code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            CanonicalError::NumberNotFinite { .. } => "NUMBER_NOT_FINITE",
            CanonicalError::NegativeZero { .. } => "NEGATIVE_ZERO_DISALLOWED",
            CanonicalError::DepthExceeded { .. }
            | CanonicalError::UnknownKey { .. }
            | CanonicalError::MissingKey { .. }
            | CanonicalError::NotAnObject { .. } => "SCHEMA_INVALID",
        }
    }

    /// JSON-pointer path of the offending value.
    pub fn path(&self) -> &str {
        match self {
            CanonicalError::NumberNotFinite { path }
            | CanonicalError::NegativeZero { path }
            | CanonicalError::DepthExceeded { path }
            | CanonicalError::UnknownKey { path, .. }
            | CanonicalError::MissingKey { path, .. }
            | CanonicalError::NotAnObject { path } => path,
        }
    }
}
