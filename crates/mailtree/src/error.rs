//! Error types for MIME operations.

use std::io;

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input could not be parsed into a MIME structure.
    #[error("Structural parse error at offset {offset}: {reason}")]
    Structural {
        /// Byte offset (relative to the parser start) where parsing failed.
        offset: usize,
        /// Description of what went wrong.
        reason: String,
    },

    /// A `multipart/*` entity declared no boundary parameter.
    #[error("Missing boundary in {0} entity at offset {1}")]
    MissingBoundary(String, usize),

    /// A generic header API was used for a structured address header, or an
    /// address API was used for a header that holds no addresses.
    #[error("Invalid header target {0}: {1}")]
    InvalidHeaderTarget(String, &'static str),

    /// A header with the requested name and value does not exist.
    #[error("Header {name} with value {value:?} not found")]
    HeaderNotFound {
        /// Header name.
        name: String,
        /// Value that was looked for.
        value: String,
    },

    /// Unknown or unsupported charset label.
    #[error("Unsupported charset: {0}")]
    Charset(String),

    /// Invalid operation on a stream (bad seek, write to a read-only view).
    #[error("Stream error: {0}")]
    Stream(String),
}

impl Error {
    /// Creates a structural parse error.
    #[must_use]
    pub fn structural(offset: usize, reason: impl Into<String>) -> Self {
        Self::Structural {
            offset,
            reason: reason.into(),
        }
    }

    /// Returns true if this error aborted a parse.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(self, Self::Structural { .. } | Self::MissingBoundary(..))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_classification() {
        assert!(Error::structural(3, "bad header").is_structural());
        assert!(Error::MissingBoundary("multipart/mixed".into(), 0).is_structural());
        assert!(!Error::Charset("x-unknown".into()).is_structural());
    }

    #[test]
    fn test_display() {
        let err = Error::InvalidHeaderTarget("To".into(), "use add_address");
        assert_eq!(err.to_string(), "Invalid header target To: use add_address");
    }
}
