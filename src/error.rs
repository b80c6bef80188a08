//! Error type shared by the recorder and the replay engine.

use thiserror::Error;

/// Errors raised while recording or replaying a session log.
#[derive(Error, Debug)]
pub enum ReplayError {
    /// Lifecycle or configuration misuse: recording a modality that was not
    /// enabled, recording after stop, stopping twice, starting twice.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// The log header or a record carries a value that cannot be decoded.
    #[error("Malformed log: {0}")]
    Format(String),

    /// Destination slice handed to a pixel copy-out is shorter than the frame.
    #[error("Pixel buffer too small: need {needed} elements, got {actual}")]
    BufferTooSmall { needed: usize, actual: usize },

    /// Structured skeleton payload could not be encoded or decoded.
    #[error("Skeleton encoding error: {0}")]
    Skeleton(#[from] bincode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReplayError {
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        ReplayError::InvalidOperation(message.into())
    }

    pub fn format(message: impl Into<String>) -> Self {
        ReplayError::Format(message.into())
    }

    /// True for lifecycle/configuration errors.
    pub fn is_invalid_operation(&self) -> bool {
        matches!(self, ReplayError::InvalidOperation(_))
    }

    /// True when the underlying stream ended in the middle of a value.
    pub(crate) fn is_truncation(&self) -> bool {
        match self {
            ReplayError::Io(e) => e.kind() == std::io::ErrorKind::UnexpectedEof,
            ReplayError::Skeleton(e) => matches!(
                e.as_ref(),
                bincode::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReplayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_operation_display() {
        let err = ReplayError::invalid_operation("recorder is already stopped");
        assert!(err.is_invalid_operation());
        assert_eq!(err.to_string(), "Invalid operation: recorder is already stopped");
    }

    #[test]
    fn truncation_detection() {
        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert!(ReplayError::from(eof).is_truncation());

        let other = std::io::Error::other("disk on fire");
        assert!(!ReplayError::from(other).is_truncation());

        let nested = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let skeleton = ReplayError::Skeleton(Box::new(bincode::ErrorKind::Io(nested)));
        assert!(skeleton.is_truncation());
        assert!(!ReplayError::format("bad").is_truncation());
    }
}
