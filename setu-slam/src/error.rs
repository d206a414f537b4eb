//! Error types for SetuSLAM

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, SlamError>;

/// SetuSLAM error types
#[derive(Error, Debug)]
pub enum SlamError {
    /// I/O error while reading or writing an archive
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive encoding or decoding failed
    #[error("Codec error: {0}")]
    Codec(String),

    /// Archive decoded but cannot be installed
    #[error("Corrupt archive: {0}")]
    CorruptArchive(String),

    /// Agent roster or parameters are inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Odometry pose unavailable for one observation
    #[error("Pose lookup failed: {0}")]
    Lookup(String),

    /// Interactive editing is switched off in configuration
    #[error("Interactive mode is disabled")]
    InteractiveDisabled,

    /// Tag was never associated with a scan
    #[error("Fiducial {0} not found")]
    FiducialNotFound(u32),

    /// Request is not valid in the current processing mode
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Worker thread is gone
    #[error("Channel closed: {0}")]
    ChannelClosed(String),
}

impl SlamError {
    /// Errors that leave the session in a state it cannot safely continue from.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SlamError::Config(_) | SlamError::CorruptArchive(_))
    }
}

impl From<postcard::Error> for SlamError {
    fn from(e: postcard::Error) -> Self {
        SlamError::Codec(e.to_string())
    }
}

impl From<basic_toml::Error> for SlamError {
    fn from(e: basic_toml::Error) -> Self {
        SlamError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(SlamError::Config("lists differ".into()).is_fatal());
        assert!(SlamError::CorruptArchive("no lasers".into()).is_fatal());
        assert!(!SlamError::Lookup("a/odom".into()).is_fatal());
        assert!(!SlamError::InteractiveDisabled.is_fatal());
    }
}
