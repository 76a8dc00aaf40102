//! # Error Types: Structured Error Hierarchy
//!
//! Defines the error types for normalisation and digest computation, plus
//! the [`ErrorKind`] taxonomy shared by every crate in the workspace.
//!
//! ## Design
//!
//! - Every error names the offending element, algorithm or path.
//! - Every error reports an [`ErrorKind`] so callers can tell "could not
//!   attempt the check" apart from "the check failed".

use thiserror::Error;

/// Coarse classification of every error raised in the workspace.
///
/// Each kind implies a different remediation: fix configuration, fix the
/// input, distrust the content, supply the missing item, stop using a
/// closed archive, or retry the I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad key material or an unknown algorithm name.
    Configuration,
    /// Malformed hex, malformed PEM, missing access descriptor.
    InputValidation,
    /// Digest mismatch, invalid signature, unsupported access type.
    Integrity,
    /// Named signature or local blob absent.
    NotFound,
    /// Archive kind mismatch or use of a closed archive.
    ArchiveState,
    /// Filesystem or stream failure.
    Io,
}

impl ErrorKind {
    /// Returns the kind identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::InputValidation => "input-validation",
            Self::Integrity => "integrity",
            Self::NotFound => "not-found",
            Self::ArchiveState => "archive-state",
            Self::Io => "io",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error during canonical normalisation of a descriptor or element.
#[derive(Error, Debug)]
pub enum NormalizationError {
    /// A `localBlob` access carries no blob digest.
    #[error("{element} has a localBlob access without a local reference digest")]
    MissingLocalBlobDigest {
        /// Human-readable element identity, e.g. `resource "image"`.
        element: String,
    },

    /// Float values are not permitted in canonical representations.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// The normalisation algorithm id is not known to this build.
    #[error("unknown normalisation algorithm {0:?}")]
    UnknownAlgorithm(String),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

impl NormalizationError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownAlgorithm(_) => ErrorKind::Configuration,
            Self::MissingLocalBlobDigest { .. }
            | Self::FloatRejected(_)
            | Self::SerializationFailed(_) => ErrorKind::InputValidation,
        }
    }
}

/// Error during digest computation.
#[derive(Error, Debug)]
pub enum DigestError {
    /// The hash algorithm is not registered.
    #[error("unsupported hash algorithm {algorithm:?}")]
    UnsupportedAlgorithm {
        /// The requested algorithm name.
        algorithm: String,
    },

    /// The descriptor violates a normalisation precondition.
    #[error("normalisation error: {0}")]
    Normalization(#[from] NormalizationError),
}

impl DigestError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedAlgorithm { .. } => ErrorKind::Configuration,
            Self::Normalization(e) => e.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_algorithm_is_configuration() {
        let err = DigestError::UnsupportedAlgorithm {
            algorithm: "md5".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("md5"));
    }

    #[test]
    fn missing_local_blob_is_input_validation() {
        let err = DigestError::from(NormalizationError::MissingLocalBlobDigest {
            element: "resource \"image\"".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::InputValidation);
        assert!(err.to_string().contains("image"));
    }

    #[test]
    fn unknown_normalisation_is_configuration() {
        let err = NormalizationError::UnknownAlgorithm("xmlNormalisation/v9".to_string());
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn kind_display() {
        assert_eq!(ErrorKind::ArchiveState.to_string(), "archive-state");
        assert_eq!(ErrorKind::NotFound.to_string(), "not-found");
    }
}
