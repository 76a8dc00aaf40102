//! # Signature Error Types
//!
//! Structured errors for key loading, signing and verification. The three
//! verification outcomes (signature absent, signature invalid, digest
//! mismatch) are distinct variants so callers can choose a remediation
//! without parsing messages.

use std::path::PathBuf;

use ocm_core::{DigestError, DigestSpec, ErrorKind};
use thiserror::Error;

/// Errors from signing and verification in `ocm-crypto`.
#[derive(Error, Debug)]
pub enum SignatureError {
    /// Hash or signature algorithm not supported by this signer/verifier.
    #[error("unsupported algorithm {algorithm:?}")]
    UnsupportedAlgorithm { algorithm: String },

    /// Key material could not be parsed or belongs to another algorithm family.
    #[error("key format error: {0}")]
    KeyFormat(String),

    /// A hex-encoded value could not be decoded.
    #[error("malformed hex in {field}: {source}")]
    MalformedHex {
        field: &'static str,
        #[source]
        source: hex::FromHexError,
    },

    /// PEM input contains a fragment that is not a parsable block.
    #[error("malformed PEM: {0}")]
    MalformedPem(String),

    /// PEM input parsed, but no block carries the expected label.
    #[error("no {label} block found in PEM data")]
    NoMatchingBlock { label: String },

    /// The signature payload media type is not understood.
    #[error("unsupported signature media type {media_type:?}")]
    UnsupportedMediaType { media_type: String },

    /// No signature with the requested name exists on the descriptor.
    #[error("signature {name:?} not found in component descriptor {component}")]
    SignatureNotFound { name: String, component: String },

    /// The signature bytes do not verify against the recorded digest.
    #[error("signature {name:?} is invalid: {reason}")]
    SignatureInvalid { name: String, reason: String },

    /// The signature is valid, but the descriptor content no longer matches
    /// the digest it was made over.
    #[error("digest mismatch for signature {name:?}: recorded {recorded}, computed {computed}")]
    DigestMismatch {
        name: String,
        recorded: DigestSpec,
        computed: DigestSpec,
    },

    /// The private key could not produce a signature.
    #[error("signing failed: {0}")]
    SigningFailed(String),

    /// A component reference does not name the descriptor it is being pinned to.
    #[error("reference {reference:?} does not point at {component}")]
    ReferenceMismatch { reference: String, component: String },

    /// Digest computation failed.
    #[error(transparent)]
    Digest(#[from] DigestError),

    /// Reading key material failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SignatureError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedAlgorithm { .. } | Self::KeyFormat(_) | Self::SigningFailed(_) => {
                ErrorKind::Configuration
            }
            Self::MalformedHex { .. }
            | Self::MalformedPem(_)
            | Self::NoMatchingBlock { .. }
            | Self::UnsupportedMediaType { .. }
            | Self::ReferenceMismatch { .. } => ErrorKind::InputValidation,
            Self::SignatureInvalid { .. } | Self::DigestMismatch { .. } => ErrorKind::Integrity,
            Self::SignatureNotFound { .. } => ErrorKind::NotFound,
            Self::Digest(e) => e.kind(),
            Self::Io { .. } => ErrorKind::Io,
        }
    }
}
