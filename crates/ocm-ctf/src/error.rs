//! # Archive and Resolver Error Types
//!
//! [`CtfError`] covers transport archives, component archives and the
//! filesystem beneath them. [`ResolveError`] covers blob resolution.

use std::path::PathBuf;

use ocm_core::{DigestError, ErrorKind};
use thiserror::Error;

/// Errors from transport and component archive operations.
#[derive(Error, Debug)]
pub enum CtfError {
    /// Filesystem or stream failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The path holds a different kind of container than requested.
    #[error("{path}: {expected} requested, but found {found}")]
    ArchiveKindMismatch {
        path: PathBuf,
        expected: &'static str,
        found: &'static str,
    },

    /// An export target lies inside the directory it would be copied from.
    #[error("export target {target} lies inside the archive root {root}")]
    ExportIntoArchive { target: PathBuf, root: PathBuf },

    /// The archive was closed; its staging storage is gone.
    #[error("transport archive {path} is closed")]
    ArchiveClosed { path: PathBuf },

    /// A tar entry or entry name escapes the archive root.
    #[error("unsafe entry path {path:?}")]
    UnsafeEntryPath { path: String },

    /// The requested format is not valid for this operation.
    #[error("unsupported archive format {format:?}")]
    UnsupportedFormat { format: String },

    /// A component archive has no `component-descriptor.yaml`.
    #[error("component archive {entry} has no component descriptor")]
    MissingDescriptor { entry: String },

    /// The component descriptor could not be parsed.
    #[error("invalid component descriptor in {entry}: {source}")]
    InvalidDescriptor {
        entry: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// A `localBlob` access names a blob absent from its component archive.
    #[error("component {component} references local blob {reference:?}, which is not in the archive")]
    LocalBlobNotFound {
        component: String,
        reference: String,
    },

    /// No entry of that name in the transport archive.
    #[error("no component archive named {name:?}")]
    EntryNotFound { name: String },

    /// Digest computation failed.
    #[error(transparent)]
    Digest(#[from] DigestError),
}

impl CtfError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } => ErrorKind::Io,
            Self::ArchiveKindMismatch { .. }
            | Self::ArchiveClosed { .. }
            | Self::ExportIntoArchive { .. } => ErrorKind::ArchiveState,
            Self::UnsafeEntryPath { .. }
            | Self::MissingDescriptor { .. }
            | Self::InvalidDescriptor { .. } => ErrorKind::InputValidation,
            Self::UnsupportedFormat { .. } => ErrorKind::Configuration,
            Self::LocalBlobNotFound { .. } | Self::EntryNotFound { .. } => ErrorKind::NotFound,
            Self::Digest(e) => e.kind(),
        }
    }

    /// Wrap an I/O error with the path it happened on.
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

/// Errors from blob resolution.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The resource carries no access descriptor.
    #[error("resource {resource:?} has no access defined")]
    NoAccessDefined { resource: String },

    /// No registered resolver handles the access type.
    #[error("no resolver for access type {access_type:?} of resource {resource:?}")]
    UnsupportedAccessType {
        resource: String,
        access_type: String,
    },

    /// The local blob is not present in the component archive.
    #[error("local blob {reference:?} not found")]
    LocalBlobNotFound { reference: String },

    /// The blob content does not hash to its recorded reference.
    #[error("local blob {reference:?} does not match its content digest {computed}")]
    BlobDigestMismatch { reference: String, computed: String },

    /// A resolver failed to fetch the content.
    #[error("resolving {resource:?} failed: {reason}")]
    Failed { resource: String, reason: String },

    /// Digest computation failed.
    #[error(transparent)]
    Digest(#[from] DigestError),

    /// Writing blob content failed.
    #[error("I/O error while streaming blob: {0}")]
    Io(#[from] std::io::Error),
}

impl ResolveError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoAccessDefined { .. } => ErrorKind::InputValidation,
            Self::UnsupportedAccessType { .. } | Self::BlobDigestMismatch { .. } => {
                ErrorKind::Integrity
            }
            Self::LocalBlobNotFound { .. } => ErrorKind::NotFound,
            Self::Failed { .. } | Self::Io(_) => ErrorKind::Io,
            Self::Digest(e) => e.kind(),
        }
    }
}
