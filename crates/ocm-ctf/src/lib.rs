//! # ocm-ctf: Transport Archives and Blob Resolution
//!
//! Moves component descriptors and their local blobs between systems:
//!
//! - **Component archives**: one descriptor plus its content-addressed
//!   local blobs, as a directory, tar or gzip tar.
//! - **Transport archives (CTF)**: a container of component archives backed
//!   by a directory, tar file or gzip tar file, with staging, write-back,
//!   export and close semantics.
//! - **Filesystem abstraction**: [`FileSystem`] with an OS implementation
//!   and an in-memory implementation for tests and embedding.
//! - **Blob resolvers**: typed resolvers combined into flat, ordered
//!   aggregates.
//!
//! ## Crate Policy
//!
//! - Depends only on `ocm-core` internally.
//! - All I/O is synchronous and goes through [`FileSystem`].
//! - Tar entries never escape the archive root.

pub mod archive;
pub mod component_archive;
pub mod ctf;
pub mod error;
pub mod fs;
pub mod resolver;

pub use archive::{sanitize_entry_path, ArchiveFormat};
pub use component_archive::{ComponentArchive, BLOBS_DIR, COMPONENT_DESCRIPTOR_FILE};
pub use ctf::{OpenMode, TransportArchive};
pub use error::{CtfError, ResolveError};
pub use fs::{FileInfo, FileSystem, MemoryFileSystem, OsFileSystem};
pub use resolver::{
    aggregate, AccessTypeResolver, AggregatedBlobResolver, BlobResolver, LocalBlobResolver,
    TypedBlobResolver,
};
