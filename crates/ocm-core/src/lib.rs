#![deny(missing_docs)]

//! # ocm-core: Component Descriptor Integrity Primitives
//!
//! This crate is the leaf of the workspace. It defines the component
//! descriptor data model and everything needed to turn a descriptor into a
//! reproducible digest. Every other crate in the workspace depends on
//! `ocm-core`; it depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **`CanonicalBytes` newtype.** All digest input flows through
//!    `CanonicalBytes`, produced only by the normaliser. No raw
//!    `serde_json::to_vec()` for digests.
//!
//! 2. **Explicit hasher registry.** Algorithm lookup goes through a
//!    [`HasherRegistry`] value handed to the [`DigestEngine`]. There is no
//!    process-wide algorithm table, so tests can inject their own hashers
//!    and several algorithm sets can coexist.
//!
//! 3. **Versioned normalisation.** Every [`DigestSpec`] records the
//!    normalisation algorithm id next to the hash algorithm, so a later
//!    normalisation version never invalidates old signatures.
//!
//! 4. **Append-only descriptors.** The digest machinery takes descriptors by
//!    shared reference. Descriptors change only through the explicit
//!    `add_*` methods.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `ocm-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod descriptor;
pub mod digest;
pub mod error;
pub mod hasher;
pub mod normalize;

// Re-export primary types for ergonomic imports.
pub use canonical::CanonicalBytes;
pub use descriptor::{
    Access, BlobInfo, ComponentDescriptor, ComponentReference, DigestSpec, ExternalAccess, Label,
    LocalBlobAccess, RepositoryContext, Resource, ResourceRelation, Signature, SignatureSpec,
    Source,
};
pub use digest::{digest_component_descriptor, DigestEngine};
pub use error::{DigestError, ErrorKind, NormalizationError};
pub use hasher::{Hasher, HasherRegistry, SHA256, SHA512};
pub use normalize::NormalisationAlgorithm;
