//! # ocm-crypto: Descriptor Signing and Verification
//!
//! Provides the signing layer on top of `ocm-core` digests:
//!
//! - **Signer / Verifier** capability traits over a descriptor digest.
//! - **RSASSA-PKCS1-v1_5** signing of raw digest bytes, with hex or PEM
//!   signature payloads.
//! - **Ed25519** signing as a second pluggable implementation.
//! - **Orchestration**: sign-and-append, two-step verification, signature
//!   lookup, and reference digest pinning.
//! - **Key material**: PKCS#8 / SPKI PEM loading and key generation.
//!
//! ## Crate Policy
//!
//! - Depends only on `ocm-core` internally.
//! - No mocking of cryptographic operations in tests. All tests use real
//!   digests, real RSA and real Ed25519 keys.
//! - Private keys never appear in `Debug` output or logs.

pub mod armor;
pub mod ed25519;
pub mod error;
pub mod keys;
pub mod rsassa;
pub mod sign;
pub mod signer;

pub use ed25519::{Ed25519Signer, Ed25519Verifier, ED25519, MEDIA_TYPE_ED25519_HEX};
pub use error::SignatureError;
pub use keys::{generate_key_pair, load_signer, load_verifier, KeyAlgorithm, KeyPairPem};
pub use rsassa::{RsaSigner, RsaVerifier, MEDIA_TYPE_RSA_HEX, RSA_PKCS1_V15};
pub use sign::{
    get_signature_by_name, pin_reference_digest, sign_component_descriptor,
    verify_signed_component_descriptor,
};
pub use signer::{SignatureEncoding, Signer, Verifier, MEDIA_TYPE_PEM, SIGNATURE_PEM_LABEL};
