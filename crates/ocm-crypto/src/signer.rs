//! # Signer / Verifier Capabilities
//!
//! A signer turns a descriptor digest into a [`SignatureSpec`]; a verifier
//! checks a recorded [`Signature`] against its own recorded digest. Neither
//! re-normalises the descriptor: comparing the digest with the content is
//! the orchestrator's job (see [`crate::sign`]).

use ocm_core::{ComponentDescriptor, DigestSpec, Signature, SignatureSpec};

use crate::error::SignatureError;

/// Media type of a PEM-armored signature payload.
pub const MEDIA_TYPE_PEM: &str = "application/x-pem-file";

/// PEM block label carrying signature bytes.
pub const SIGNATURE_PEM_LABEL: &str = "SIGNATURE";

/// Produces a signature over a descriptor digest.
pub trait Signer {
    fn sign(
        &self,
        cd: &ComponentDescriptor,
        digest: &DigestSpec,
    ) -> Result<SignatureSpec, SignatureError>;
}

/// Validates signature bytes against the digest recorded in the signature.
pub trait Verifier {
    fn verify(&self, cd: &ComponentDescriptor, signature: &Signature) -> Result<(), SignatureError>;
}

/// How a signer renders signature bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureEncoding {
    /// Lowercase hex of the raw signature bytes.
    #[default]
    Hex,
    /// A PEM block labelled `SIGNATURE`.
    Pem,
}

/// Decode the hex digest value into the bytes that get signed.
pub(crate) fn digest_bytes(digest: &DigestSpec) -> Result<Vec<u8>, SignatureError> {
    hex::decode(digest.value.trim()).map_err(|source| SignatureError::MalformedHex {
        field: "digest value",
        source,
    })
}
