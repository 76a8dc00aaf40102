//! # Ed25519 Signing and Verification
//!
//! A second [`Signer`]/[`Verifier`] pair. Like the RSA signer it signs the
//! raw digest bytes of a [`DigestSpec`], never the descriptor itself.
//! Ed25519 signatures are deterministic.
//!
//! ## Security Invariant
//!
//! - Private keys are never serialized or logged. [`Ed25519Signer`] does
//!   not implement `Serialize`; its `Debug` output is redacted.
//! - Signature payloads are always 64 bytes, hex-encoded.
//!
//! ## Key Formats
//!
//! PKCS#8 PEM private keys and SPKI PEM public keys, same containers as RSA.

use std::path::Path;

use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use ed25519_dalek::{Signer as _, Verifier as _};
use ocm_core::{ComponentDescriptor, DigestSpec, Signature, SignatureSpec};

use crate::error::SignatureError;
use crate::keys::read_key_file;
use crate::signer::{digest_bytes, Signer, Verifier};

/// Signature algorithm name recorded in a [`SignatureSpec`].
pub const ED25519: &str = "ED25519";

/// Media type of a hex-encoded Ed25519 signature.
pub const MEDIA_TYPE_ED25519_HEX: &str = "application/vnd.ocm.signature.ed25519.hex";

/// Signs descriptor digests with an Ed25519 key.
pub struct Ed25519Signer {
    signing_key: ed25519_dalek::SigningKey,
}

impl Ed25519Signer {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut csprng),
        }
    }

    /// Create a key from a raw 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(seed),
        }
    }

    /// Parse a PKCS#8 PEM private key.
    pub fn from_pem(pem_text: &str) -> Result<Self, SignatureError> {
        let signing_key = ed25519_dalek::SigningKey::from_pkcs8_pem(pem_text.trim())
            .map_err(|e| SignatureError::KeyFormat(format!("not an Ed25519 private key: {e}")))?;
        Ok(Self { signing_key })
    }

    pub fn from_key_file(path: &Path) -> Result<Self, SignatureError> {
        Self::from_pem(&read_key_file(path)?)
    }

    pub fn verifying_key(&self) -> ed25519_dalek::VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn to_pkcs8_pem(&self) -> Result<String, SignatureError> {
        self.signing_key
            .to_pkcs8_pem(LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| SignatureError::KeyFormat(format!("PKCS#8 encoding failed: {e}")))
    }

    pub fn public_key_pem(&self) -> Result<String, SignatureError> {
        self.verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| SignatureError::KeyFormat(format!("SPKI encoding failed: {e}")))
    }
}

impl std::fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519Signer(<private>)")
    }
}

impl Signer for Ed25519Signer {
    fn sign(
        &self,
        cd: &ComponentDescriptor,
        digest: &DigestSpec,
    ) -> Result<SignatureSpec, SignatureError> {
        let message = digest_bytes(digest)?;
        let signature = self.signing_key.sign(&message);
        tracing::debug!(component = %cd, digest = %digest, "signed digest with Ed25519 key");
        Ok(SignatureSpec {
            algorithm: ED25519.to_string(),
            value: hex::encode(signature.to_bytes()),
            media_type: MEDIA_TYPE_ED25519_HEX.to_string(),
        })
    }
}

/// Verifies Ed25519 signatures.
#[derive(Debug, Clone)]
pub struct Ed25519Verifier {
    verifying_key: ed25519_dalek::VerifyingKey,
}

impl Ed25519Verifier {
    pub fn new(verifying_key: ed25519_dalek::VerifyingKey) -> Self {
        Self { verifying_key }
    }

    /// Parse an SPKI PEM public key.
    pub fn from_pem(pem_text: &str) -> Result<Self, SignatureError> {
        let verifying_key = ed25519_dalek::VerifyingKey::from_public_key_pem(pem_text.trim())
            .map_err(|e| SignatureError::KeyFormat(format!("not an Ed25519 public key: {e}")))?;
        Ok(Self::new(verifying_key))
    }

    pub fn from_key_file(path: &Path) -> Result<Self, SignatureError> {
        Self::from_pem(&read_key_file(path)?)
    }
}

impl Verifier for Ed25519Verifier {
    fn verify(&self, cd: &ComponentDescriptor, signature: &Signature) -> Result<(), SignatureError> {
        let spec = &signature.signature;
        if !spec.algorithm.eq_ignore_ascii_case(ED25519) {
            return Err(SignatureError::UnsupportedAlgorithm {
                algorithm: spec.algorithm.clone(),
            });
        }
        if spec.media_type != MEDIA_TYPE_ED25519_HEX {
            return Err(SignatureError::UnsupportedMediaType {
                media_type: spec.media_type.clone(),
            });
        }
        let bytes = hex::decode(spec.value.trim()).map_err(|source| SignatureError::MalformedHex {
            field: "signature value",
            source,
        })?;
        let bytes: [u8; 64] = bytes.try_into().map_err(|b: Vec<u8>| {
            SignatureError::SignatureInvalid {
                name: signature.name.clone(),
                reason: format!("Ed25519 signature must be 64 bytes, got {}", b.len()),
            }
        })?;
        let message = digest_bytes(&signature.digest)?;
        self.verifying_key
            .verify(&message, &ed25519_dalek::Signature::from_bytes(&bytes))
            .map_err(|e| {
                tracing::warn!(component = %cd, signature = %signature.name, "Ed25519 signature rejected");
                SignatureError::SignatureInvalid {
                    name: signature.name.clone(),
                    reason: e.to_string(),
                }
            })
    }
}
