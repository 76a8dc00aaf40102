//! # RSASSA-PKCS1-v1_5 Signing and Verification
//!
//! Signs the *raw digest bytes* recorded in a [`DigestSpec`], prefixed with
//! the DigestInfo of the digest's hash algorithm. PKCS#1 v1.5 padding has no
//! randomness, so signing the same digest with the same key always yields
//! the same signature bytes.
//!
//! ## Security Invariant
//!
//! - Private keys are never serialized or logged. [`RsaSigner`] has a
//!   redacting `Debug` impl and exposes only its public half.
//! - Key loading checks the algorithm family before decoding: a PKCS#8 or
//!   SPKI document carrying a non-RSA key fails with `KeyFormat`.
//!
//! ## Key Formats
//!
//! - Private keys: PKCS#8 PEM (`PRIVATE KEY`) or PKCS#1 PEM
//!   (`RSA PRIVATE KEY`).
//! - Public keys: SPKI PEM (`PUBLIC KEY`) or PKCS#1 PEM (`RSA PUBLIC KEY`).

use std::path::Path;

use ocm_core::{ComponentDescriptor, DigestSpec, Signature, SignatureSpec, SHA256, SHA512};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{
    DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding,
    PrivateKeyInfo, SubjectPublicKeyInfoRef,
};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Sha256, Sha512};

use crate::armor;
use crate::error::SignatureError;
use crate::keys::read_key_file;
use crate::signer::{
    digest_bytes, SignatureEncoding, Signer, Verifier, MEDIA_TYPE_PEM, SIGNATURE_PEM_LABEL,
};

/// Signature algorithm name recorded in a [`SignatureSpec`].
pub const RSA_PKCS1_V15: &str = "RSASSA-PKCS1-V1_5";

/// Media type of a hex-encoded RSA signature.
pub const MEDIA_TYPE_RSA_HEX: &str = "application/vnd.ocm.signature.rsa";

/// Default modulus size for generated keys.
pub const DEFAULT_RSA_BITS: usize = 2048;

const RSA_ENCRYPTION_OID: &str = "1.2.840.113549.1.1.1";

/// Signs descriptor digests with an RSA private key.
pub struct RsaSigner {
    key: RsaPrivateKey,
    encoding: SignatureEncoding,
}

impl RsaSigner {
    pub fn new(key: RsaPrivateKey) -> Self {
        Self {
            key,
            encoding: SignatureEncoding::Hex,
        }
    }

    /// Emit signatures as hex (default) or as a PEM `SIGNATURE` block.
    pub fn with_encoding(mut self, encoding: SignatureEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Generate a fresh key of `bits` bits.
    pub fn generate(bits: usize) -> Result<Self, SignatureError> {
        let mut rng = rand::rngs::OsRng;
        let key = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| SignatureError::KeyFormat(format!("RSA key generation failed: {e}")))?;
        Ok(Self::new(key))
    }

    /// Parse a PKCS#8 or PKCS#1 PEM private key.
    pub fn from_pem(pem_text: &str) -> Result<Self, SignatureError> {
        Ok(Self::new(parse_private_key(pem_text)?))
    }

    /// Read and parse a PEM private key file.
    pub fn from_key_file(path: &Path) -> Result<Self, SignatureError> {
        Self::from_pem(&read_key_file(path)?)
    }

    pub fn public_key(&self) -> RsaPublicKey {
        self.key.to_public_key()
    }

    /// Render the private key as PKCS#8 PEM.
    pub fn to_pkcs8_pem(&self) -> Result<String, SignatureError> {
        self.key
            .to_pkcs8_pem(LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| SignatureError::KeyFormat(format!("PKCS#8 encoding failed: {e}")))
    }

    /// Render the public key as SPKI PEM.
    pub fn public_key_pem(&self) -> Result<String, SignatureError> {
        self.public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| SignatureError::KeyFormat(format!("SPKI encoding failed: {e}")))
    }
}

impl std::fmt::Debug for RsaSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RsaSigner(<private>, {:?})", self.encoding)
    }
}

impl Signer for RsaSigner {
    fn sign(
        &self,
        cd: &ComponentDescriptor,
        digest: &DigestSpec,
    ) -> Result<SignatureSpec, SignatureError> {
        let hashed = digest_bytes(digest)?;
        let scheme = pkcs1v15_scheme(&digest.hash_algorithm)?;
        let signature = self
            .key
            .sign(scheme, &hashed)
            .map_err(|e| SignatureError::SigningFailed(e.to_string()))?;

        tracing::debug!(component = %cd, digest = %digest, "signed digest with RSA key");

        let (value, media_type) = match self.encoding {
            SignatureEncoding::Hex => (hex::encode(signature), MEDIA_TYPE_RSA_HEX),
            SignatureEncoding::Pem => (
                armor::encode_block(SIGNATURE_PEM_LABEL, signature),
                MEDIA_TYPE_PEM,
            ),
        };
        Ok(SignatureSpec {
            algorithm: RSA_PKCS1_V15.to_string(),
            value,
            media_type: media_type.to_string(),
        })
    }
}

/// Verifies RSA signatures with a public key.
#[derive(Debug, Clone)]
pub struct RsaVerifier {
    key: RsaPublicKey,
}

impl RsaVerifier {
    pub fn new(key: RsaPublicKey) -> Self {
        Self { key }
    }

    /// Parse an SPKI or PKCS#1 PEM public key.
    pub fn from_pem(pem_text: &str) -> Result<Self, SignatureError> {
        Ok(Self::new(parse_public_key(pem_text)?))
    }

    /// Read and parse a PEM public key file.
    pub fn from_key_file(path: &Path) -> Result<Self, SignatureError> {
        Self::from_pem(&read_key_file(path)?)
    }
}

impl Verifier for RsaVerifier {
    fn verify(&self, cd: &ComponentDescriptor, signature: &Signature) -> Result<(), SignatureError> {
        let spec = &signature.signature;
        if !spec.algorithm.eq_ignore_ascii_case(RSA_PKCS1_V15) {
            return Err(SignatureError::UnsupportedAlgorithm {
                algorithm: spec.algorithm.clone(),
            });
        }
        let signature_bytes = match spec.media_type.as_str() {
            MEDIA_TYPE_RSA_HEX => {
                hex::decode(spec.value.trim()).map_err(|source| SignatureError::MalformedHex {
                    field: "signature value",
                    source,
                })?
            }
            MEDIA_TYPE_PEM => armor::find_block(&spec.value, SIGNATURE_PEM_LABEL)?,
            other => {
                return Err(SignatureError::UnsupportedMediaType {
                    media_type: other.to_string(),
                })
            }
        };

        let hashed = digest_bytes(&signature.digest)?;
        let scheme = pkcs1v15_scheme(&signature.digest.hash_algorithm)?;
        self.key
            .verify(scheme, &hashed, &signature_bytes)
            .map_err(|e| {
                tracing::warn!(component = %cd, signature = %signature.name, "RSA signature rejected");
                SignatureError::SignatureInvalid {
                    name: signature.name.clone(),
                    reason: e.to_string(),
                }
            })
    }
}

/// PKCS#1 v1.5 scheme with the DigestInfo prefix of `hash_algorithm`.
fn pkcs1v15_scheme(hash_algorithm: &str) -> Result<Pkcs1v15Sign, SignatureError> {
    match hash_algorithm.to_ascii_lowercase().as_str() {
        SHA256 => Ok(Pkcs1v15Sign::new::<Sha256>()),
        SHA512 => Ok(Pkcs1v15Sign::new::<Sha512>()),
        _ => Err(SignatureError::UnsupportedAlgorithm {
            algorithm: hash_algorithm.to_string(),
        }),
    }
}

fn parse_private_key(pem_text: &str) -> Result<RsaPrivateKey, SignatureError> {
    let block = pem::parse(pem_text.trim())
        .map_err(|e| SignatureError::KeyFormat(format!("private key is not PEM: {e}")))?;
    match block.tag() {
        "PRIVATE KEY" => {
            let info = PrivateKeyInfo::try_from(block.contents())
                .map_err(|e| SignatureError::KeyFormat(format!("invalid PKCS#8 document: {e}")))?;
            let oid = info.algorithm.oid.to_string();
            if oid != RSA_ENCRYPTION_OID {
                return Err(SignatureError::KeyFormat(format!(
                    "private key is not an RSA key (algorithm {oid})"
                )));
            }
            RsaPrivateKey::from_pkcs8_der(block.contents())
                .map_err(|e| SignatureError::KeyFormat(format!("invalid RSA private key: {e}")))
        }
        "RSA PRIVATE KEY" => RsaPrivateKey::from_pkcs1_der(block.contents())
            .map_err(|e| SignatureError::KeyFormat(format!("invalid PKCS#1 private key: {e}"))),
        other => Err(SignatureError::KeyFormat(format!(
            "unexpected PEM block {other:?}, expected PRIVATE KEY"
        ))),
    }
}

fn parse_public_key(pem_text: &str) -> Result<RsaPublicKey, SignatureError> {
    let block = pem::parse(pem_text.trim())
        .map_err(|e| SignatureError::KeyFormat(format!("public key is not PEM: {e}")))?;
    match block.tag() {
        "PUBLIC KEY" => {
            let spki = SubjectPublicKeyInfoRef::try_from(block.contents())
                .map_err(|e| SignatureError::KeyFormat(format!("invalid SPKI document: {e}")))?;
            let oid = spki.algorithm.oid.to_string();
            if oid != RSA_ENCRYPTION_OID {
                return Err(SignatureError::KeyFormat(format!(
                    "public key is not an RSA key (algorithm {oid})"
                )));
            }
            RsaPublicKey::from_public_key_der(block.contents())
                .map_err(|e| SignatureError::KeyFormat(format!("invalid RSA public key: {e}")))
        }
        "RSA PUBLIC KEY" => RsaPublicKey::from_pkcs1_der(block.contents())
            .map_err(|e| SignatureError::KeyFormat(format!("invalid PKCS#1 public key: {e}"))),
        other => Err(SignatureError::KeyFormat(format!(
            "unexpected PEM block {other:?}, expected PUBLIC KEY"
        ))),
    }
}
