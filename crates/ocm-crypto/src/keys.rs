//! # Key Material
//!
//! Key generation and key file loading for the supported signature
//! families. Generated keys are returned as PEM text: PKCS#8 for the
//! private half, SPKI for the public half.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::ed25519::{Ed25519Signer, Ed25519Verifier};
use crate::error::SignatureError;
use crate::rsassa::{RsaSigner, RsaVerifier, DEFAULT_RSA_BITS};
use crate::signer::{SignatureEncoding, Signer, Verifier};

/// Signature algorithm family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyAlgorithm {
    #[default]
    Rsa,
    Ed25519,
}

impl KeyAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rsa => "rsa",
            Self::Ed25519 => "ed25519",
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyAlgorithm {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rsa" | "rsassa-pkcs1-v1_5" => Ok(Self::Rsa),
            "ed25519" => Ok(Self::Ed25519),
            _ => Err(SignatureError::UnsupportedAlgorithm {
                algorithm: s.to_string(),
            }),
        }
    }
}

/// A generated key pair in PEM form.
pub struct KeyPairPem {
    pub algorithm: KeyAlgorithm,
    pub private_pem: String,
    pub public_pem: String,
}

impl fmt::Debug for KeyPairPem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPairPem")
            .field("algorithm", &self.algorithm)
            .field("private_pem", &"<private>")
            .field("public_pem", &self.public_pem)
            .finish()
    }
}

/// Generate a key pair. `rsa_bits` is ignored for Ed25519.
pub fn generate_key_pair(
    algorithm: KeyAlgorithm,
    rsa_bits: Option<usize>,
) -> Result<KeyPairPem, SignatureError> {
    let (private_pem, public_pem) = match algorithm {
        KeyAlgorithm::Rsa => {
            let signer = RsaSigner::generate(rsa_bits.unwrap_or(DEFAULT_RSA_BITS))?;
            (signer.to_pkcs8_pem()?, signer.public_key_pem()?)
        }
        KeyAlgorithm::Ed25519 => {
            let signer = Ed25519Signer::generate();
            (signer.to_pkcs8_pem()?, signer.public_key_pem()?)
        }
    };
    tracing::info!(algorithm = %algorithm, "generated key pair");
    Ok(KeyPairPem {
        algorithm,
        private_pem,
        public_pem,
    })
}

/// Load a signer of the given family from a PEM private key file.
pub fn load_signer(
    algorithm: KeyAlgorithm,
    path: &Path,
    encoding: SignatureEncoding,
) -> Result<Box<dyn Signer>, SignatureError> {
    Ok(match algorithm {
        KeyAlgorithm::Rsa => Box::new(RsaSigner::from_key_file(path)?.with_encoding(encoding)),
        KeyAlgorithm::Ed25519 => Box::new(Ed25519Signer::from_key_file(path)?),
    })
}

/// Load a verifier of the given family from a PEM public key file.
pub fn load_verifier(
    algorithm: KeyAlgorithm,
    path: &Path,
) -> Result<Box<dyn Verifier>, SignatureError> {
    Ok(match algorithm {
        KeyAlgorithm::Rsa => Box::new(RsaVerifier::from_key_file(path)?),
        KeyAlgorithm::Ed25519 => Box::new(Ed25519Verifier::from_key_file(path)?),
    })
}

pub(crate) fn read_key_file(path: &Path) -> Result<String, SignatureError> {
    std::fs::read_to_string(path).map_err(|source| SignatureError::Io {
        path: path.to_path_buf(),
        source,
    })
}
