//! # Hasher Registry
//!
//! Maps an algorithm name to a hash function. The registry is a plain value
//! passed to the [`DigestEngine`](crate::DigestEngine); there is no global
//! table. Lookup is case-insensitive and names are stored lowercase.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256, Sha512};

use crate::error::DigestError;

/// Algorithm name of SHA-256.
pub const SHA256: &str = "sha256";
/// Algorithm name of SHA-512.
pub const SHA512: &str = "sha512";

type HashFn = dyn Fn(&[u8]) -> Vec<u8> + Send + Sync;

/// A named hash function.
#[derive(Clone)]
pub struct Hasher {
    algorithm: String,
    function: Arc<HashFn>,
}

impl Hasher {
    /// Wrap an arbitrary hash function under `algorithm`.
    pub fn new(
        algorithm: impl Into<String>,
        function: impl Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
    ) -> Self {
        Self {
            algorithm: algorithm.into().to_ascii_lowercase(),
            function: Arc::new(function),
        }
    }

    /// SHA-256.
    pub fn sha256() -> Self {
        Self::new(SHA256, |data| Sha256::digest(data).to_vec())
    }

    /// SHA-512.
    pub fn sha512() -> Self {
        Self::new(SHA512, |data| Sha512::digest(data).to_vec())
    }

    /// Lowercase algorithm name, as recorded in a `DigestSpec`.
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Hash `data` to raw digest bytes.
    pub fn hash(&self, data: &[u8]) -> Vec<u8> {
        (self.function)(data)
    }

    /// Hash and render as lowercase hex.
    pub fn hash_hex(&self, data: &[u8]) -> String {
        hex::encode(self.hash(data))
    }
}

impl fmt::Debug for Hasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hasher({})", self.algorithm)
    }
}

/// A set of hash functions addressable by name.
#[derive(Debug, Clone)]
pub struct HasherRegistry {
    hashers: BTreeMap<String, Hasher>,
}

impl HasherRegistry {
    /// An empty registry. Every lookup fails until hashers are registered.
    pub fn new() -> Self {
        Self {
            hashers: BTreeMap::new(),
        }
    }

    /// A registry with SHA-256 and SHA-512.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.insert(Hasher::sha256());
        registry.insert(Hasher::sha512());
        registry
    }

    /// Register `function` under `name`, replacing any previous entry.
    pub fn register(
        &mut self,
        name: &str,
        function: impl Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
    ) {
        self.insert(Hasher::new(name, function));
    }

    /// Register a prepared hasher, replacing any previous entry of that name.
    pub fn insert(&mut self, hasher: Hasher) {
        self.hashers.insert(hasher.algorithm.clone(), hasher);
    }

    /// Look up a hasher by name, ignoring ASCII case.
    pub fn get(&self, name: &str) -> Result<Hasher, DigestError> {
        self.hashers
            .get(&name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| DigestError::UnsupportedAlgorithm {
                algorithm: name.to_string(),
            })
    }

    /// Registered algorithm names in sorted order.
    pub fn algorithms(&self) -> impl Iterator<Item = &str> {
        self.hashers.keys().map(String::as_str)
    }
}

impl Default for HasherRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_contain_sha256_and_sha512() {
        let registry = HasherRegistry::with_defaults();
        let names: Vec<&str> = registry.algorithms().collect();
        assert_eq!(names, vec!["sha256", "sha512"]);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let registry = HasherRegistry::with_defaults();
        assert_eq!(registry.get("SHA256").unwrap().algorithm(), "sha256");
        assert_eq!(registry.get("Sha512").unwrap().algorithm(), "sha512");
    }

    #[test]
    fn unknown_algorithm_fails() {
        let registry = HasherRegistry::with_defaults();
        match registry.get("md5") {
            Err(DigestError::UnsupportedAlgorithm { algorithm }) => assert_eq!(algorithm, "md5"),
            other => panic!("expected UnsupportedAlgorithm, got {other:?}"),
        }
    }

    #[test]
    fn empty_registry_rejects_everything() {
        assert!(HasherRegistry::new().get(SHA256).is_err());
    }

    #[test]
    fn injected_fake_hasher() {
        let mut registry = HasherRegistry::new();
        registry.register("fake", |data| vec![data.len() as u8]);
        let hasher = registry.get("FAKE").unwrap();
        assert_eq!(hasher.hash_hex(b"abc"), "03");
    }

    #[test]
    fn sha256_known_vector() {
        // SHA256("{}")
        assert_eq!(
            Hasher::sha256().hash_hex(b"{}"),
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
    }
}
