//! CLI configuration.
//!
//! Settings come from three layers, later layers winning: built-in
//! defaults, an optional YAML file given with `--config`, and environment
//! variables. Command-line flags override all three.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use ocm_core::{HasherRegistry, SHA256};
use ocm_crypto::KeyAlgorithm;
use ocm_ctf::ArchiveFormat;

/// Hash algorithm for new digests and signatures.
pub const ENV_HASH_ALGORITHM: &str = "OCM_HASH_ALGORITHM";
/// Signature name used by `sign` and `verify`.
pub const ENV_SIGNATURE_NAME: &str = "OCM_SIGNATURE_NAME";
/// Container format for new transport archives and entries.
pub const ENV_CTF_FORMAT: &str = "OCM_CTF_FORMAT";

/// Effective CLI settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct OcmConfig {
    /// Default: `sha256`.
    pub hash_algorithm: String,
    /// Default: `default`.
    pub signature_name: String,
    /// Default: `tgz`.
    pub ctf_format: String,
    /// Default: `rsa`.
    pub key_algorithm: String,
    /// Private key used by `sign` when `--key` is absent.
    pub signing_key: Option<PathBuf>,
    /// Public key used by `verify` when `--public-key` is absent.
    pub verification_key: Option<PathBuf>,
}

impl Default for OcmConfig {
    fn default() -> Self {
        Self {
            hash_algorithm: SHA256.to_string(),
            signature_name: "default".to_string(),
            ctf_format: ArchiveFormat::TarGzip.to_string(),
            key_algorithm: KeyAlgorithm::Rsa.to_string(),
            signing_key: None,
            verification_key: None,
        }
    }
}

impl OcmConfig {
    /// Load defaults, then `file` if given, then the process environment.
    ///
    /// Relative key paths in the file are resolved against the file's
    /// directory.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for key in [&mut config.signing_key, &mut config.verification_key]
            .into_iter()
            .flatten()
        {
            *key = crate::resolve_path(key, base);
        }
        Ok(config)
    }

    /// Override settings from environment variables looked up via `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup(ENV_HASH_ALGORITHM) {
            self.hash_algorithm = v;
        }
        if let Some(v) = lookup(ENV_SIGNATURE_NAME) {
            self.signature_name = v;
        }
        if let Some(v) = lookup(ENV_CTF_FORMAT) {
            self.ctf_format = v;
        }
    }

    /// Reject settings that would only fail later, mid-operation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        HasherRegistry::with_defaults()
            .get(&self.hash_algorithm)
            .map_err(|e| invalid("hashAlgorithm", &self.hash_algorithm, e))?;
        self.archive_format()?;
        self.key_algorithm()?;
        if self.signature_name.trim().is_empty() {
            return Err(invalid(
                "signatureName",
                &self.signature_name,
                "must not be empty",
            ));
        }
        Ok(())
    }

    pub fn archive_format(&self) -> Result<ArchiveFormat, ConfigError> {
        self.ctf_format
            .parse()
            .map_err(|e| invalid("ctfFormat", &self.ctf_format, e))
    }

    pub fn key_algorithm(&self) -> Result<KeyAlgorithm, ConfigError> {
        self.key_algorithm
            .parse()
            .map_err(|e| invalid("keyAlgorithm", &self.key_algorithm, e))
    }
}

fn invalid(setting: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        setting,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid {setting} {value:?}: {reason}")]
    InvalidValue {
        setting: &'static str,
        value: String,
        reason: String,
    },
}
