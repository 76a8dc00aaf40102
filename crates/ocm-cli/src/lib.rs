//! # ocm-cli: Component Descriptor Integrity CLI
//!
//! Provides the `ocm` command-line interface over `ocm-core`, `ocm-crypto`
//! and `ocm-ctf`.
//!
//! ## Subcommands
//!
//! - `ocm digest`: Normalised descriptor and element digests.
//! - `ocm keygen`: RSA or Ed25519 key pair generation (PEM).
//! - `ocm sign`: Sign a descriptor and append the signature.
//! - `ocm verify`: Verify a named signature against a public key.
//! - `ocm ctf`: Create, fill, list and convert transport archives.
//!
//! ```bash
//! ocm keygen --output keys --prefix release
//! ocm sign component-descriptor.yaml --key keys/release.key --name release
//! ocm verify component-descriptor.yaml --public-key keys/release.pub --name release
//! ocm ctf add transport.tgz ./my-component
//! ```
//!
//! Every handler returns a process exit code: `0` on success, `1` when a
//! check fails. Errors are reported through `anyhow` with context.

pub mod config;
pub mod ctf;
pub mod digest;
pub mod signing;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ocm_core::ComponentDescriptor;

pub use config::{ConfigError, OcmConfig};

/// Resolve `path` against `base` unless it is already absolute.
pub fn resolve_path(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Read a component descriptor YAML file.
pub fn read_descriptor(path: &Path) -> Result<ComponentDescriptor> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read descriptor: {}", path.display()))?;
    serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse descriptor: {}", path.display()))
}

/// Write a component descriptor as YAML.
pub fn write_descriptor(path: &Path, descriptor: &ComponentDescriptor) -> Result<()> {
    let yaml = serde_yaml::to_string(descriptor).context("failed to serialize descriptor")?;
    std::fs::write(path, yaml)
        .with_context(|| format!("failed to write descriptor: {}", path.display()))
}
