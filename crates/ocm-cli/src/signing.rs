//! # Signing Subcommands
//!
//! `keygen`, `sign` and `verify` over component descriptor files.
//!
//! ## Security Invariant
//!
//! Signatures always cover the normalised descriptor digest, never the
//! YAML bytes on disk. Reformatting a signed descriptor does not
//! invalidate it; changing any digested field does.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, ValueEnum};

use ocm_core::HasherRegistry;
use ocm_crypto::{
    generate_key_pair, load_signer, load_verifier, sign_component_descriptor,
    verify_signed_component_descriptor, KeyAlgorithm, SignatureEncoding, SignatureError,
};

use crate::config::OcmConfig;

/// Signature payload encoding on the command line.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum EncodingArg {
    #[default]
    Hex,
    Pem,
}

impl From<EncodingArg> for SignatureEncoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Hex => SignatureEncoding::Hex,
            EncodingArg::Pem => SignatureEncoding::Pem,
        }
    }
}

/// Arguments for `ocm keygen`.
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Output directory for the key files.
    #[arg(long, short, default_value = ".")]
    pub output: PathBuf,
    /// Prefix for the key file names.
    #[arg(long, default_value = "ocm")]
    pub prefix: String,
    /// Key algorithm: rsa or ed25519 (default from configuration).
    #[arg(long)]
    pub algorithm: Option<String>,
    /// RSA modulus size in bits.
    #[arg(long)]
    pub bits: Option<usize>,
}

/// Arguments for `ocm sign`.
#[derive(Args, Debug)]
pub struct SignArgs {
    /// Path to the component descriptor YAML.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
    /// PEM private key (default from configuration).
    #[arg(long)]
    pub key: Option<PathBuf>,
    /// Key algorithm: rsa or ed25519 (default from configuration).
    #[arg(long)]
    pub algorithm: Option<String>,
    /// Signature name (default from configuration).
    #[arg(long)]
    pub name: Option<String>,
    /// Hash algorithm (default from configuration).
    #[arg(long)]
    pub hash_algorithm: Option<String>,
    /// Signature payload encoding for RSA keys.
    #[arg(long, value_enum, default_value_t = EncodingArg::Hex)]
    pub encoding: EncodingArg,
    /// Write the signed descriptor here instead of in place.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Arguments for `ocm verify`.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Path to the signed component descriptor YAML.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
    /// PEM public key (default from configuration).
    #[arg(long)]
    pub public_key: Option<PathBuf>,
    /// Key algorithm: rsa or ed25519 (default from configuration).
    #[arg(long)]
    pub algorithm: Option<String>,
    /// Signature name (default from configuration).
    #[arg(long)]
    pub name: Option<String>,
}

fn key_algorithm(arg: Option<&str>, config: &OcmConfig) -> Result<KeyAlgorithm> {
    match arg {
        Some(raw) => raw.parse().map_err(|e| anyhow!("{e}")),
        None => Ok(config.key_algorithm()?),
    }
}

fn key_path(arg: Option<&Path>, configured: Option<&Path>, flag: &str, base: &Path) -> Result<PathBuf> {
    match arg {
        Some(path) => Ok(crate::resolve_path(path, base)),
        None => configured
            .map(Path::to_path_buf)
            .ok_or_else(|| anyhow!("no key given: pass {flag} or set it in the configuration file")),
    }
}

/// Execute `ocm keygen`.
pub fn run_keygen(args: &KeygenArgs, config: &OcmConfig, base: &Path) -> Result<u8> {
    let output_dir = crate::resolve_path(&args.output, base);
    let algorithm = key_algorithm(args.algorithm.as_deref(), config)?;

    std::fs::create_dir_all(&output_dir).with_context(|| {
        format!(
            "failed to create output directory: {}",
            output_dir.display()
        )
    })?;

    let pair = generate_key_pair(algorithm, args.bits).context("failed to generate key pair")?;
    let private_path = output_dir.join(format!("{}.key", args.prefix));
    let public_path = output_dir.join(format!("{}.pub", args.prefix));

    std::fs::write(&private_path, &pair.private_pem)
        .with_context(|| format!("failed to write private key: {}", private_path.display()))?;
    std::fs::write(&public_path, &pair.public_pem)
        .with_context(|| format!("failed to write public key: {}", public_path.display()))?;

    println!("OK: generated {algorithm} key pair");
    println!("  Private key: {}", private_path.display());
    println!("  Public key:  {}", public_path.display());
    Ok(0)
}

/// Execute `ocm sign`.
pub fn run_sign(args: &SignArgs, config: &OcmConfig, base: &Path) -> Result<u8> {
    let file = crate::resolve_path(&args.file, base);
    let key = key_path(
        args.key.as_deref(),
        config.signing_key.as_deref(),
        "--key",
        base,
    )?;
    let algorithm = key_algorithm(args.algorithm.as_deref(), config)?;
    let name = args.name.as_deref().unwrap_or(&config.signature_name);
    let hash_algorithm = args
        .hash_algorithm
        .as_deref()
        .unwrap_or(&config.hash_algorithm);

    let mut cd = crate::read_descriptor(&file)?;
    let signer = load_signer(algorithm, &key, args.encoding.into())
        .with_context(|| format!("failed to load private key: {}", key.display()))?;
    let hasher = HasherRegistry::with_defaults().get(hash_algorithm)?;
    sign_component_descriptor(&mut cd, signer.as_ref(), &hasher, name)
        .with_context(|| format!("failed to sign {cd}"))?;

    let output = args
        .output
        .as_ref()
        .map(|p| crate::resolve_path(p, base))
        .unwrap_or(file);
    crate::write_descriptor(&output, &cd)?;
    println!("OK: signed {cd} as {name:?}");
    println!("  Descriptor: {}", output.display());
    Ok(0)
}

/// Execute `ocm verify`. Returns `1` when verification fails.
pub fn run_verify(args: &VerifyArgs, config: &OcmConfig, base: &Path) -> Result<u8> {
    let file = crate::resolve_path(&args.file, base);
    let key = key_path(
        args.public_key.as_deref(),
        config.verification_key.as_deref(),
        "--public-key",
        base,
    )?;
    let algorithm = key_algorithm(args.algorithm.as_deref(), config)?;
    let name = args.name.as_deref().unwrap_or(&config.signature_name);

    let cd = crate::read_descriptor(&file)?;
    let verifier = load_verifier(algorithm, &key)
        .with_context(|| format!("failed to load public key: {}", key.display()))?;

    match verify_signed_component_descriptor(
        &cd,
        verifier.as_ref(),
        &HasherRegistry::with_defaults(),
        name,
    ) {
        Ok(()) => {
            println!("OK: signature {name:?} of {cd} is valid");
            Ok(0)
        }
        Err(e @ SignatureError::SignatureNotFound { .. }) => bail!(e),
        Err(e) => {
            println!("FAIL: {e}");
            Ok(1)
        }
    }
}
