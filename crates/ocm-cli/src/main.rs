//! # ocm CLI entry point
//!
//! Parses command-line arguments, loads configuration, and dispatches to
//! subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ocm_cli::ctf::{run_ctf, CtfArgs};
use ocm_cli::digest::{run_digest, DigestArgs};
use ocm_cli::signing::{run_keygen, run_sign, run_verify, KeygenArgs, SignArgs, VerifyArgs};
use ocm_cli::OcmConfig;

/// Component descriptor integrity toolchain.
///
/// Computes normalised digests, signs and verifies component descriptors,
/// and packs component archives into transport archives.
#[derive(Parser, Debug)]
#[command(name = "ocm", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the normalised digest of a component descriptor.
    Digest(DigestArgs),

    /// Generate an RSA or Ed25519 key pair as PEM files.
    Keygen(KeygenArgs),

    /// Sign a component descriptor and append the signature.
    Sign(SignArgs),

    /// Verify a named signature of a component descriptor.
    Verify(VerifyArgs),

    /// Transport archive management (create, add, list, convert).
    Ctf(CtfArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity level.
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match OcmConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::from(2);
        }
    };
    tracing::debug!(?config, "loaded configuration");

    let base = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let result = match cli.command {
        Commands::Digest(args) => run_digest(&args, &config, &base),
        Commands::Keygen(args) => run_keygen(&args, &config, &base),
        Commands::Sign(args) => run_sign(&args, &config, &base),
        Commands::Verify(args) => run_verify(&args, &config, &base),
        Commands::Ctf(args) => run_ctf(&args, &config, &base),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
