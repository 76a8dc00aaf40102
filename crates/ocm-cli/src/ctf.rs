//! # Transport Archive Subcommands
//!
//! `ocm ctf create | add | list | convert`.
//!
//! Archives are always closed before the handler returns, so staging
//! directories never outlive a command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use ocm_ctf::{ArchiveFormat, ComponentArchive, OpenMode, OsFileSystem, TransportArchive};

use crate::config::OcmConfig;

/// Arguments for `ocm ctf`.
#[derive(Args, Debug)]
pub struct CtfArgs {
    #[command(subcommand)]
    pub command: CtfCommand,
}

/// Transport archive subcommands.
#[derive(Subcommand, Debug)]
pub enum CtfCommand {
    /// Create an empty transport archive.
    Create {
        /// Path of the new archive.
        #[arg(value_name = "CTF")]
        path: PathBuf,
        /// Backing format: fs, tar or tgz (default from configuration).
        #[arg(long)]
        format: Option<String>,
    },

    /// Add a component archive (directory, tar or tgz) to a transport archive.
    Add {
        /// Transport archive to modify. Created if missing.
        #[arg(value_name = "CTF")]
        path: PathBuf,
        /// Component archive to add.
        #[arg(value_name = "COMPONENT_ARCHIVE")]
        component: PathBuf,
        /// Entry format: tar or tgz (default from configuration).
        #[arg(long)]
        format: Option<String>,
        /// Entry name; defaults to the component archive digest.
        #[arg(long)]
        name: Option<String>,
    },

    /// List the component archives in a transport archive.
    List {
        /// Transport archive to read.
        #[arg(value_name = "CTF")]
        path: PathBuf,
    },

    /// Write a transport archive in another format.
    Convert {
        /// Source transport archive.
        #[arg(value_name = "SOURCE")]
        source: PathBuf,
        /// Target path.
        #[arg(value_name = "TARGET")]
        target: PathBuf,
        /// Target format: fs, tar or tgz (default from configuration).
        #[arg(long)]
        format: Option<String>,
    },
}

/// Execute the ctf subcommand.
pub fn run_ctf(args: &CtfArgs, config: &OcmConfig, base: &Path) -> Result<u8> {
    match &args.command {
        CtfCommand::Create { path, format } => {
            let format = resolve_format(format.as_deref(), config)?;
            cmd_create(&crate::resolve_path(path, base), format)
        }
        CtfCommand::Add {
            path,
            component,
            format,
            name,
        } => {
            let format = resolve_format(format.as_deref(), config)?;
            cmd_add(
                &crate::resolve_path(path, base),
                &crate::resolve_path(component, base),
                format,
                name.as_deref(),
                config,
            )
        }
        CtfCommand::List { path } => cmd_list(&crate::resolve_path(path, base)),
        CtfCommand::Convert {
            source,
            target,
            format,
        } => {
            let format = resolve_format(format.as_deref(), config)?;
            cmd_convert(
                &crate::resolve_path(source, base),
                &crate::resolve_path(target, base),
                format,
            )
        }
    }
}

fn resolve_format(arg: Option<&str>, config: &OcmConfig) -> Result<ArchiveFormat> {
    match arg {
        Some(raw) => Ok(raw.parse()?),
        None => Ok(config.archive_format()?),
    }
}

fn open_mode(format: ArchiveFormat) -> OpenMode {
    match format {
        ArchiveFormat::Filesystem => OpenMode::Directory,
        ArchiveFormat::Tar => OpenMode::Tar,
        ArchiveFormat::TarGzip => OpenMode::TarGzip,
    }
}

fn cmd_create(path: &Path, format: ArchiveFormat) -> Result<u8> {
    let mut ctf = TransportArchive::open_os(path, open_mode(format))
        .with_context(|| format!("failed to create transport archive: {}", path.display()))?;
    ctf.close()?;
    println!("OK: created {format} transport archive {}", path.display());
    Ok(0)
}

fn read_component_archive(path: &Path) -> Result<ComponentArchive> {
    let is_dir = path
        .metadata()
        .with_context(|| format!("component archive not found: {}", path.display()))?
        .is_dir();
    let ca = if is_dir {
        ComponentArchive::read_from_filesystem(&OsFileSystem, path)?
    } else {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open component archive: {}", path.display()))?;
        ComponentArchive::read_from(std::io::BufReader::new(file), &path.display().to_string())?
    };
    Ok(ca)
}

fn cmd_add(
    path: &Path,
    component: &Path,
    format: ArchiveFormat,
    name: Option<&str>,
    config: &OcmConfig,
) -> Result<u8> {
    let ca = read_component_archive(component)?;
    // A missing archive is created in the configured backing format.
    let mode = if path.exists() {
        OpenMode::Open
    } else {
        open_mode(config.archive_format()?)
    };
    let mut ctf = TransportArchive::open_os(path, mode)
        .with_context(|| format!("failed to open transport archive: {}", path.display()))?;

    let entry = match name {
        Some(name) => {
            ctf.add_component_archive_with_name(name, &ca, format)?;
            name.to_string()
        }
        None => ctf.add_component_archive(&ca, format)?,
    };
    ctf.write()
        .with_context(|| format!("failed to write transport archive: {}", path.display()))?;
    ctf.close()?;

    println!("OK: added {} as {entry}", ca.descriptor());
    Ok(0)
}

fn cmd_list(path: &Path) -> Result<u8> {
    let mut ctf = TransportArchive::open_os(path, OpenMode::Open)
        .with_context(|| format!("failed to open transport archive: {}", path.display()))?;
    ctf.walk(|entry, ca| {
        let blobs = ca.blob_names().count();
        println!("{entry}\t{}\t{blobs} blob(s)", ca.descriptor());
        Ok(())
    })?;
    ctf.close()?;
    Ok(0)
}

fn cmd_convert(source: &Path, target: &Path, format: ArchiveFormat) -> Result<u8> {
    let mut ctf = TransportArchive::open_os(source, OpenMode::Open)
        .with_context(|| format!("failed to open transport archive: {}", source.display()))?;
    ctf.write_to_archive(target, format)
        .with_context(|| format!("failed to write {}", target.display()))?;
    ctf.close()?;
    println!(
        "OK: wrote {} as {format} to {}",
        source.display(),
        target.display()
    );
    Ok(0)
}
