//! # Transport Archive (CTF)
//!
//! A container of component archives backed by a directory, a tar file or
//! a gzip tar file.
//!
//! Directory backings are used in place. Tar and tgz backings are expanded
//! into a private staging directory on open; [`TransportArchive::write`]
//! packs the staging directory back into the original file in its original
//! format. Entries are component archives stored as tar or tgz files named
//! by their content digest.
//!
//! ## Lifecycle
//!
//! ```text
//! open ──▶ Directory ─────────────┐
//!     └──▶ Expanded{format, dir} ─┴─ close ──▶ Closed
//! ```
//!
//! Exports go to the archive's own filesystem by default; the `*_on`
//! variants write to another one, e.g. from a
//! [`MemoryFileSystem`](crate::fs::MemoryFileSystem) staging area onto disk.
//!
//! Every operation on a closed archive fails with
//! [`CtfError::ArchiveClosed`]. Dropping an open archive closes it; errors
//! during that implicit close are logged and otherwise ignored.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::archive::{self, ArchiveFormat};
use crate::component_archive::ComponentArchive;
use crate::error::CtfError;
use crate::fs::{self, FileSystem, OsFileSystem};

/// How [`TransportArchive::open`] treats the target path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// The path must exist; its kind decides the backing.
    Open,
    /// Open or create a directory backing.
    Directory,
    /// Open or create a tar backing.
    Tar,
    /// Open or create a gzip tar backing.
    TarGzip,
}

impl OpenMode {
    fn wants_archive(&self) -> bool {
        matches!(self, Self::Tar | Self::TarGzip)
    }
}

#[derive(Debug)]
enum Backing {
    Directory,
    Expanded {
        format: ArchiveFormat,
        staging: PathBuf,
    },
    Closed,
}

/// An open transport archive.
#[derive(Debug)]
pub struct TransportArchive {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
    backing: Backing,
}

impl TransportArchive {
    /// Open (or create, depending on `mode`) the archive at `path`.
    pub fn open(
        fs: Arc<dyn FileSystem>,
        path: impl Into<PathBuf>,
        mode: OpenMode,
    ) -> Result<Self, CtfError> {
        let path = path.into();
        let info = match fs.stat(&path) {
            Ok(info) => info,
            Err(e) if e.kind() == io::ErrorKind::NotFound && mode != OpenMode::Open => {
                Self::create(fs.as_ref(), &path, mode)?;
                fs.stat(&path).map_err(CtfError::io(&path))?
            }
            Err(e) => return Err(CtfError::io(&path)(e)),
        };

        let backing = if info.is_dir {
            if mode.wants_archive() {
                return Err(CtfError::ArchiveKindMismatch {
                    path,
                    expected: "archive",
                    found: "directory",
                });
            }
            Backing::Directory
        } else {
            if mode == OpenMode::Directory {
                return Err(CtfError::ArchiveKindMismatch {
                    path,
                    expected: "directory",
                    found: "archive",
                });
            }
            Self::expand(fs.as_ref(), &path)?
        };

        tracing::info!(path = %path.display(), backing = ?backing, "opened transport archive");
        Ok(Self { fs, path, backing })
    }

    /// Open an archive on the local filesystem.
    pub fn open_os(path: impl Into<PathBuf>, mode: OpenMode) -> Result<Self, CtfError> {
        Self::open(Arc::new(OsFileSystem), path, mode)
    }

    fn create(fs: &dyn FileSystem, path: &Path, mode: OpenMode) -> Result<(), CtfError> {
        tracing::debug!(path = %path.display(), ?mode, "creating transport archive");
        match mode {
            OpenMode::Directory => fs.create_dir_all(path).map_err(CtfError::io(path)),
            OpenMode::Tar => archive::write_empty(fs, path, ArchiveFormat::Tar),
            OpenMode::TarGzip => archive::write_empty(fs, path, ArchiveFormat::TarGzip),
            OpenMode::Open => Err(CtfError::io(path)(io::ErrorKind::NotFound.into())),
        }
    }

    fn expand(fs: &dyn FileSystem, path: &Path) -> Result<Backing, CtfError> {
        let staging = fs.temp_dir("ctf-").map_err(CtfError::io(path))?;
        match archive::extract_to(fs, path, &staging) {
            Ok(format) => Ok(Backing::Expanded { format, staging }),
            Err(e) => {
                if let Err(cleanup) = fs.remove_all(&staging) {
                    tracing::warn!(
                        staging = %staging.display(),
                        error = %cleanup,
                        "failed to remove staging directory"
                    );
                }
                Err(e)
            }
        }
    }

    /// The path this archive was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Backing format, or `None` once closed.
    pub fn format(&self) -> Option<ArchiveFormat> {
        match &self.backing {
            Backing::Directory => Some(ArchiveFormat::Filesystem),
            Backing::Expanded { format, .. } => Some(*format),
            Backing::Closed => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.backing, Backing::Closed)
    }

    /// Directory holding the entries: the backing directory itself or the
    /// staging directory.
    pub fn root(&self) -> Result<&Path, CtfError> {
        match &self.backing {
            Backing::Directory => Ok(&self.path),
            Backing::Expanded { staging, .. } => Ok(staging),
            Backing::Closed => Err(CtfError::ArchiveClosed {
                path: self.path.clone(),
            }),
        }
    }

    /// Entry names, sorted.
    pub fn entries(&self) -> Result<Vec<String>, CtfError> {
        let root = self.root()?;
        let mut names = self
            .fs
            .list_files(root)
            .map_err(CtfError::io(root))?
            .iter()
            .map(|p| archive::sanitize_entry_path(p))
            .collect::<Result<Vec<_>, _>>()?;
        names.sort();
        Ok(names)
    }

    /// Visit every component archive in sorted entry order.
    ///
    /// Stops at the first error from reading an entry or from `visit`.
    pub fn walk<F>(&self, mut visit: F) -> Result<(), CtfError>
    where
        F: FnMut(&str, &ComponentArchive) -> Result<(), CtfError>,
    {
        for name in self.entries()? {
            let ca = self.get_component_archive(&name)?;
            visit(&name, &ca)?;
        }
        Ok(())
    }

    /// Read one entry.
    pub fn get_component_archive(&self, name: &str) -> Result<ComponentArchive, CtfError> {
        let root = self.root()?;
        let entry = archive::sanitize_entry_path(Path::new(name))?;
        let path = root.join(&entry);
        let reader = match self.fs.open(&path) {
            Ok(reader) => reader,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CtfError::EntryNotFound { name: entry })
            }
            Err(e) => return Err(CtfError::io(&path)(e)),
        };
        ComponentArchive::read_from(reader, &entry)
    }

    /// Add or replace a component archive, named by its content digest.
    ///
    /// Returns the entry name.
    pub fn add_component_archive(
        &mut self,
        ca: &ComponentArchive,
        format: ArchiveFormat,
    ) -> Result<String, CtfError> {
        let name = ca.digest()?;
        self.add_component_archive_with_name(&name, ca, format)?;
        Ok(name)
    }

    /// Add or replace a component archive under `name`.
    pub fn add_component_archive_with_name(
        &mut self,
        name: &str,
        ca: &ComponentArchive,
        format: ArchiveFormat,
    ) -> Result<(), CtfError> {
        if format == ArchiveFormat::Filesystem {
            return Err(CtfError::UnsupportedFormat {
                format: format.to_string(),
            });
        }
        let entry = archive::sanitize_entry_path(Path::new(name))?;
        let path = self.root()?.join(&entry);
        let file = fs::create_with_parents(self.fs.as_ref(), &path).map_err(CtfError::io(&path))?;
        let mut file = ca.write_archive(file, format)?;
        file.flush().map_err(CtfError::io(&path))?;
        tracing::info!(
            entry = %entry,
            component = %ca.descriptor(),
            %format,
            "added component archive"
        );
        Ok(())
    }

    /// Persist staged changes into the original backing file.
    ///
    /// A no-op for directory backings, which are modified in place.
    pub fn write(&self) -> Result<(), CtfError> {
        match &self.backing {
            Backing::Directory => Ok(()),
            Backing::Expanded { format, .. } => self.write_to_archive(&self.path, *format),
            Backing::Closed => Err(CtfError::ArchiveClosed {
                path: self.path.clone(),
            }),
        }
    }

    /// Copy all entries into the directory `target`, creating it if needed.
    pub fn write_to_filesystem(&self, target: &Path) -> Result<(), CtfError> {
        self.write_to_filesystem_on(self.fs.as_ref(), target)
    }

    /// Copy all entries into the directory `target` on `dest`.
    ///
    /// Fails with [`CtfError::ExportIntoArchive`] when `target` is the
    /// archive root or lies below it.
    pub fn write_to_filesystem_on(
        &self,
        dest: &dyn FileSystem,
        target: &Path,
    ) -> Result<(), CtfError> {
        let root = self.root()?;
        self.check_export_target(dest, target)?;
        match dest.stat(target) {
            Ok(info) if !info.is_dir => {
                return Err(CtfError::ArchiveKindMismatch {
                    path: target.to_path_buf(),
                    expected: "directory",
                    found: "file",
                })
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(CtfError::io(target)(e)),
        }
        dest.create_dir_all(target).map_err(CtfError::io(target))?;

        let mut count = 0;
        for relative in self.fs.list_files(root).map_err(CtfError::io(root))? {
            let name = archive::sanitize_entry_path(&relative)?;
            let source = root.join(&relative);
            let path = target.join(&name);
            tracing::debug!(from = %source.display(), to = %path.display(), "copying entry");
            let mut reader = self.fs.open(&source).map_err(CtfError::io(&source))?;
            let mut writer = fs::create_with_parents(dest, &path).map_err(CtfError::io(&path))?;
            io::copy(&mut reader, &mut writer).map_err(CtfError::io(&path))?;
            writer.flush().map_err(CtfError::io(&path))?;
            count += 1;
        }
        tracing::info!(target = %target.display(), entries = count, "exported transport archive");
        Ok(())
    }

    /// Pack all entries into a tar or tgz file at `target`.
    pub fn write_to_archive(&self, target: &Path, format: ArchiveFormat) -> Result<(), CtfError> {
        self.write_to_archive_on(self.fs.as_ref(), target, format)
    }

    /// Pack all entries into a tar or tgz file at `target` on `dest`.
    ///
    /// [`ArchiveFormat::Filesystem`] exports a directory instead.
    pub fn write_to_archive_on(
        &self,
        dest: &dyn FileSystem,
        target: &Path,
        format: ArchiveFormat,
    ) -> Result<(), CtfError> {
        let root = self.root()?;
        if format == ArchiveFormat::Filesystem {
            return self.write_to_filesystem_on(dest, target);
        }
        self.check_export_target(dest, target)?;
        let count = archive::pack_directory(self.fs.as_ref(), root, dest, target, format)?;
        tracing::info!(target = %target.display(), %format, entries = count, "wrote transport archive");
        Ok(())
    }

    /// Reject targets at or below the archive root. Both sides are compared
    /// in resolved form, so `.` segments and links cannot hide an overlap.
    fn check_export_target(&self, dest: &dyn FileSystem, target: &Path) -> Result<(), CtfError> {
        let root = fs::resolve_path(self.fs.as_ref(), self.root()?);
        if fs::resolve_path(dest, target).starts_with(&root) {
            return Err(CtfError::ExportIntoArchive {
                target: target.to_path_buf(),
                root,
            });
        }
        Ok(())
    }

    /// Release the staging directory. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<(), CtfError> {
        match std::mem::replace(&mut self.backing, Backing::Closed) {
            Backing::Expanded { staging, .. } => {
                tracing::debug!(staging = %staging.display(), "removing staging directory");
                self.fs.remove_all(&staging).map_err(CtfError::io(&staging))
            }
            Backing::Directory | Backing::Closed => Ok(()),
        }
    }
}

impl Drop for TransportArchive {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to close transport archive");
        }
    }
}
