//! # Archive Codec: Directory, Tar, Gzip+Tar
//!
//! Reading and writing of the tar streams shared by transport archives and
//! component archives.
//!
//! ## Entry Rules
//!
//! - Entry names are forward-slash relative paths. Absolute paths and `..`
//!   components are rejected with [`CtfError::UnsafeEntryPath`].
//! - Directories are never written as entries; on read they are skipped.
//! - Headers are deterministic: entries sorted by name, mode `0644`,
//!   mtime `0`, uid/gid `0`. The same content always packs to the same
//!   bytes, which is what makes component archive digests stable.
//! - Gzip input is recognised by its magic bytes, not by file name.

use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Component, Path};
use std::str::FromStr;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::CtfError;
use crate::fs::{self, FileSystem};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Container format of an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    /// A plain directory tree.
    Filesystem,
    /// A POSIX tar stream.
    Tar,
    /// A gzip-compressed tar stream.
    TarGzip,
}

impl ArchiveFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Filesystem => "fs",
            Self::Tar => "tar",
            Self::TarGzip => "tgz",
        }
    }

    fn is_gzip(&self) -> bool {
        matches!(self, Self::TarGzip)
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArchiveFormat {
    type Err = CtfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fs" | "dir" | "directory" => Ok(Self::Filesystem),
            "tar" => Ok(Self::Tar),
            "tgz" | "tar.gz" | "targz" => Ok(Self::TarGzip),
            _ => Err(CtfError::UnsupportedFormat {
                format: s.to_string(),
            }),
        }
    }
}

/// Validate an entry path and render it as a forward-slash relative name.
pub fn sanitize_entry_path(path: &Path) -> Result<String, CtfError> {
    let unsafe_path = || CtfError::UnsafeEntryPath {
        path: path.display().to_string(),
    };
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str().ok_or_else(unsafe_path)?),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(unsafe_path())
            }
        }
    }
    if parts.is_empty() {
        return Err(unsafe_path());
    }
    Ok(parts.join("/"))
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

enum Sink<W: Write> {
    Plain(W),
    Gzip(GzEncoder<W>),
}

impl<W: Write> Write for Sink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            Self::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::Gzip(w) => w.flush(),
        }
    }
}

/// Deterministic tar (optionally gzip) writer.
pub(crate) struct TarWriter<W: Write> {
    builder: tar::Builder<Sink<W>>,
}

impl<W: Write> TarWriter<W> {
    /// `format` must be [`ArchiveFormat::Tar`] or [`ArchiveFormat::TarGzip`].
    pub(crate) fn new(writer: W, format: ArchiveFormat) -> Self {
        let sink = if format.is_gzip() {
            Sink::Gzip(GzEncoder::new(writer, Compression::default()))
        } else {
            Sink::Plain(writer)
        };
        Self {
            builder: tar::Builder::new(sink),
        }
    }

    pub(crate) fn append(&mut self, name: &str, size: u64, data: impl Read) -> io::Result<()> {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(size);
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);
        self.builder.append_data(&mut header, name, data)
    }

    /// Write the end-of-archive marker, finish compression, and flush.
    pub(crate) fn finish(self) -> io::Result<W> {
        let mut inner = match self.builder.into_inner()? {
            Sink::Plain(w) => w,
            Sink::Gzip(encoder) => encoder.finish()?,
        };
        inner.flush()?;
        Ok(inner)
    }
}

/// Write an empty but valid archive to `path`.
pub(crate) fn write_empty(
    fs: &dyn FileSystem,
    path: &Path,
    format: ArchiveFormat,
) -> Result<(), CtfError> {
    let file = fs::create_with_parents(fs, path).map_err(CtfError::io(path))?;
    TarWriter::new(file, format)
        .finish()
        .map_err(CtfError::io(path))?;
    Ok(())
}

/// Pack every file below `root` on `src` into a tar (or tgz) at `target`
/// on `dest`.
///
/// Returns the number of entries written.
pub(crate) fn pack_directory(
    src: &dyn FileSystem,
    root: &Path,
    dest: &dyn FileSystem,
    target: &Path,
    format: ArchiveFormat,
) -> Result<usize, CtfError> {
    let mut names = src
        .list_files(root)
        .map_err(CtfError::io(root))?
        .into_iter()
        .map(|relative| Ok((sanitize_entry_path(&relative)?, relative)))
        .collect::<Result<Vec<_>, CtfError>>()?;
    names.sort_by(|a, b| a.0.cmp(&b.0));

    let file = fs::create_with_parents(dest, target).map_err(CtfError::io(target))?;
    let mut writer = TarWriter::new(file, format);
    for (name, relative) in &names {
        let source = root.join(relative);
        let info = src.stat(&source).map_err(CtfError::io(&source))?;
        let reader = src.open(&source).map_err(CtfError::io(&source))?;
        writer
            .append(name, info.size, reader)
            .map_err(CtfError::io(target))?;
    }
    writer.finish().map_err(CtfError::io(target))?;
    Ok(names.len())
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Visit every regular file entry of a tar or tgz stream.
///
/// Returns the detected format. `source` names the stream in errors.
pub(crate) fn for_each_entry<R, F>(
    reader: R,
    source: &Path,
    mut visit: F,
) -> Result<ArchiveFormat, CtfError>
where
    R: Read,
    F: FnMut(&str, &mut dyn Read) -> Result<(), CtfError>,
{
    let mut reader = BufReader::new(reader);
    let is_gzip = reader
        .fill_buf()
        .map_err(CtfError::io(source))?
        .starts_with(&GZIP_MAGIC);
    if is_gzip {
        visit_entries(GzDecoder::new(reader), source, &mut visit)?;
        Ok(ArchiveFormat::TarGzip)
    } else {
        visit_entries(reader, source, &mut visit)?;
        Ok(ArchiveFormat::Tar)
    }
}

fn visit_entries<R, F>(stream: R, source: &Path, visit: &mut F) -> Result<(), CtfError>
where
    R: Read,
    F: FnMut(&str, &mut dyn Read) -> Result<(), CtfError>,
{
    let mut archive = tar::Archive::new(stream);
    for entry in archive.entries().map_err(CtfError::io(source))? {
        let mut entry = entry.map_err(CtfError::io(source))?;
        let entry_type = entry.header().entry_type();
        if entry_type.is_dir() {
            continue;
        }
        let path = entry.path().map_err(CtfError::io(source))?.into_owned();
        if !entry_type.is_file() {
            tracing::debug!(entry = %path.display(), "skipping non-regular tar entry");
            continue;
        }
        let name = sanitize_entry_path(&path)?;
        visit(&name, &mut entry)?;
    }
    Ok(())
}

/// Expand a tar or tgz file into `dest`. Returns the detected format.
pub(crate) fn extract_to(
    fs: &dyn FileSystem,
    archive_path: &Path,
    dest: &Path,
) -> Result<ArchiveFormat, CtfError> {
    let file = fs.open(archive_path).map_err(CtfError::io(archive_path))?;
    for_each_entry(file, archive_path, |name, data| {
        let target = dest.join(name);
        let mut out = fs::create_with_parents(fs, &target).map_err(CtfError::io(&target))?;
        io::copy(data, &mut out).map_err(CtfError::io(&target))?;
        out.flush().map_err(CtfError::io(&target))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;
    use std::path::PathBuf;

    fn tar_bytes(entries: &[(&str, &[u8])], format: ArchiveFormat) -> Vec<u8> {
        let mut writer = TarWriter::new(Vec::new(), format);
        for (name, data) in entries {
            writer.append(name, data.len() as u64, *data).unwrap();
        }
        writer.finish().unwrap()
    }

    fn collect(bytes: &[u8]) -> (ArchiveFormat, Vec<(String, Vec<u8>)>) {
        let mut seen = Vec::new();
        let format = for_each_entry(bytes, Path::new("test"), |name, data| {
            let mut buf = Vec::new();
            data.read_to_end(&mut buf).unwrap();
            seen.push((name.to_string(), buf));
            Ok(())
        })
        .unwrap();
        (format, seen)
    }

    #[test]
    fn format_names() {
        assert_eq!("tgz".parse::<ArchiveFormat>().unwrap(), ArchiveFormat::TarGzip);
        assert_eq!("TAR".parse::<ArchiveFormat>().unwrap(), ArchiveFormat::Tar);
        assert_eq!(
            "directory".parse::<ArchiveFormat>().unwrap(),
            ArchiveFormat::Filesystem
        );
        assert!("zip".parse::<ArchiveFormat>().is_err());
        assert_eq!(ArchiveFormat::TarGzip.to_string(), "tgz");
    }

    #[test]
    fn sanitize_accepts_relative_paths() {
        assert_eq!(
            sanitize_entry_path(Path::new("./blobs/sha256.ab")).unwrap(),
            "blobs/sha256.ab"
        );
    }

    #[test]
    fn sanitize_rejects_escapes() {
        for bad in ["/etc/passwd", "../outside", "blobs/../../x", ".", ""] {
            assert!(
                matches!(
                    sanitize_entry_path(Path::new(bad)),
                    Err(CtfError::UnsafeEntryPath { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn tar_and_tgz_are_detected() {
        let entries: &[(&str, &[u8])] = &[("a.txt", b"alpha"), ("dir/b.txt", b"beta")];
        for format in [ArchiveFormat::Tar, ArchiveFormat::TarGzip] {
            let bytes = tar_bytes(entries, format);
            let (detected, seen) = collect(&bytes);
            assert_eq!(detected, format);
            assert_eq!(
                seen,
                vec![
                    ("a.txt".to_string(), b"alpha".to_vec()),
                    ("dir/b.txt".to_string(), b"beta".to_vec())
                ]
            );
        }
    }

    #[test]
    fn output_is_deterministic() {
        let entries: &[(&str, &[u8])] = &[("x", b"1"), ("y", b"2")];
        assert_eq!(
            tar_bytes(entries, ArchiveFormat::TarGzip),
            tar_bytes(entries, ArchiveFormat::TarGzip)
        );
    }

    #[test]
    fn directory_entries_are_skipped() {
        let mut builder = tar::Builder::new(Vec::new());
        let mut dir = tar::Header::new_gnu();
        dir.set_entry_type(tar::EntryType::Directory);
        dir.set_size(0);
        dir.set_mode(0o755);
        builder.append_data(&mut dir, "blobs/", io::empty()).unwrap();
        let mut file = tar::Header::new_gnu();
        file.set_size(1);
        file.set_mode(0o644);
        builder.append_data(&mut file, "blobs/one", &b"1"[..]).unwrap();
        let bytes = builder.into_inner().unwrap();

        let (_, seen) = collect(&bytes);
        assert_eq!(seen, vec![("blobs/one".to_string(), b"1".to_vec())]);
    }

    #[test]
    fn escaping_entries_are_rejected() {
        // Build the header by hand: tar::Builder refuses to write `..` itself.
        let mut header = tar::Header::new_old();
        header.as_mut_bytes()[..9].copy_from_slice(b"../escape");
        header.set_size(1);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        let mut bytes = header.as_bytes().to_vec();
        let mut block = [0u8; 512];
        block[0] = b'x';
        bytes.extend_from_slice(&block);
        bytes.extend_from_slice(&[0u8; 1024]);

        let err = for_each_entry(&bytes[..], Path::new("evil.tar"), |_, _| Ok(())).unwrap_err();
        assert!(matches!(err, CtfError::UnsafeEntryPath { .. }));
    }

    #[test]
    fn empty_archive_has_no_entries() {
        let fs = MemoryFileSystem::new();
        for (path, format) in [
            ("/a.tar", ArchiveFormat::Tar),
            ("/a.tgz", ArchiveFormat::TarGzip),
        ] {
            write_empty(&fs, Path::new(path), format).unwrap();
            let dest = fs.temp_dir("x-").unwrap();
            assert_eq!(extract_to(&fs, Path::new(path), &dest).unwrap(), format);
            assert!(fs.list_files(&dest).unwrap().is_empty());
        }
    }

    #[test]
    fn pack_and_extract_directory() {
        let fs = MemoryFileSystem::new();
        for (name, data) in [("/src/b/two", b"2"), ("/src/a", b"1")] {
            let mut w = fs::create_with_parents(&fs, Path::new(name)).unwrap();
            w.write_all(data).unwrap();
        }
        let count = pack_directory(
            &fs,
            Path::new("/src"),
            &fs,
            Path::new("/out.tgz"),
            ArchiveFormat::TarGzip,
        )
        .unwrap();
        assert_eq!(count, 2);

        let dest = fs.temp_dir("x-").unwrap();
        extract_to(&fs, Path::new("/out.tgz"), &dest).unwrap();
        assert_eq!(
            fs.list_files(&dest).unwrap(),
            vec![PathBuf::from("a"), PathBuf::from("b/two")]
        );
        assert_eq!(fs::read_all(&fs, &dest.join("b/two")).unwrap(), b"2");
    }
}
