//! # Filesystem Capability
//!
//! Archive code reaches storage only through [`FileSystem`], so the same
//! logic runs against the OS filesystem ([`OsFileSystem`]) and an
//! in-memory tree ([`MemoryFileSystem`]).
//!
//! All methods report failures as `std::io::Error`; a missing path is
//! always `io::ErrorKind::NotFound`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::{self, Cursor, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

/// What [`FileSystem::stat`] reports about a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    pub is_dir: bool,
    /// Size in bytes; zero for directories.
    pub size: u64,
}

/// Storage operations needed by transport and component archives.
pub trait FileSystem: Send + Sync + fmt::Debug {
    fn stat(&self, path: &Path) -> io::Result<FileInfo>;

    /// Create `path` and any missing parents.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>>;

    /// Create or truncate a file. The parent directory must exist.
    fn create(&self, path: &Path) -> io::Result<Box<dyn Write + Send>>;

    /// Remove a file or a directory tree. Missing paths are not an error.
    fn remove_all(&self, path: &Path) -> io::Result<()>;

    /// Regular files below `root`, as paths relative to `root`, recursively.
    fn list_files(&self, root: &Path) -> io::Result<Vec<PathBuf>>;

    /// Create a fresh, empty directory for staging.
    fn temp_dir(&self, prefix: &str) -> io::Result<PathBuf>;

    /// Absolute form of an existing `path`, links resolved.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;
}

/// Create the parent of `path`, then create the file.
pub(crate) fn create_with_parents(
    fs: &dyn FileSystem,
    path: &Path,
) -> io::Result<Box<dyn Write + Send>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs.create_dir_all(parent)?;
    }
    fs.create(path)
}

/// Absolute form of `path`, which need not exist yet.
///
/// The longest existing ancestor is canonicalised and the remaining
/// components are appended to it.
pub(crate) fn resolve_path(fs: &dyn FileSystem, path: &Path) -> PathBuf {
    let mut rest = Vec::new();
    for ancestor in path.ancestors() {
        if let Ok(resolved) = fs.canonicalize(ancestor) {
            return rest.iter().rev().fold(resolved, |acc, part| acc.join(part));
        }
        match ancestor.file_name() {
            Some(name) => rest.push(name.to_owned()),
            None => break,
        }
    }
    path.to_path_buf()
}

/// Read a whole file.
pub(crate) fn read_all(fs: &dyn FileSystem, path: &Path) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    fs.open(path)?.read_to_end(&mut buf)?;
    Ok(buf)
}

// ---------------------------------------------------------------------------
// OS filesystem
// ---------------------------------------------------------------------------

/// The host filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn stat(&self, path: &Path) -> io::Result<FileInfo> {
        let meta = std::fs::metadata(path)?;
        Ok(FileInfo {
            is_dir: meta.is_dir(),
            size: if meta.is_dir() { 0 } else { meta.len() },
        })
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(io::BufReader::new(std::fs::File::open(path)?)))
    }

    fn create(&self, path: &Path) -> io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(io::BufWriter::new(std::fs::File::create(path)?)))
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        match std::fs::symlink_metadata(path) {
            Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
            Ok(_) => std::fs::remove_file(path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn list_files(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(root).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(root) {
                files.push(relative.to_path_buf());
            }
        }
        Ok(files)
    }

    fn temp_dir(&self, prefix: &str) -> io::Result<PathBuf> {
        Ok(tempfile::Builder::new().prefix(prefix).tempdir()?.keep())
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        if path.as_os_str().is_empty() {
            return std::fs::canonicalize(".");
        }
        std::fs::canonicalize(path)
    }
}

// ---------------------------------------------------------------------------
// In-memory filesystem
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Tree {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
    next_temp: u64,
}

impl Tree {
    fn is_dir(&self, path: &Path) -> bool {
        path == Path::new("/") || self.dirs.contains(path)
    }
}

/// A shared in-memory tree. Clones see the same contents.
///
/// Relative paths are resolved against `/`.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    tree: Arc<RwLock<Tree>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of regular files in the tree.
    pub fn file_count(&self) -> usize {
        self.tree.read().files.len()
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::from("/");
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::ParentDir => {
                out.pop();
            }
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }
    out
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} does not exist", path.display()),
    )
}

impl FileSystem for MemoryFileSystem {
    fn stat(&self, path: &Path) -> io::Result<FileInfo> {
        let path = normalize(path);
        let tree = self.tree.read();
        if let Some(data) = tree.files.get(&path) {
            return Ok(FileInfo {
                is_dir: false,
                size: data.len() as u64,
            });
        }
        if tree.is_dir(&path) {
            return Ok(FileInfo {
                is_dir: true,
                size: 0,
            });
        }
        Err(not_found(&path))
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let path = normalize(path);
        let mut tree = self.tree.write();
        for ancestor in path.ancestors() {
            if tree.files.contains_key(ancestor) {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} is a file", ancestor.display()),
                ));
            }
        }
        for ancestor in path.ancestors() {
            if ancestor != Path::new("/") {
                tree.dirs.insert(ancestor.to_path_buf());
            }
        }
        Ok(())
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        let path = normalize(path);
        let tree = self.tree.read();
        match tree.files.get(&path) {
            Some(data) => Ok(Box::new(Cursor::new(data.clone()))),
            None if tree.is_dir(&path) => Err(io::Error::other(format!(
                "{} is a directory",
                path.display()
            ))),
            None => Err(not_found(&path)),
        }
    }

    fn create(&self, path: &Path) -> io::Result<Box<dyn Write + Send>> {
        let path = normalize(path);
        let mut tree = self.tree.write();
        if tree.is_dir(&path) {
            return Err(io::Error::other(format!(
                "{} is a directory",
                path.display()
            )));
        }
        let parent = path.parent().unwrap_or_else(|| Path::new("/"));
        if !tree.is_dir(parent) {
            return Err(not_found(parent));
        }
        tree.files.insert(path.clone(), Vec::new());
        Ok(Box::new(MemoryFile {
            tree: Arc::clone(&self.tree),
            path,
            buf: Vec::new(),
        }))
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        let path = normalize(path);
        let mut tree = self.tree.write();
        tree.files.retain(|p, _| !p.starts_with(&path));
        tree.dirs.retain(|p| !p.starts_with(&path));
        Ok(())
    }

    fn list_files(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        let root = normalize(root);
        let tree = self.tree.read();
        if !tree.is_dir(&root) {
            return Err(not_found(&root));
        }
        Ok(tree
            .files
            .keys()
            .filter_map(|p| p.strip_prefix(&root).ok())
            .map(Path::to_path_buf)
            .collect())
    }

    fn temp_dir(&self, prefix: &str) -> io::Result<PathBuf> {
        let path = {
            let mut tree = self.tree.write();
            loop {
                tree.next_temp += 1;
                let candidate = PathBuf::from(format!("/tmp/{prefix}{}", tree.next_temp));
                if !tree.is_dir(&candidate) && !tree.files.contains_key(&candidate) {
                    break candidate;
                }
            }
        };
        self.create_dir_all(&path)?;
        Ok(path)
    }

    /// Lexical only: the tree has no links.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        Ok(normalize(path))
    }
}

/// Buffered writer that publishes its contents on flush and on drop.
struct MemoryFile {
    tree: Arc<RwLock<Tree>>,
    path: PathBuf,
    buf: Vec<u8>,
}

impl Write for MemoryFile {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.tree
            .write()
            .files
            .insert(self.path.clone(), self.buf.clone());
        Ok(())
    }
}

impl Drop for MemoryFile {
    fn drop(&mut self) {
        let buf = std::mem::take(&mut self.buf);
        self.tree.write().files.insert(self.path.clone(), buf);
    }
}
