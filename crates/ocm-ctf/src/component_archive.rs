//! # Component Archive
//!
//! One component version with its local blobs, laid out as:
//!
//! ```text
//! component-descriptor.yaml
//! blobs/<blob name>
//! ```
//!
//! Local blobs are addressed by content digest. A `localBlob` access with
//! reference `sha256:<hex>` is stored at `blobs/sha256.<hex>`.
//!
//! ## Security Invariant
//!
//! Every `localBlob` access in the descriptor must name a blob present in
//! the archive. [`ComponentArchive::validate`] enforces this, and it runs
//! on every read and before every write.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

use ocm_core::{
    Access, ComponentDescriptor, DigestEngine, Hasher, HasherRegistry, LocalBlobAccess, Resource,
    SHA256,
};

use crate::archive::{self, ArchiveFormat, TarWriter};
use crate::error::CtfError;
use crate::fs::{self, FileSystem};

/// File name of the descriptor inside a component archive.
pub const COMPONENT_DESCRIPTOR_FILE: &str = "component-descriptor.yaml";
/// Directory holding local blobs inside a component archive.
pub const BLOBS_DIR: &str = "blobs";

/// A component descriptor bundled with its local blobs.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentArchive {
    descriptor: ComponentDescriptor,
    /// Blob content keyed by file name below `blobs/`.
    blobs: BTreeMap<String, Vec<u8>>,
}

impl ComponentArchive {
    /// Create an archive holding only `descriptor`.
    pub fn new(descriptor: ComponentDescriptor) -> Self {
        Self {
            descriptor,
            blobs: BTreeMap::new(),
        }
    }

    pub fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }

    pub fn descriptor_mut(&mut self) -> &mut ComponentDescriptor {
        &mut self.descriptor
    }

    /// Names of all blobs, sorted.
    pub fn blob_names(&self) -> impl Iterator<Item = &str> {
        self.blobs.keys().map(String::as_str)
    }

    /// Blob content for a local reference (`sha256:<hex>`) or blob name.
    pub fn blob(&self, reference: &str) -> Option<&[u8]> {
        self.blobs.get(&Self::blob_name(reference)).map(Vec::as_slice)
    }

    /// File name under `blobs/` for a local reference.
    pub fn blob_name(reference: &str) -> String {
        reference.replace(':', ".")
    }

    /// Store `data` as a local blob and return its access.
    ///
    /// Adding the same content twice stores it once.
    pub fn add_blob(&mut self, data: Vec<u8>, media_type: Option<String>) -> LocalBlobAccess {
        let reference = format!("{SHA256}:{}", Hasher::sha256().hash_hex(&data));
        self.blobs.insert(Self::blob_name(&reference), data);
        LocalBlobAccess {
            local_reference: reference,
            media_type,
        }
    }

    /// Append `resource` served from `data` as a local blob.
    ///
    /// The resource's access is replaced by the local blob access and its
    /// digest is set to the `genericBlobDigest/v1` digest of `data`.
    pub fn add_resource(
        &mut self,
        mut resource: Resource,
        data: Vec<u8>,
        media_type: Option<String>,
    ) -> Result<&Resource, CtfError> {
        let registry = HasherRegistry::with_defaults();
        let digest = DigestEngine::new(&registry).digest_blob(&data, SHA256)?;
        let access = self.add_blob(data, media_type);
        resource.access = Some(Access::LocalBlob(access));
        resource.digest = Some(digest);
        self.descriptor.add_resource(resource);
        Ok(&self.descriptor.component.resources[self.descriptor.component.resources.len() - 1])
    }

    /// Check that every `localBlob` access resolves to a stored blob.
    pub fn validate(&self) -> Result<(), CtfError> {
        let component = &self.descriptor.component;
        let accesses = component
            .resources
            .iter()
            .filter_map(|r| r.access.as_ref())
            .chain(component.sources.iter().filter_map(|s| s.access.as_ref()));
        for access in accesses {
            if let Access::LocalBlob(local) = access {
                if self.blob(&local.local_reference).is_none() {
                    return Err(CtfError::LocalBlobNotFound {
                        component: self.descriptor.to_string(),
                        reference: local.local_reference.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reading
    // -----------------------------------------------------------------------

    /// Read a tar or gzip tar component archive. The format is detected
    /// from the content. `entry` names the source in errors.
    pub fn read_from(reader: impl Read, entry: &str) -> Result<Self, CtfError> {
        let mut descriptor = None;
        let mut blobs = BTreeMap::new();
        archive::for_each_entry(reader, Path::new(entry), |name, data| {
            let mut content = Vec::new();
            data.read_to_end(&mut content).map_err(CtfError::io(entry))?;
            if name == COMPONENT_DESCRIPTOR_FILE {
                descriptor = Some(content);
            } else if let Some(blob) = name.strip_prefix("blobs/") {
                blobs.insert(blob.to_string(), content);
            } else {
                tracing::debug!(entry, file = name, "ignoring unknown component archive file");
            }
            Ok(())
        })?;
        Self::assemble(entry, descriptor, blobs)
    }

    /// Read a component archive laid out as a directory.
    pub fn read_from_filesystem(fs: &dyn FileSystem, dir: &Path) -> Result<Self, CtfError> {
        let entry = dir.display().to_string();
        let descriptor_path = dir.join(COMPONENT_DESCRIPTOR_FILE);
        let descriptor = match fs.stat(&descriptor_path) {
            Ok(_) => Some(fs::read_all(fs, &descriptor_path).map_err(CtfError::io(&descriptor_path))?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(CtfError::io(&descriptor_path)(e)),
        };

        let mut blobs = BTreeMap::new();
        let blobs_dir = dir.join(BLOBS_DIR);
        if fs.stat(&blobs_dir).map(|info| info.is_dir).unwrap_or(false) {
            for relative in fs.list_files(&blobs_dir).map_err(CtfError::io(&blobs_dir))? {
                let name = archive::sanitize_entry_path(&relative)?;
                let path = blobs_dir.join(&relative);
                let content = fs::read_all(fs, &path).map_err(CtfError::io(&path))?;
                blobs.insert(name, content);
            }
        }
        Self::assemble(&entry, descriptor, blobs)
    }

    fn assemble(
        entry: &str,
        descriptor: Option<Vec<u8>>,
        blobs: BTreeMap<String, Vec<u8>>,
    ) -> Result<Self, CtfError> {
        let raw = descriptor.ok_or_else(|| CtfError::MissingDescriptor {
            entry: entry.to_string(),
        })?;
        let descriptor: ComponentDescriptor =
            serde_yaml::from_slice(&raw).map_err(|source| CtfError::InvalidDescriptor {
                entry: entry.to_string(),
                source,
            })?;
        let ca = Self { descriptor, blobs };
        ca.validate()?;
        Ok(ca)
    }

    // -----------------------------------------------------------------------
    // Writing
    // -----------------------------------------------------------------------

    fn descriptor_yaml(&self) -> Result<Vec<u8>, CtfError> {
        serde_yaml::to_string(&self.descriptor)
            .map(String::into_bytes)
            .map_err(|source| CtfError::InvalidDescriptor {
                entry: self.descriptor.to_string(),
                source,
            })
    }

    /// Write the archive as a directory tree below `dir`.
    pub fn write_to_filesystem(&self, fs: &dyn FileSystem, dir: &Path) -> Result<(), CtfError> {
        self.validate()?;
        let yaml = self.descriptor_yaml()?;
        let files = std::iter::once((dir.join(COMPONENT_DESCRIPTOR_FILE), yaml.as_slice())).chain(
            self.blobs
                .iter()
                .map(|(name, data)| (dir.join(BLOBS_DIR).join(name), data.as_slice())),
        );
        for (path, data) in files {
            let mut out = fs::create_with_parents(fs, &path).map_err(CtfError::io(&path))?;
            out.write_all(data).map_err(CtfError::io(&path))?;
            out.flush().map_err(CtfError::io(&path))?;
        }
        Ok(())
    }

    /// Write the archive as a tar or gzip tar stream.
    pub fn write_archive<W: Write>(&self, writer: W, format: ArchiveFormat) -> Result<W, CtfError> {
        if format == ArchiveFormat::Filesystem {
            return Err(CtfError::UnsupportedFormat {
                format: format.to_string(),
            });
        }
        self.validate()?;
        let entry = self.descriptor.to_string();
        let yaml = self.descriptor_yaml()?;
        let mut tar = TarWriter::new(writer, format);
        tar.append(COMPONENT_DESCRIPTOR_FILE, yaml.len() as u64, yaml.as_slice())
            .map_err(CtfError::io(&entry))?;
        for (name, data) in &self.blobs {
            tar.append(&format!("{BLOBS_DIR}/{name}"), data.len() as u64, data.as_slice())
                .map_err(CtfError::io(&entry))?;
        }
        tar.finish().map_err(CtfError::io(&entry))
    }

    pub fn write_tar<W: Write>(&self, writer: W) -> Result<W, CtfError> {
        self.write_archive(writer, ArchiveFormat::Tar)
    }

    pub fn write_tar_gzip<W: Write>(&self, writer: W) -> Result<W, CtfError> {
        self.write_archive(writer, ArchiveFormat::TarGzip)
    }

    /// The deterministic plain tar form of this archive.
    pub fn to_tar_bytes(&self) -> Result<Vec<u8>, CtfError> {
        self.write_tar(Vec::new())
    }

    /// Content name of this archive: `sha256.<hex>` of its tar form.
    pub fn digest(&self) -> Result<String, CtfError> {
        let bytes = self.to_tar_bytes()?;
        Ok(format!("{SHA256}.{}", Hasher::sha256().hash_hex(&bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;
    use ocm_core::{ErrorKind, ResourceRelation};

    fn archive() -> ComponentArchive {
        let mut ca = ComponentArchive::new(ComponentDescriptor::new(
            "example/comp",
            "1.0.0",
            "acme",
        ));
        ca.add_resource(
            Resource::new("config", "1.0.0", "blob", ResourceRelation::Local),
            b"{\"replicas\":3}".to_vec(),
            Some("application/json".to_string()),
        )
        .unwrap();
        ca
    }

    #[test]
    fn add_resource_sets_access_and_digest() {
        let ca = archive();
        let resource = ca.descriptor().resource("config").unwrap();
        let Some(Access::LocalBlob(local)) = &resource.access else {
            panic!("expected local blob access");
        };
        assert!(local.local_reference.starts_with("sha256:"));
        let digest = resource.digest.as_ref().unwrap();
        assert_eq!(digest.normalisation_algorithm, "genericBlobDigest/v1");
        assert_eq!(format!("sha256:{}", digest.value), local.local_reference);
        assert_eq!(ca.blob(&local.local_reference).unwrap(), b"{\"replicas\":3}");
    }

    #[test]
    fn blob_name_replaces_colon() {
        assert_eq!(ComponentArchive::blob_name("sha256:abc"), "sha256.abc");
        assert_eq!(ComponentArchive::blob_name("plain"), "plain");
    }

    #[test]
    fn dangling_local_blob_is_rejected() {
        let mut ca = archive();
        ca.descriptor_mut().add_resource(
            Resource::new("missing", "1.0.0", "blob", ResourceRelation::Local)
                .with_access(Access::local_blob("sha256:0000", None)),
        );
        let err = ca.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(ca.to_tar_bytes().is_err());
    }

    #[test]
    fn tar_and_tgz_read_back() {
        let ca = archive();
        let tar = ca.write_tar(Vec::new()).unwrap();
        let tgz = ca.write_tar_gzip(Vec::new()).unwrap();
        assert_eq!(ComponentArchive::read_from(tar.as_slice(), "ca.tar").unwrap(), ca);
        assert_eq!(ComponentArchive::read_from(tgz.as_slice(), "ca.tgz").unwrap(), ca);
    }

    #[test]
    fn digest_is_stable_and_content_sensitive() {
        let ca = archive();
        let first = ca.digest().unwrap();
        assert_eq!(first, ca.digest().unwrap());
        assert!(first.starts_with("sha256."));
        assert_eq!(first.len(), "sha256.".len() + 64);

        let mut changed = ca.clone();
        changed.descriptor_mut().component.provider = "other".to_string();
        assert_ne!(changed.digest().unwrap(), first);
    }

    #[test]
    fn filesystem_layout_round_trip() {
        let fs = MemoryFileSystem::new();
        let ca = archive();
        ca.write_to_filesystem(&fs, Path::new("/ca")).unwrap();
        assert_eq!(fs.file_count(), 2);
        let read = ComponentArchive::read_from_filesystem(&fs, Path::new("/ca")).unwrap();
        assert_eq!(read, ca);
    }

    #[test]
    fn missing_descriptor_is_reported() {
        let mut tar = TarWriter::new(Vec::new(), ArchiveFormat::Tar);
        tar.append("blobs/x", 1, &b"x"[..]).unwrap();
        let bytes = tar.finish().unwrap();
        let err = ComponentArchive::read_from(bytes.as_slice(), "broken").unwrap_err();
        assert!(matches!(err, CtfError::MissingDescriptor { .. }));
    }

    #[test]
    fn filesystem_format_is_not_a_stream() {
        let err = archive()
            .write_archive(Vec::new(), ArchiveFormat::Filesystem)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
