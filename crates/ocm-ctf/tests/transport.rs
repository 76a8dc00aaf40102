//! Transport archives on the real filesystem: conversion between backings,
//! write-back, and resolving local blobs out of a reopened archive.

use std::path::Path;
use std::sync::Arc;

use ocm_core::{ComponentDescriptor, ErrorKind, Resource, ResourceRelation};
use ocm_ctf::{
    ArchiveFormat, BlobResolver, ComponentArchive, CtfError, LocalBlobResolver, MemoryFileSystem,
    OpenMode, OsFileSystem, TransportArchive,
};

fn component(name: &str, payload: &[u8]) -> ComponentArchive {
    let mut ca = ComponentArchive::new(ComponentDescriptor::new(name, "1.0.0", "acme"));
    ca.add_resource(
        Resource::new("payload", "1.0.0", "blob", ResourceRelation::Local),
        payload.to_vec(),
        Some("application/octet-stream".to_string()),
    )
    .unwrap();
    ca
}

fn names(ctf: &TransportArchive) -> Vec<String> {
    let mut seen = Vec::new();
    ctf.walk(|_, ca| {
        seen.push(ca.descriptor().name().to_string());
        Ok(())
    })
    .unwrap();
    seen.sort();
    seen
}

#[test]
fn directory_tar_tgz_directory_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("ctf");
    let tar = tmp.path().join("ctf.tar");
    let tgz = tmp.path().join("ctf.tgz");
    let back = tmp.path().join("back");

    let mut ctf = TransportArchive::open_os(&dir, OpenMode::Directory).unwrap();
    for (i, name) in ["example/a", "example/b", "example/c"].iter().enumerate() {
        let format = if i % 2 == 0 {
            ArchiveFormat::Tar
        } else {
            ArchiveFormat::TarGzip
        };
        ctf.add_component_archive(&component(name, name.as_bytes()), format)
            .unwrap();
    }
    let entries = ctf.entries().unwrap();
    assert_eq!(entries.len(), 3);
    ctf.write_to_archive(&tar, ArchiveFormat::Tar).unwrap();

    let from_tar = TransportArchive::open_os(&tar, OpenMode::Open).unwrap();
    assert_eq!(from_tar.format(), Some(ArchiveFormat::Tar));
    from_tar.write_to_archive(&tgz, ArchiveFormat::TarGzip).unwrap();

    let from_tgz = TransportArchive::open_os(&tgz, OpenMode::Open).unwrap();
    assert_eq!(from_tgz.format(), Some(ArchiveFormat::TarGzip));
    from_tgz.write_to_filesystem(&back).unwrap();

    let restored = TransportArchive::open_os(&back, OpenMode::Open).unwrap();
    assert_eq!(restored.entries().unwrap(), entries);
    assert_eq!(names(&restored), vec!["example/a", "example/b", "example/c"]);
    for entry in &entries {
        assert_eq!(
            std::fs::read(dir.join(entry)).unwrap(),
            std::fs::read(back.join(entry)).unwrap(),
            "entry {entry} changed in transit"
        );
    }
}

#[test]
fn write_persists_into_original_backing() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("ctf.tgz");

    let mut ctf = TransportArchive::open_os(&path, OpenMode::TarGzip).unwrap();
    let name = ctf
        .add_component_archive(&component("example/a", b"one"), ArchiveFormat::TarGzip)
        .unwrap();
    ctf.write().unwrap();
    ctf.close().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..2], &[0x1f, 0x8b]);

    let reopened = TransportArchive::open_os(&path, OpenMode::Open).unwrap();
    assert_eq!(reopened.entries().unwrap(), vec![name]);
}

#[test]
fn unsaved_changes_are_discarded_on_close() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("ctf.tar");

    let mut ctf = TransportArchive::open_os(&path, OpenMode::Tar).unwrap();
    ctf.add_component_archive(&component("example/a", b"one"), ArchiveFormat::Tar)
        .unwrap();
    let staging = ctf.root().unwrap().to_path_buf();
    ctf.close().unwrap();
    assert!(!staging.exists());

    let reopened = TransportArchive::open_os(&path, OpenMode::Open).unwrap();
    assert!(reopened.entries().unwrap().is_empty());
}

#[test]
fn operations_after_close_fail() {
    let tmp = tempfile::tempdir().unwrap();
    let mut ctf = TransportArchive::open_os(tmp.path().join("c.tgz"), OpenMode::TarGzip).unwrap();
    ctf.close().unwrap();

    let err = ctf.walk(|_, _| Ok(())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArchiveState);
    assert!(matches!(
        ctf.write_to_archive(&tmp.path().join("out.tar"), ArchiveFormat::Tar),
        Err(CtfError::ArchiveClosed { .. })
    ));
}

#[test]
fn walk_stops_at_first_error() {
    let fs = Arc::new(MemoryFileSystem::new());
    let mut ctf = TransportArchive::open(fs, "/ctf", OpenMode::Directory).unwrap();
    ctf.add_component_archive(&component("example/a", b"a"), ArchiveFormat::Tar)
        .unwrap();
    ctf.add_component_archive(&component("example/b", b"b"), ArchiveFormat::Tar)
        .unwrap();

    let mut visited = 0;
    let err = ctf
        .walk(|name, _| {
            visited += 1;
            Err(CtfError::EntryNotFound {
                name: name.to_string(),
            })
        })
        .unwrap_err();
    assert_eq!(visited, 1);
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn local_blobs_resolve_from_reopened_archive() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("ctf.tgz");
    let mut ctf = TransportArchive::open_os(&path, OpenMode::TarGzip).unwrap();
    let name = ctf
        .add_component_archive(&component("example/a", b"payload bytes"), ArchiveFormat::TarGzip)
        .unwrap();
    ctf.write().unwrap();
    drop(ctf);

    let reopened = TransportArchive::open_os(&path, OpenMode::Open).unwrap();
    let ca = Arc::new(reopened.get_component_archive(&name).unwrap());
    let resource = ca.descriptor().resource("payload").unwrap().clone();
    let resolver = BlobResolver::typed(LocalBlobResolver::new(Arc::clone(&ca)));

    let mut out = Vec::new();
    let info = resolver.resolve(&resource, &mut out).unwrap();
    assert_eq!(out, b"payload bytes");
    assert_eq!(info.size, 13);
    assert_eq!(
        info.digest,
        format!("sha256:{}", resource.digest.as_ref().unwrap().value)
    );
}

#[test]
fn existing_file_rejected_as_export_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let file = tmp.path().join("occupied");
    std::fs::write(&file, b"x").unwrap();
    let ctf = TransportArchive::open_os(tmp.path().join("ctf"), OpenMode::Directory).unwrap();
    let err = ctf.write_to_filesystem(Path::new(&file)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArchiveState);
}

#[test]
fn export_onto_own_directory_keeps_entries() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("ctf");
    let mut ctf = TransportArchive::open_os(&dir, OpenMode::Directory).unwrap();
    let name = ctf
        .add_component_archive(&component("example/a", b"payload"), ArchiveFormat::Tar)
        .unwrap();
    let before = std::fs::read(dir.join(&name)).unwrap();

    let err = ctf.write_to_filesystem(&dir.join(".")).unwrap_err();
    assert!(matches!(err, CtfError::ExportIntoArchive { .. }));
    let err = ctf
        .write_to_archive(&dir.join("inner.tgz"), ArchiveFormat::TarGzip)
        .unwrap_err();
    assert!(matches!(err, CtfError::ExportIntoArchive { .. }));

    assert_eq!(std::fs::read(dir.join(&name)).unwrap(), before);
    assert_eq!(names(&ctf), vec!["example/a"]);
}

#[test]
fn memory_archive_exports_to_disk() {
    let tmp = tempfile::tempdir().unwrap();
    let fs = Arc::new(MemoryFileSystem::new());
    let mut ctf = TransportArchive::open(fs, "/staged.tar", OpenMode::Tar).unwrap();
    ctf.add_component_archive(&component("example/a", b"a"), ArchiveFormat::TarGzip)
        .unwrap();
    ctf.add_component_archive(&component("example/b", b"b"), ArchiveFormat::Tar)
        .unwrap();
    let entries = ctf.entries().unwrap();

    let tgz = tmp.path().join("out/ctf.tgz");
    ctf.write_to_archive_on(&OsFileSystem, &tgz, ArchiveFormat::TarGzip)
        .unwrap();
    let dir = tmp.path().join("out/ctf");
    ctf.write_to_filesystem_on(&OsFileSystem, &dir).unwrap();

    let from_tgz = TransportArchive::open_os(&tgz, OpenMode::Open).unwrap();
    assert_eq!(from_tgz.format(), Some(ArchiveFormat::TarGzip));
    assert_eq!(from_tgz.entries().unwrap(), entries);
    let from_dir = TransportArchive::open_os(&dir, OpenMode::Open).unwrap();
    assert_eq!(from_dir.format(), Some(ArchiveFormat::Filesystem));
    assert_eq!(names(&from_dir), vec!["example/a", "example/b"]);
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn entries_survive_format_conversion(
            payloads in proptest::collection::btree_set(proptest::collection::vec(any::<u8>(), 0..64), 0..6),
            gzip in any::<bool>(),
        ) {
            let fs = Arc::new(MemoryFileSystem::new());
            let mut ctf = TransportArchive::open(fs.clone(), "/src", OpenMode::Directory).unwrap();
            for (i, payload) in payloads.iter().enumerate() {
                ctf.add_component_archive(&component(&format!("example/c{i}"), payload), ArchiveFormat::Tar)
                    .unwrap();
            }
            let format = if gzip { ArchiveFormat::TarGzip } else { ArchiveFormat::Tar };
            ctf.write_to_archive(Path::new("/out"), format).unwrap();

            let reopened = TransportArchive::open(fs, "/out", OpenMode::Open).unwrap();
            prop_assert_eq!(reopened.format(), Some(format));
            prop_assert_eq!(reopened.entries().unwrap(), ctf.entries().unwrap());
        }
    }
}
