//! # End-to-End CLI Flow
//!
//! Drives the subcommand handlers the way the binary does: generate keys,
//! sign a descriptor inside a component archive, ship it through a
//! transport archive, and verify it on the other side.

use std::path::{Path, PathBuf};

use ocm_cli::ctf::{run_ctf, CtfArgs, CtfCommand};
use ocm_cli::signing::{run_keygen, run_sign, run_verify, EncodingArg, KeygenArgs, SignArgs, VerifyArgs};
use ocm_cli::OcmConfig;
use ocm_core::{ComponentDescriptor, Resource, ResourceRelation};
use ocm_ctf::{ComponentArchive, OpenMode, OsFileSystem, TransportArchive};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn config(dir: &Path) -> OcmConfig {
    OcmConfig {
        signing_key: Some(dir.join("keys/release.key")),
        verification_key: Some(dir.join("keys/release.pub")),
        signature_name: "release".to_string(),
        ..OcmConfig::default()
    }
}

fn write_component(dir: &Path) -> PathBuf {
    let mut ca = ComponentArchive::new(ComponentDescriptor::new("example/app", "2.0.0", "acme"));
    ca.add_resource(
        Resource::new("binary", "2.0.0", "executable", ResourceRelation::Local),
        vec![0x7f, b'E', b'L', b'F'],
        Some("application/octet-stream".to_string()),
    )
    .unwrap();
    let path = dir.join("component");
    ca.write_to_filesystem(&OsFileSystem, &path).unwrap();
    path
}

// ---------------------------------------------------------------------------
// Flow
// ---------------------------------------------------------------------------

#[test]
fn signed_component_survives_transport() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    let config = config(base);

    let keygen = KeygenArgs {
        output: PathBuf::from("keys"),
        prefix: "release".to_string(),
        algorithm: None,
        bits: None,
    };
    assert_eq!(run_keygen(&keygen, &config, base).unwrap(), 0);

    let component = write_component(base);
    let sign = SignArgs {
        file: component.join("component-descriptor.yaml"),
        key: None,
        algorithm: None,
        name: None,
        hash_algorithm: None,
        encoding: EncodingArg::Hex,
        output: None,
    };
    assert_eq!(run_sign(&sign, &config, base).unwrap(), 0);

    let add = CtfArgs {
        command: CtfCommand::Add {
            path: PathBuf::from("transport.tgz"),
            component: PathBuf::from("component"),
            format: None,
            name: None,
        },
    };
    assert_eq!(run_ctf(&add, &config, base).unwrap(), 0);

    // Unpack on the "receiving" side and verify the shipped descriptor.
    let ctf = TransportArchive::open_os(base.join("transport.tgz"), OpenMode::Open).unwrap();
    let entries = ctf.entries().unwrap();
    assert_eq!(entries.len(), 1);
    let received = ctf.get_component_archive(&entries[0]).unwrap();
    assert_eq!(received.descriptor().signatures.len(), 1);
    let unpacked = base.join("received");
    received.write_to_filesystem(&OsFileSystem, &unpacked).unwrap();

    let verify = VerifyArgs {
        file: unpacked.join("component-descriptor.yaml"),
        public_key: None,
        algorithm: None,
        name: None,
    };
    assert_eq!(run_verify(&verify, &config, base).unwrap(), 0);
}
