//! # Digest Subcommand
//!
//! Prints the normalised digest of a component descriptor, and optionally
//! the digests of its resources, sources and component references.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use ocm_core::{DigestEngine, DigestSpec, HasherRegistry};

use crate::config::OcmConfig;

/// Arguments for `ocm digest`.
#[derive(Args, Debug)]
pub struct DigestArgs {
    /// Path to the component descriptor YAML.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Hash algorithm (default from configuration).
    #[arg(long)]
    pub hash_algorithm: Option<String>,

    /// Also print per-element digests.
    #[arg(long)]
    pub elements: bool,

    /// Print digest specs as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Execute the digest subcommand.
pub fn run_digest(args: &DigestArgs, config: &OcmConfig, base: &Path) -> Result<u8> {
    let path = crate::resolve_path(&args.file, base);
    let cd = crate::read_descriptor(&path)?;
    let algorithm = args
        .hash_algorithm
        .as_deref()
        .unwrap_or(&config.hash_algorithm);

    let lines = digest_lines(&cd, algorithm, args.elements)?;
    for (label, spec) in &lines {
        if args.json {
            let value = serde_json::json!({ "element": label, "digest": spec });
            println!("{value}");
        } else {
            println!("{label}\t{}:{}\t{}", spec.hash_algorithm, spec.value, spec.normalisation_algorithm);
        }
    }
    Ok(0)
}

/// Labelled digests: the descriptor first, then each element if requested.
fn digest_lines(
    cd: &ocm_core::ComponentDescriptor,
    algorithm: &str,
    elements: bool,
) -> Result<Vec<(String, DigestSpec)>> {
    let registry = HasherRegistry::with_defaults();
    let engine = DigestEngine::new(&registry);
    let mut lines = vec![(
        cd.to_string(),
        engine
            .digest_descriptor(cd, algorithm)
            .with_context(|| format!("failed to digest {cd}"))?,
    )];
    if elements {
        for resource in &cd.component.resources {
            let spec = engine
                .digest_resource(resource, algorithm)
                .with_context(|| format!("failed to digest resource {}", resource.name))?;
            lines.push((format!("resource/{}", resource.name), spec));
        }
        for source in &cd.component.sources {
            let spec = engine
                .digest_source(source, algorithm)
                .with_context(|| format!("failed to digest source {}", source.name))?;
            lines.push((format!("source/{}", source.name), spec));
        }
        for reference in &cd.component.component_references {
            let spec = engine
                .digest_reference(reference, algorithm)
                .with_context(|| format!("failed to digest reference {}", reference.name))?;
            lines.push((format!("reference/{}", reference.name), spec));
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocm_core::{ComponentDescriptor, Resource, ResourceRelation};

    fn descriptor() -> ComponentDescriptor {
        let mut cd = ComponentDescriptor::new("example/comp", "1.0.0", "acme");
        cd.add_resource(Resource::new("config", "1.0.0", "blob", ResourceRelation::Local));
        cd
    }

    #[test]
    fn descriptor_digest_comes_first() {
        let lines = digest_lines(&descriptor(), "sha256", true).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].0, "example/comp:1.0.0");
        assert_eq!(lines[0].1.value.len(), 64);
        assert_eq!(lines[1].0, "resource/config");
    }

    #[test]
    fn unknown_algorithm_fails() {
        assert!(digest_lines(&descriptor(), "md5", false).is_err());
    }

    #[test]
    fn run_reads_descriptor_relative_to_base() {
        let dir = tempfile::tempdir().unwrap();
        crate::write_descriptor(&dir.path().join("cd.yaml"), &descriptor()).unwrap();
        let args = DigestArgs {
            file: PathBuf::from("cd.yaml"),
            hash_algorithm: Some("sha512".to_string()),
            elements: false,
            json: true,
        };
        assert_eq!(run_digest(&args, &OcmConfig::default(), dir.path()).unwrap(), 0);
    }
}
