//! # Normalisation: Canonical Digest Input
//!
//! Turns a component descriptor, or one of its elements, into
//! [`CanonicalBytes`]. Two descriptors that differ only in the insertion
//! order of order-irrelevant collections normalise to identical bytes; any
//! semantic difference normalises to different bytes.
//!
//! ## Rules (`jsonNormalisation/v1`)
//!
//! 1. Object keys are sorted (RFC 8785, via [`CanonicalBytes`]).
//! 2. Labels are sorted by name. Sources, resources and component
//!    references are sorted by the canonical form of their identity.
//!    Repository contexts keep their declared order.
//! 3. An element normalised on its own omits its own `digest`. When the
//!    whole descriptor is normalised, nested element digests are included,
//!    so a reference digest pins the referenced component transitively.
//! 4. Signatures never contribute.
//! 5. A `localBlob` access must carry a local reference digest.

use std::str::FromStr;

use serde_json::{json, Map, Value};

use crate::canonical::CanonicalBytes;
use crate::descriptor::{
    Access, ComponentDescriptor, ComponentReference, DigestSpec, Label, Resource, Source,
};
use crate::error::NormalizationError;

/// Identifier of a normalisation algorithm, persisted in every [`DigestSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NormalisationAlgorithm {
    /// Canonical JSON of the descriptor or element.
    JsonV1,
    /// Raw blob content, hashed as is.
    GenericBlobV1,
}

impl NormalisationAlgorithm {
    /// Id of [`Self::JsonV1`].
    pub const JSON_V1: &'static str = "jsonNormalisation/v1";
    /// Id of [`Self::GenericBlobV1`].
    pub const GENERIC_BLOB_V1: &'static str = "genericBlobDigest/v1";

    /// Returns the stable identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JsonV1 => Self::JSON_V1,
            Self::GenericBlobV1 => Self::GENERIC_BLOB_V1,
        }
    }
}

impl std::fmt::Display for NormalisationAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NormalisationAlgorithm {
    type Err = NormalizationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            Self::JSON_V1 => Ok(Self::JsonV1),
            Self::GENERIC_BLOB_V1 => Ok(Self::GenericBlobV1),
            other => Err(NormalizationError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Normalise a whole descriptor. Signatures are excluded.
pub fn normalize_component_descriptor(
    cd: &ComponentDescriptor,
) -> Result<CanonicalBytes, NormalizationError> {
    CanonicalBytes::from_value(descriptor_value(cd)?)
}

/// Normalise a single resource, without its own digest.
pub fn normalize_resource(resource: &Resource) -> Result<CanonicalBytes, NormalizationError> {
    CanonicalBytes::from_value(resource_value(resource, false)?)
}

/// Normalise a single source, without its own digest.
pub fn normalize_source(source: &Source) -> Result<CanonicalBytes, NormalizationError> {
    CanonicalBytes::from_value(source_value(source, false)?)
}

/// Normalise a single component reference, without its own digest.
pub fn normalize_reference(
    reference: &ComponentReference,
) -> Result<CanonicalBytes, NormalizationError> {
    CanonicalBytes::from_value(reference_value(reference, false)?)
}

fn descriptor_value(cd: &ComponentDescriptor) -> Result<Value, NormalizationError> {
    let c = &cd.component;

    let sources = sort_by_identity(
        c.sources
            .iter()
            .map(|s| Ok((identity_value(s.identity()), source_value(s, true)?)))
            .collect::<Result<Vec<_>, NormalizationError>>()?,
    )?;
    let resources = sort_by_identity(
        c.resources
            .iter()
            .map(|r| Ok((identity_value(r.identity()), resource_value(r, true)?)))
            .collect::<Result<Vec<_>, NormalizationError>>()?,
    )?;
    let references = sort_by_identity(
        c.component_references
            .iter()
            .map(|r| Ok((identity_value(r.identity()), reference_value(r, true)?)))
            .collect::<Result<Vec<_>, NormalizationError>>()?,
    )?;

    let contexts: Vec<Value> = c
        .repository_contexts
        .iter()
        .map(|ctx| json!({"type": ctx.context_type, "baseUrl": ctx.base_url}))
        .collect();

    Ok(json!({
        "meta": {"schemaVersion": cd.meta.schema_version},
        "component": {
            "name": c.name,
            "version": c.version,
            "provider": c.provider,
            "repositoryContexts": contexts,
            "sources": sources,
            "componentReferences": references,
            "resources": resources,
            "labels": labels_value(&c.labels)?,
        },
    }))
}

fn resource_value(resource: &Resource, include_digest: bool) -> Result<Value, NormalizationError> {
    let mut map = Map::new();
    map.insert("name".into(), Value::String(resource.name.clone()));
    map.insert("version".into(), Value::String(resource.version.clone()));
    map.insert("type".into(), Value::String(resource.resource_type.clone()));
    map.insert(
        "relation".into(),
        Value::String(resource.relation.as_str().to_string()),
    );
    insert_common(
        &mut map,
        &format!("resource {:?}", resource.name),
        &resource.extra_identity,
        &resource.labels,
        resource.access.as_ref(),
    )?;
    if include_digest {
        insert_digest(&mut map, resource.digest.as_ref());
    }
    Ok(Value::Object(map))
}

fn source_value(source: &Source, include_digest: bool) -> Result<Value, NormalizationError> {
    let mut map = Map::new();
    map.insert("name".into(), Value::String(source.name.clone()));
    map.insert("version".into(), Value::String(source.version.clone()));
    map.insert("type".into(), Value::String(source.source_type.clone()));
    insert_common(
        &mut map,
        &format!("source {:?}", source.name),
        &source.extra_identity,
        &source.labels,
        source.access.as_ref(),
    )?;
    if include_digest {
        insert_digest(&mut map, source.digest.as_ref());
    }
    Ok(Value::Object(map))
}

fn reference_value(
    reference: &ComponentReference,
    include_digest: bool,
) -> Result<Value, NormalizationError> {
    let mut map = Map::new();
    map.insert("name".into(), Value::String(reference.name.clone()));
    map.insert(
        "componentName".into(),
        Value::String(reference.component_name.clone()),
    );
    map.insert("version".into(), Value::String(reference.version.clone()));
    if !reference.extra_identity.is_empty() {
        map.insert("extraIdentity".into(), json!(reference.extra_identity));
    }
    if !reference.labels.is_empty() {
        map.insert("labels".into(), labels_value(&reference.labels)?);
    }
    if include_digest {
        insert_digest(&mut map, reference.digest.as_ref());
    }
    Ok(Value::Object(map))
}

fn insert_common(
    map: &mut Map<String, Value>,
    element: &str,
    extra_identity: &std::collections::BTreeMap<String, String>,
    labels: &[Label],
    access: Option<&Access>,
) -> Result<(), NormalizationError> {
    if !extra_identity.is_empty() {
        map.insert("extraIdentity".into(), json!(extra_identity));
    }
    if !labels.is_empty() {
        map.insert("labels".into(), labels_value(labels)?);
    }
    if let Some(access) = access {
        if let Access::LocalBlob(local) = access {
            if local.local_reference.trim().is_empty() {
                return Err(NormalizationError::MissingLocalBlobDigest {
                    element: element.to_string(),
                });
            }
        }
        map.insert("access".into(), access.to_value());
    }
    Ok(())
}

fn insert_digest(map: &mut Map<String, Value>, digest: Option<&DigestSpec>) {
    if let Some(d) = digest {
        map.insert(
            "digest".into(),
            json!({
                "hashAlgorithm": d.hash_algorithm,
                "normalisationAlgorithm": d.normalisation_algorithm,
                "value": d.value,
            }),
        );
    }
}

/// Labels sorted by name; equal names are ordered by canonical value.
fn labels_value(labels: &[Label]) -> Result<Value, NormalizationError> {
    let mut keyed = labels
        .iter()
        .map(|l| Ok((l.name.clone(), CanonicalBytes::new(&l.value)?, l)))
        .collect::<Result<Vec<_>, NormalizationError>>()?;
    keyed.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
    Ok(Value::Array(
        keyed
            .into_iter()
            .map(|(_, _, l)| json!({"name": l.name, "value": l.value}))
            .collect(),
    ))
}

fn identity_value(identity: crate::descriptor::Identity) -> Value {
    json!(identity)
}

/// Sort `(identity, element)` pairs by canonical identity, then by the
/// canonical element so duplicate identities still order deterministically.
fn sort_by_identity(items: Vec<(Value, Value)>) -> Result<Vec<Value>, NormalizationError> {
    let mut keyed = items
        .into_iter()
        .map(|(identity, element)| {
            let id_key = CanonicalBytes::from_value(identity)?;
            let element_key = CanonicalBytes::from_value(element.clone())?;
            Ok((id_key, element_key, element))
        })
        .collect::<Result<Vec<_>, NormalizationError>>()?;
    keyed.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
    Ok(keyed.into_iter().map(|(_, _, element)| element).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Access, ExternalAccess, RepositoryContext, ResourceRelation};

    fn oci(image: &str) -> Access {
        Access::External(ExternalAccess::new("ociRegistry").with_attribute("imageReference", image))
    }

    fn sample() -> ComponentDescriptor {
        let mut cd = ComponentDescriptor::new("example/comp", "1.0.0", "acme");
        cd.add_resource(
            Resource::new("image", "1.0.0", "ociImage", ResourceRelation::Local)
                .with_access(oci("ghcr.io/example/image:1.0.0")),
        );
        cd.add_resource(
            Resource::new("chart", "1.0.0", "helmChart", ResourceRelation::Local)
                .with_access(Access::local_blob("sha256:aa", None)),
        );
        cd.add_source(Source::new("repo", "1.0.0", "git"));
        cd.add_label(Label::new("team", "platform"));
        cd.add_label(Label::new("cost-center", 42));
        cd
    }

    fn text(cb: &CanonicalBytes) -> &str {
        std::str::from_utf8(cb.as_bytes()).unwrap()
    }

    #[test]
    fn algorithm_ids_round_trip() {
        for alg in [
            NormalisationAlgorithm::JsonV1,
            NormalisationAlgorithm::GenericBlobV1,
        ] {
            assert_eq!(alg.as_str().parse::<NormalisationAlgorithm>().unwrap(), alg);
        }
        assert!("jsonNormalisation/v0"
            .parse::<NormalisationAlgorithm>()
            .is_err());
    }

    #[test]
    fn resource_order_is_irrelevant() {
        let a = sample();
        let mut b = sample();
        b.component.resources.reverse();
        b.component.labels.reverse();
        assert_eq!(
            normalize_component_descriptor(&a).unwrap(),
            normalize_component_descriptor(&b).unwrap()
        );
    }

    #[test]
    fn repository_context_order_is_preserved() {
        let mut a = sample();
        a.add_repository_context(RepositoryContext {
            context_type: "ociRegistry".to_string(),
            base_url: "ghcr.io/one".to_string(),
        });
        a.add_repository_context(RepositoryContext {
            context_type: "ociRegistry".to_string(),
            base_url: "ghcr.io/two".to_string(),
        });
        let mut b = a.clone();
        b.component.repository_contexts.reverse();
        assert_ne!(
            normalize_component_descriptor(&a).unwrap(),
            normalize_component_descriptor(&b).unwrap()
        );
    }

    #[test]
    fn signatures_do_not_contribute() {
        let a = sample();
        let mut b = sample();
        b.add_signature(crate::descriptor::Signature {
            name: "sig".to_string(),
            digest: DigestSpec {
                hash_algorithm: "sha256".to_string(),
                normalisation_algorithm: NormalisationAlgorithm::JSON_V1.to_string(),
                value: "00".to_string(),
            },
            signature: crate::descriptor::SignatureSpec {
                algorithm: "x".to_string(),
                value: "y".to_string(),
                media_type: "z".to_string(),
            },
        });
        assert_eq!(
            normalize_component_descriptor(&a).unwrap(),
            normalize_component_descriptor(&b).unwrap()
        );
    }

    #[test]
    fn element_excludes_own_digest() {
        let plain = Resource::new("image", "1.0.0", "ociImage", ResourceRelation::Local);
        let mut digested = plain.clone();
        digested.digest = Some(DigestSpec {
            hash_algorithm: "sha256".to_string(),
            normalisation_algorithm: NormalisationAlgorithm::GENERIC_BLOB_V1.to_string(),
            value: "ff".to_string(),
        });
        assert_eq!(
            normalize_resource(&plain).unwrap(),
            normalize_resource(&digested).unwrap()
        );
        assert!(!text(&normalize_resource(&digested).unwrap()).contains("digest"));
    }

    #[test]
    fn descriptor_includes_nested_reference_digest() {
        let mut a = sample();
        a.add_reference(ComponentReference::new("dep", "example/dep", "2.0.0"));
        let mut b = a.clone();
        b.component.component_references[0].digest = Some(DigestSpec {
            hash_algorithm: "sha256".to_string(),
            normalisation_algorithm: NormalisationAlgorithm::JSON_V1.to_string(),
            value: "aa".to_string(),
        });
        let nb = normalize_component_descriptor(&b).unwrap();
        assert_ne!(normalize_component_descriptor(&a).unwrap(), nb);
        assert!(text(&nb).contains(r#""digest":{"hashAlgorithm":"sha256""#));
        // The reference on its own ignores its pinned digest.
        assert_eq!(
            normalize_reference(&a.component.component_references[0]).unwrap(),
            normalize_reference(&b.component.component_references[0]).unwrap()
        );
    }

    #[test]
    fn local_blob_without_digest_rejected() {
        let mut cd = sample();
        cd.add_resource(
            Resource::new("broken", "1.0.0", "blob", ResourceRelation::Local)
                .with_access(Access::local_blob("", None)),
        );
        match normalize_component_descriptor(&cd).unwrap_err() {
            NormalizationError::MissingLocalBlobDigest { element } => {
                assert!(element.contains("broken"))
            }
            other => panic!("expected MissingLocalBlobDigest, got {other}"),
        }
    }

    #[test]
    fn source_normalisation_sorts_keys() {
        let source = Source::new("repo", "1.0.0", "git").with_access(Access::External(
            ExternalAccess::new("github")
                .with_attribute("repoUrl", "github.com/example/repo")
                .with_attribute("ref", "refs/tags/v1.0.0"),
        ));
        let cb = normalize_source(&source).unwrap();
        assert_eq!(
            text(&cb),
            r#"{"access":{"ref":"refs/tags/v1.0.0","repoUrl":"github.com/example/repo","type":"github"},"name":"repo","type":"git","version":"1.0.0"}"#
        );
    }

    #[test]
    fn float_label_rejected() {
        let mut cd = sample();
        cd.add_label(Label::new("ratio", 0.5));
        assert!(matches!(
            normalize_component_descriptor(&cd),
            Err(NormalizationError::FloatRejected(_))
        ));
    }
}
