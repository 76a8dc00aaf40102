//! # Digest Engine
//!
//! Computes [`DigestSpec`]s for descriptors, their elements and raw blobs.
//! The engine borrows a [`HasherRegistry`]; callers choose the hash
//! algorithm by name and the engine records both the hash and the
//! normalisation algorithm next to the value.
//!
//! ## Security Invariant
//!
//! Descriptor digests are computed over [`CanonicalBytes`] only. The same
//! descriptor content, in any collection order, yields the same digest.

use crate::canonical::CanonicalBytes;
use crate::descriptor::{ComponentDescriptor, ComponentReference, DigestSpec, Resource, Source};
use crate::error::{DigestError, NormalizationError};
use crate::hasher::{Hasher, HasherRegistry};
use crate::normalize::{self, NormalisationAlgorithm};

/// Digest computation bound to a hasher registry.
#[derive(Debug, Clone, Copy)]
pub struct DigestEngine<'a> {
    registry: &'a HasherRegistry,
}

impl<'a> DigestEngine<'a> {
    /// Create an engine over `registry`.
    pub fn new(registry: &'a HasherRegistry) -> Self {
        Self { registry }
    }

    /// The registry hash algorithms are looked up in.
    pub fn registry(&self) -> &'a HasherRegistry {
        self.registry
    }

    /// Digest a whole descriptor with `jsonNormalisation/v1`.
    pub fn digest_descriptor(
        &self,
        cd: &ComponentDescriptor,
        hash_algorithm: &str,
    ) -> Result<DigestSpec, DigestError> {
        let hasher = self.registry.get(hash_algorithm)?;
        Ok(digest_component_descriptor(cd, &hasher)?)
    }

    /// Digest a descriptor with explicitly named algorithms, as recorded in
    /// an existing [`DigestSpec`].
    pub fn digest_with(
        &self,
        cd: &ComponentDescriptor,
        normalisation_algorithm: &str,
        hash_algorithm: &str,
    ) -> Result<DigestSpec, DigestError> {
        let hasher = self.registry.get(hash_algorithm)?;
        match normalisation_algorithm.parse::<NormalisationAlgorithm>()? {
            NormalisationAlgorithm::JsonV1 => Ok(digest_component_descriptor(cd, &hasher)?),
            NormalisationAlgorithm::GenericBlobV1 => Err(NormalizationError::UnknownAlgorithm(
                format!("{normalisation_algorithm} does not apply to descriptors"),
            )
            .into()),
        }
    }

    /// Digest a single resource, excluding its own digest field.
    pub fn digest_resource(
        &self,
        resource: &Resource,
        hash_algorithm: &str,
    ) -> Result<DigestSpec, DigestError> {
        let hasher = self.registry.get(hash_algorithm)?;
        Ok(spec_for(&hasher, &normalize::normalize_resource(resource)?))
    }

    /// Digest a single source, excluding its own digest field.
    pub fn digest_source(
        &self,
        source: &Source,
        hash_algorithm: &str,
    ) -> Result<DigestSpec, DigestError> {
        let hasher = self.registry.get(hash_algorithm)?;
        Ok(spec_for(&hasher, &normalize::normalize_source(source)?))
    }

    /// Digest a single component reference, excluding its own digest field.
    pub fn digest_reference(
        &self,
        reference: &ComponentReference,
        hash_algorithm: &str,
    ) -> Result<DigestSpec, DigestError> {
        let hasher = self.registry.get(hash_algorithm)?;
        Ok(spec_for(&hasher, &normalize::normalize_reference(reference)?))
    }

    /// Digest raw blob content with `genericBlobDigest/v1`.
    pub fn digest_blob(&self, data: &[u8], hash_algorithm: &str) -> Result<DigestSpec, DigestError> {
        let hasher = self.registry.get(hash_algorithm)?;
        Ok(DigestSpec {
            hash_algorithm: hasher.algorithm().to_string(),
            normalisation_algorithm: NormalisationAlgorithm::GenericBlobV1.to_string(),
            value: hasher.hash_hex(data),
        })
    }
}

/// Digest a descriptor with a specific hasher and `jsonNormalisation/v1`.
pub fn digest_component_descriptor(
    cd: &ComponentDescriptor,
    hasher: &Hasher,
) -> Result<DigestSpec, NormalizationError> {
    let canonical = normalize::normalize_component_descriptor(cd)?;
    Ok(spec_for(hasher, &canonical))
}

fn spec_for(hasher: &Hasher, canonical: &CanonicalBytes) -> DigestSpec {
    DigestSpec {
        hash_algorithm: hasher.algorithm().to_string(),
        normalisation_algorithm: NormalisationAlgorithm::JsonV1.to_string(),
        value: hasher.hash_hex(canonical.as_bytes()),
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::descriptor::{Label, ResourceRelation};
    use crate::hasher::SHA256;
    use proptest::prelude::*;

    fn descriptor_with(resources: &[(String, String)], labels: &[(String, i64)]) -> ComponentDescriptor {
        let mut cd = ComponentDescriptor::new("example/comp", "1.0.0", "acme");
        for (name, kind) in resources {
            cd.add_resource(Resource::new(
                name.clone(),
                "1.0.0",
                kind.clone(),
                ResourceRelation::External,
            ));
        }
        for (name, value) in labels {
            cd.add_label(Label::new(name.clone(), *value));
        }
        cd
    }

    proptest! {
        /// Reversing or rotating order-irrelevant collections never changes the digest.
        #[test]
        fn digest_is_order_insensitive(
            resources in prop::collection::vec(("[a-z]{1,8}", "[a-z]{1,6}"), 1..6),
            labels in prop::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..5),
            rotate in 0usize..6,
        ) {
            let registry = HasherRegistry::with_defaults();
            let engine = DigestEngine::new(&registry);
            let labels: Vec<(String, i64)> = labels.into_iter().collect();

            let base = descriptor_with(&resources, &labels);
            let mut shuffled_resources = resources.clone();
            let rotate_by = rotate % shuffled_resources.len();
            shuffled_resources.rotate_left(rotate_by);
            let mut shuffled_labels = labels.clone();
            shuffled_labels.reverse();
            let shuffled = descriptor_with(&shuffled_resources, &shuffled_labels);

            prop_assert_eq!(
                engine.digest_descriptor(&base, SHA256).unwrap(),
                engine.digest_descriptor(&shuffled, SHA256).unwrap()
            );
        }

        /// The digest is a pure function of content.
        #[test]
        fn digest_is_deterministic(name in "[a-z/]{1,20}", version in "[0-9]\\.[0-9]\\.[0-9]") {
            let registry = HasherRegistry::with_defaults();
            let engine = DigestEngine::new(&registry);
            let cd = ComponentDescriptor::new(name, version, "acme");
            prop_assert_eq!(
                engine.digest_descriptor(&cd, SHA256).unwrap(),
                engine.digest_descriptor(&cd.clone(), SHA256).unwrap()
            );
        }
    }
}
