//! # Blob Resolvers
//!
//! Resolve the content a resource's access points at.
//!
//! A [`TypedBlobResolver`] declares which resources it can serve. Several
//! of them combine into an [`AggregatedBlobResolver`], which dispatches each
//! resource to the first resolver that accepts it. [`BlobResolver`] is the
//! single entry point callers hold: either one typed resolver or an
//! aggregate. Both shapes dispatch the same way: a resource without access
//! fails with [`ResolveError::NoAccessDefined`], and one no resolver
//! accepts fails with [`ResolveError::UnsupportedAccessType`]. Aggregates
//! never nest; adding an aggregate to another flattens it.

use std::collections::BTreeSet;
use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use ocm_core::{Access, BlobInfo, HasherRegistry, Resource};

use crate::component_archive::ComponentArchive;
use crate::error::ResolveError;

/// A resolver for a known set of resources.
pub trait TypedBlobResolver: Send + Sync {
    /// Whether this resolver serves `resource`.
    fn can_resolve(&self, resource: &Resource) -> bool;

    /// Describe the blob without transferring it.
    fn info(&self, resource: &Resource) -> Result<BlobInfo, ResolveError>;

    /// Stream the blob into `writer`.
    fn resolve(&self, resource: &Resource, writer: &mut dyn Write)
        -> Result<BlobInfo, ResolveError>;
}

/// One typed resolver, or an ordered set of them.
#[derive(Clone)]
pub enum BlobResolver {
    Typed(Arc<dyn TypedBlobResolver>),
    Aggregated(AggregatedBlobResolver),
}

impl BlobResolver {
    pub fn typed(resolver: impl TypedBlobResolver + 'static) -> Self {
        Self::Typed(Arc::new(resolver))
    }

    /// Describe the blob behind `resource` without transferring it.
    pub fn info(&self, resource: &Resource) -> Result<BlobInfo, ResolveError> {
        self.select(resource)?.info(resource)
    }

    /// Stream the blob behind `resource` into `writer`.
    pub fn resolve(
        &self,
        resource: &Resource,
        writer: &mut dyn Write,
    ) -> Result<BlobInfo, ResolveError> {
        self.select(resource)?.resolve(resource, writer)
    }

    fn select(&self, resource: &Resource) -> Result<&dyn TypedBlobResolver, ResolveError> {
        match self {
            Self::Typed(resolver) => select(std::slice::from_ref(resolver), resource),
            Self::Aggregated(aggregate) => select(&aggregate.resolvers, resource),
        }
    }
}

impl fmt::Debug for BlobResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Typed(_) => f.write_str("BlobResolver::Typed"),
            Self::Aggregated(aggregate) => {
                write!(f, "BlobResolver::Aggregated({} resolvers)", aggregate.len())
            }
        }
    }
}

impl From<AggregatedBlobResolver> for BlobResolver {
    fn from(aggregate: AggregatedBlobResolver) -> Self {
        Self::Aggregated(aggregate)
    }
}

/// Ordered, flat list of typed resolvers. The first match wins.
#[derive(Clone, Default)]
pub struct AggregatedBlobResolver {
    resolvers: Vec<Arc<dyn TypedBlobResolver>>,
}

impl AggregatedBlobResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resolver. Aggregates are flattened in order.
    pub fn add(&mut self, resolver: BlobResolver) {
        match resolver {
            BlobResolver::Typed(typed) => self.resolvers.push(typed),
            BlobResolver::Aggregated(aggregate) => self.resolvers.extend(aggregate.resolvers),
        }
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

/// First resolver in `resolvers` that accepts `resource`.
fn select<'a>(
    resolvers: &'a [Arc<dyn TypedBlobResolver>],
    resource: &Resource,
) -> Result<&'a dyn TypedBlobResolver, ResolveError> {
    let access = resource
        .access
        .as_ref()
        .ok_or_else(|| ResolveError::NoAccessDefined {
            resource: resource.name.clone(),
        })?;
    resolvers
        .iter()
        .find(|r| r.can_resolve(resource))
        .map(|r| r.as_ref())
        .ok_or_else(|| ResolveError::UnsupportedAccessType {
            resource: resource.name.clone(),
            access_type: access.access_type().to_string(),
        })
}

/// Combine two resolvers into one flat aggregate: `a`'s resolvers first.
pub fn aggregate(a: BlobResolver, b: BlobResolver) -> BlobResolver {
    let mut aggregate = match a {
        BlobResolver::Aggregated(aggregate) => aggregate,
        typed @ BlobResolver::Typed(_) => {
            let mut aggregate = AggregatedBlobResolver::new();
            aggregate.add(typed);
            aggregate
        }
    };
    aggregate.add(b);
    BlobResolver::Aggregated(aggregate)
}

// ---------------------------------------------------------------------------
// Implementations
// ---------------------------------------------------------------------------

type FetchFn = dyn Fn(&Resource, &mut dyn Write) -> Result<BlobInfo, ResolveError> + Send + Sync;
type InfoFn = dyn Fn(&Resource) -> Result<BlobInfo, ResolveError> + Send + Sync;

/// Serves every resource whose access type is in a fixed set, by
/// delegating to a fetch function.
///
/// Without an info function, [`TypedBlobResolver::info`] runs the fetch
/// into a sink, which transfers the content.
pub struct AccessTypeResolver {
    access_types: BTreeSet<String>,
    fetch: Box<FetchFn>,
    info: Option<Box<InfoFn>>,
}

impl AccessTypeResolver {
    pub fn new<I, S, F>(access_types: I, fetch: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Resource, &mut dyn Write) -> Result<BlobInfo, ResolveError> + Send + Sync + 'static,
    {
        Self {
            access_types: access_types.into_iter().map(Into::into).collect(),
            fetch: Box::new(fetch),
            info: None,
        }
    }

    /// Answer `info` with `info` instead of a full fetch.
    pub fn with_info<F>(mut self, info: F) -> Self
    where
        F: Fn(&Resource) -> Result<BlobInfo, ResolveError> + Send + Sync + 'static,
    {
        self.info = Some(Box::new(info));
        self
    }
}

impl TypedBlobResolver for AccessTypeResolver {
    fn can_resolve(&self, resource: &Resource) -> bool {
        resource
            .access
            .as_ref()
            .is_some_and(|access| self.access_types.contains(access.access_type()))
    }

    fn info(&self, resource: &Resource) -> Result<BlobInfo, ResolveError> {
        match &self.info {
            Some(info) => info(resource),
            None => (self.fetch)(resource, &mut io::sink()),
        }
    }

    fn resolve(
        &self,
        resource: &Resource,
        writer: &mut dyn Write,
    ) -> Result<BlobInfo, ResolveError> {
        (self.fetch)(resource, writer)
    }
}

/// Serves `localBlob` accesses from a component archive.
///
/// Blob content is checked against its reference before it is returned.
/// The reference's algorithm prefix is looked up in a [`HasherRegistry`];
/// references without a prefix are taken as `sha256`.
#[derive(Debug, Clone)]
pub struct LocalBlobResolver {
    archive: Arc<ComponentArchive>,
    registry: HasherRegistry,
}

impl LocalBlobResolver {
    /// Resolve from `archive`, checking digests with the default hashers.
    pub fn new(archive: Arc<ComponentArchive>) -> Self {
        Self::with_registry(archive, HasherRegistry::with_defaults())
    }

    /// Resolve from `archive`, checking digests with `registry`.
    pub fn with_registry(archive: Arc<ComponentArchive>, registry: HasherRegistry) -> Self {
        Self { archive, registry }
    }

    fn blob<'a>(&'a self, resource: &'a Resource) -> Result<(&'a [u8], BlobInfo), ResolveError> {
        let Some(Access::LocalBlob(local)) = &resource.access else {
            return Err(match &resource.access {
                None => ResolveError::NoAccessDefined {
                    resource: resource.name.clone(),
                },
                Some(other) => ResolveError::UnsupportedAccessType {
                    resource: resource.name.clone(),
                    access_type: other.access_type().to_string(),
                },
            });
        };
        let reference = &local.local_reference;
        let data = self
            .archive
            .blob(reference)
            .ok_or_else(|| ResolveError::LocalBlobNotFound {
                reference: reference.clone(),
            })?;

        let (algorithm, _) = reference.split_once(':').unwrap_or(("sha256", reference.as_str()));
        let hasher = self.registry.get(algorithm)?;
        let computed = format!("{}:{}", hasher.algorithm(), hasher.hash_hex(data));
        if !computed.eq_ignore_ascii_case(reference) {
            return Err(ResolveError::BlobDigestMismatch {
                reference: reference.clone(),
                computed,
            });
        }

        Ok((
            data,
            BlobInfo {
                media_type: local.media_type.clone().unwrap_or_default(),
                digest: computed,
                size: data.len() as u64,
            },
        ))
    }
}

impl TypedBlobResolver for LocalBlobResolver {
    fn can_resolve(&self, resource: &Resource) -> bool {
        matches!(resource.access, Some(Access::LocalBlob(_)))
    }

    fn info(&self, resource: &Resource) -> Result<BlobInfo, ResolveError> {
        self.blob(resource).map(|(_, info)| info)
    }

    fn resolve(
        &self,
        resource: &Resource,
        writer: &mut dyn Write,
    ) -> Result<BlobInfo, ResolveError> {
        let (data, info) = self.blob(resource)?;
        writer.write_all(data)?;
        tracing::debug!(resource = %resource.name, digest = %info.digest, size = info.size, "resolved local blob");
        Ok(info)
    }
}
