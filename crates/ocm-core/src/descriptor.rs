//! # Component Descriptor: Data Model
//!
//! Typed access to the component descriptor fields needed for digesting,
//! signing and addressing. The persisted form (`component-descriptor.yaml`)
//! uses the camelCase field names of the serde attributes below.
//!
//! A descriptor is identified by `(name, version)`. The digest and signing
//! machinery never mutates a descriptor in place; changes go through the
//! explicit append methods on [`ComponentDescriptor`].

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Schema version written by this crate.
pub const SCHEMA_VERSION_V2: &str = "v2";

/// Identity attributes of an element: `name`, `version` and any extra
/// identity entries, in sorted key order.
pub type Identity = BTreeMap<String, String>;

/// Descriptor metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Descriptor schema version, e.g. `v2`.
    pub schema_version: String,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V2.to_string(),
        }
    }
}

/// The structured manifest describing one component version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    /// Descriptor metadata.
    #[serde(default)]
    pub meta: Metadata,
    /// The component version itself.
    pub component: Component,
    /// Signatures over the normalised descriptor, in append order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signatures: Vec<Signature>,
}

/// The content of a component version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    /// Component name, e.g. `github.com/acme/app`.
    pub name: String,
    /// Semantic version of the component.
    pub version: String,
    /// Organisation providing the component.
    pub provider: String,
    /// Repository contexts; order is meaningful (most recent last).
    #[serde(default)]
    pub repository_contexts: Vec<RepositoryContext>,
    /// Source artifacts.
    #[serde(default)]
    pub sources: Vec<Source>,
    /// References to other component versions.
    #[serde(default)]
    pub component_references: Vec<ComponentReference>,
    /// Deliverable artifacts.
    #[serde(default)]
    pub resources: Vec<Resource>,
    /// Component-level labels.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
}

impl ComponentDescriptor {
    /// Create an empty descriptor for `name:version`.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            meta: Metadata::default(),
            component: Component {
                name: name.into(),
                version: version.into(),
                provider: provider.into(),
                repository_contexts: Vec::new(),
                sources: Vec::new(),
                component_references: Vec::new(),
                resources: Vec::new(),
                labels: Vec::new(),
            },
            signatures: Vec::new(),
        }
    }

    /// Component name.
    pub fn name(&self) -> &str {
        &self.component.name
    }

    /// Component version.
    pub fn version(&self) -> &str {
        &self.component.version
    }

    /// Append a signature. Existing signatures, including ones with the
    /// same name, are left untouched.
    pub fn add_signature(&mut self, signature: Signature) {
        self.signatures.push(signature);
    }

    /// Return the first signature named `name`.
    ///
    /// Duplicate names are not rejected anywhere; lookup is first match wins.
    pub fn signature(&self, name: &str) -> Option<&Signature> {
        self.signatures.iter().find(|s| s.name == name)
    }

    /// Append a resource.
    pub fn add_resource(&mut self, resource: Resource) {
        self.component.resources.push(resource);
    }

    /// Append a source.
    pub fn add_source(&mut self, source: Source) {
        self.component.sources.push(source);
    }

    /// Append a component reference.
    pub fn add_reference(&mut self, reference: ComponentReference) {
        self.component.component_references.push(reference);
    }

    /// Append a repository context; it becomes the most recent one.
    pub fn add_repository_context(&mut self, context: RepositoryContext) {
        self.component.repository_contexts.push(context);
    }

    /// Append a component-level label.
    pub fn add_label(&mut self, label: Label) {
        self.component.labels.push(label);
    }

    /// Return the first resource named `name`.
    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.component.resources.iter().find(|r| r.name == name)
    }
}

impl std::fmt::Display for ComponentDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.component.name, self.component.version)
    }
}

/// A repository in which the component version is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryContext {
    /// Repository type, e.g. `ociRegistry`.
    #[serde(rename = "type")]
    pub context_type: String,
    /// Base URL of the repository.
    pub base_url: String,
}

/// A name/value annotation. Labels are order-irrelevant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    /// Label name.
    pub name: String,
    /// Arbitrary JSON value.
    pub value: Value,
}

impl Label {
    /// Create a label.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Relation of a resource to the component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceRelation {
    /// Built and shipped by this component.
    Local,
    /// Consumed from a third party.
    External,
}

impl ResourceRelation {
    /// The serialized name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::External => "external",
        }
    }
}

/// A source artifact of the component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Source name, unique together with the extra identity.
    pub name: String,
    /// Source version.
    pub version: String,
    /// Source type, e.g. `git`.
    #[serde(rename = "type")]
    pub source_type: String,
    /// Identity attributes beyond name and version.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_identity: BTreeMap<String, String>,
    /// Element labels.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
    /// Where the content lives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<Access>,
    /// Content digest, filled in when the descriptor is digested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<DigestSpec>,
}

impl Source {
    /// Create a source without access or digest.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        source_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            source_type: source_type.into(),
            extra_identity: BTreeMap::new(),
            labels: Vec::new(),
            access: None,
            digest: None,
        }
    }

    /// Set the access.
    pub fn with_access(mut self, access: Access) -> Self {
        self.access = Some(access);
        self
    }

    /// Identity attributes used for sorting and lookup.
    pub fn identity(&self) -> Identity {
        element_identity(&self.name, &self.version, &self.extra_identity)
    }
}

/// A deliverable artifact of the component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Resource name, unique together with the extra identity.
    pub name: String,
    /// Resource version.
    pub version: String,
    /// Resource type, e.g. `ociImage`.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Whether the component builds or consumes the resource.
    pub relation: ResourceRelation,
    /// Identity attributes beyond name and version.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_identity: BTreeMap<String, String>,
    /// Element labels.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
    /// Where the content lives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<Access>,
    /// Content digest, filled in when the descriptor is digested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<DigestSpec>,
}

impl Resource {
    /// Create a resource without access or digest.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        resource_type: impl Into<String>,
        relation: ResourceRelation,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            resource_type: resource_type.into(),
            relation,
            extra_identity: BTreeMap::new(),
            labels: Vec::new(),
            access: None,
            digest: None,
        }
    }

    /// Set the access.
    pub fn with_access(mut self, access: Access) -> Self {
        self.access = Some(access);
        self
    }

    /// Add an extra identity attribute.
    pub fn with_extra_identity(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_identity.insert(key.into(), value.into());
        self
    }

    /// Add a label.
    pub fn with_label(mut self, label: Label) -> Self {
        self.labels.push(label);
        self
    }

    /// Identity attributes used for sorting and lookup.
    pub fn identity(&self) -> Identity {
        element_identity(&self.name, &self.version, &self.extra_identity)
    }
}

/// A reference to another component version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentReference {
    /// Local name of the reference.
    pub name: String,
    /// Name of the referenced component.
    pub component_name: String,
    /// Version of the referenced component.
    pub version: String,
    /// Identity attributes beyond name and version.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_identity: BTreeMap<String, String>,
    /// Element labels.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
    /// Digest of the referenced component descriptor, pinning transitive trust.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<DigestSpec>,
}

impl ComponentReference {
    /// Create an unpinned reference.
    pub fn new(
        name: impl Into<String>,
        component_name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            component_name: component_name.into(),
            version: version.into(),
            extra_identity: BTreeMap::new(),
            labels: Vec::new(),
            digest: None,
        }
    }

    /// Identity attributes used for sorting and lookup.
    pub fn identity(&self) -> Identity {
        let mut identity = element_identity(&self.name, &self.version, &self.extra_identity);
        identity.insert("componentName".to_string(), self.component_name.clone());
        identity
    }
}

fn element_identity(name: &str, version: &str, extra: &BTreeMap<String, String>) -> Identity {
    let mut identity = extra.clone();
    identity.insert("name".to_string(), name.to_string());
    identity.insert("version".to_string(), version.to_string());
    identity
}

// ---------------------------------------------------------------------------
// Access
// ---------------------------------------------------------------------------

/// Where the binary content of a source or resource lives.
///
/// Serialized as a flat object tagged by `type`. Any type other than
/// `localBlob` is kept as an [`ExternalAccess`] with its attributes intact.
#[derive(Debug, Clone, PartialEq)]
pub enum Access {
    /// Content stored next to the descriptor in the same component archive.
    LocalBlob(LocalBlobAccess),
    /// Content stored anywhere else (OCI registry, HTTP, git, ...).
    External(ExternalAccess),
}

/// Access to a blob stored in the same component archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalBlobAccess {
    /// Content digest of the blob, e.g. `sha256:<hex>`.
    pub local_reference: String,
    /// Media type of the blob content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

/// Any access type this crate does not interpret.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalAccess {
    /// The `type` field.
    pub access_type: String,
    /// Every other field, kept verbatim.
    pub attributes: BTreeMap<String, Value>,
}

impl ExternalAccess {
    /// Create an access of the given type with no attributes.
    pub fn new(access_type: impl Into<String>) -> Self {
        Self {
            access_type: access_type.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Set an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

impl Access {
    /// Access type id of local blobs.
    pub const LOCAL_BLOB_TYPE: &'static str = "localBlob";

    /// Build a local blob access for the given content digest.
    pub fn local_blob(local_reference: impl Into<String>, media_type: Option<String>) -> Self {
        Self::LocalBlob(LocalBlobAccess {
            local_reference: local_reference.into(),
            media_type,
        })
    }

    /// The access type id.
    pub fn access_type(&self) -> &str {
        match self {
            Self::LocalBlob(_) => Self::LOCAL_BLOB_TYPE,
            Self::External(e) => &e.access_type,
        }
    }

    /// Render the flat, `type`-tagged JSON form.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        match self {
            Self::LocalBlob(local) => {
                map.insert(
                    "localReference".to_string(),
                    Value::String(local.local_reference.clone()),
                );
                if let Some(media_type) = &local.media_type {
                    map.insert("mediaType".to_string(), Value::String(media_type.clone()));
                }
            }
            Self::External(external) => {
                for (k, v) in &external.attributes {
                    map.insert(k.clone(), v.clone());
                }
            }
        }
        map.insert(
            "type".to_string(),
            Value::String(self.access_type().to_string()),
        );
        Value::Object(map)
    }

    /// Parse the flat, `type`-tagged JSON form.
    pub fn from_value(value: Value) -> Result<Self, String> {
        let Value::Object(mut map) = value else {
            return Err("access must be an object".to_string());
        };
        let access_type = match map.remove("type") {
            Some(Value::String(t)) if !t.is_empty() => t,
            Some(_) => return Err("access type must be a non-empty string".to_string()),
            None => return Err("access is missing its type".to_string()),
        };
        if access_type == Self::LOCAL_BLOB_TYPE {
            let local: LocalBlobAccess =
                serde_json::from_value(Value::Object(map)).map_err(|e| e.to_string())?;
            return Ok(Self::LocalBlob(local));
        }
        Ok(Self::External(ExternalAccess {
            access_type,
            attributes: map.into_iter().collect(),
        }))
    }
}

impl Serialize for Access {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Access {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Digests and signatures
// ---------------------------------------------------------------------------

/// A digest together with the algorithms that produced it.
///
/// Equality is structural over all three fields: the same hash value under a
/// different normalisation algorithm is a different digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestSpec {
    /// Hash algorithm name, e.g. `sha256`.
    pub hash_algorithm: String,
    /// Normalisation algorithm id, e.g. `jsonNormalisation/v1`.
    pub normalisation_algorithm: String,
    /// Lowercase hex.
    pub value: String,
}

impl std::fmt::Display for DigestSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} ({})",
            self.hash_algorithm, self.value, self.normalisation_algorithm
        )
    }
}

/// A signature value and its encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureSpec {
    /// Signature algorithm, e.g. `RSASSA-PKCS1-V1_5`.
    pub algorithm: String,
    /// Encoded signature value.
    pub value: String,
    /// Encoding of `value`: hex or PEM.
    pub media_type: String,
}

/// A named signature over a descriptor digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// User-chosen label; not deduplicated.
    pub name: String,
    /// The digest that was signed.
    pub digest: DigestSpec,
    /// The signature over `digest`.
    pub signature: SignatureSpec,
}

/// Describes resolvable blob content without transferring it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobInfo {
    /// Media type; empty when unknown.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub media_type: String,
    /// Content digest, e.g. `sha256:<hex>`.
    pub digest: String,
    /// Size in bytes.
    pub size: u64,
}
