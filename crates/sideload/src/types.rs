use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Resource attributes in descriptor order.
pub type Attributes = serde_json::Map<String, Value>;

/// Named links (`self`, `related`, ...).
pub type Links = BTreeMap<String, Link>;

/// Relationship objects keyed by relationship name.
pub type RelationshipObjects = BTreeMap<String, RelationshipObject>;

/// Keeps an explicit `null` as `Some(..)` so it stays distinct from an absent
/// member on the way back in.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

// ============================================================================
// Document
// ============================================================================

/// A top-level JSON:API document.
///
/// `data` is absent only for meta-only documents. An encode of no resources
/// carries `PrimaryData::Null`, which serializes as `"data": null`.
///
/// # JSON shape
///
/// ```json
/// {
///   "data": { "type": "sites", "id": "1", "attributes": { "name": "JSON API Samples" } },
///   "included": [ { "type": "posts", "id": "321", "attributes": { … } } ],
///   "links": { "self": "/sites/1" },
///   "meta": { … }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<PrimaryData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included: Vec<ResourceObject>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub links: Links,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonapi: Option<JsonApiObject>,
}

/// Primary data: a single resource, a collection, or `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryData {
    Null,
    Resource(Box<ResourceObject>),
    Resources(Vec<ResourceObject>),
}

/// The `jsonapi` member describing the server implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonApiObject {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

// ============================================================================
// Resources
// ============================================================================

/// One resource with its attributes and relationships.
///
/// Identity is the `(type, id)` pair, see [`ResourceObject::key`]. Empty
/// members are left out of the serialized form, so a resource object with
/// nothing but `type` and `id` reads exactly like a resource identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceObject {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: Attributes,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relationships: RelationshipObjects,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub links: Links,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// A `{type, id}` reference to a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// Hashable `(type, id)` identity of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub resource_type: String,
    pub id: String,
}

/// A relationship as it appears under `relationships`.
///
/// `data` is `None` when the descriptor hid linkage for this relationship;
/// `Some(Linkage::Null)` is an empty to-one relationship.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipObject {
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<Linkage>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub links: Links,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// Resource linkage: `null`, one identifier, or a list of identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Linkage {
    Null,
    One(ResourceIdentifier),
    Many(Vec<ResourceIdentifier>),
}

/// A link: a bare URL string, or `{ "href", "meta" }` when it carries meta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Link {
    Href(String),
    Object {
        href: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        meta: Option<Value>,
    },
}

// ============================================================================
// Errors
// ============================================================================

/// A document carrying `errors` instead of `data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorDocument {
    pub errors: Vec<ErrorObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonapi: Option<JsonApiObject>,
}

/// A single error object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub links: Links,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ErrorSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// Where in the request an error originated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

// ============================================================================
// Convenience methods
// ============================================================================

impl Document {
    /// A document with the given primary data and nothing else.
    pub fn with_data(data: PrimaryData) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    /// Parse a document from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Set top-level meta.
    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Add a top-level link.
    pub fn with_link(mut self, name: impl Into<String>, link: Link) -> Self {
        self.links.insert(name.into(), link);
        self
    }

    /// Primary resources in document order (empty for `null` or absent data).
    pub fn primary(&self) -> Vec<&ResourceObject> {
        match &self.data {
            Some(PrimaryData::Resource(r)) => vec![r.as_ref()],
            Some(PrimaryData::Resources(rs)) => rs.iter().collect(),
            Some(PrimaryData::Null) | None => Vec::new(),
        }
    }

    /// Look up an included resource by type and id.
    pub fn find_included(&self, resource_type: &str, id: &str) -> Option<&ResourceObject> {
        self.included
            .iter()
            .find(|r| r.resource_type == resource_type && r.id == id)
    }
}

impl ResourceObject {
    /// Create a resource object with no attributes, relationships, or links.
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            attributes: Attributes::new(),
            relationships: RelationshipObjects::new(),
            links: Links::new(),
            meta: None,
        }
    }

    /// The `(type, id)` identity of this resource.
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(&self.resource_type, &self.id)
    }

    /// An identifier pointing at this resource.
    pub fn identifier(&self) -> ResourceIdentifier {
        ResourceIdentifier::new(&self.resource_type, &self.id)
    }
}

impl ResourceIdentifier {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            meta: None,
        }
    }

    /// The `(type, id)` identity this identifier points at.
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(&self.resource_type, &self.id)
    }
}

impl ResourceKey {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.id)
    }
}

impl Linkage {
    /// Identifiers in this linkage, in order.
    pub fn identifiers(&self) -> Vec<&ResourceIdentifier> {
        match self {
            Linkage::Null => Vec::new(),
            Linkage::One(id) => vec![id],
            Linkage::Many(ids) => ids.iter().collect(),
        }
    }
}

impl Link {
    /// A link with optional meta; without meta it serializes as a plain string.
    pub fn new(href: impl Into<String>, meta: Option<Value>) -> Self {
        match meta {
            Some(meta) => Link::Object {
                href: href.into(),
                meta: Some(meta),
            },
            None => Link::Href(href.into()),
        }
    }

    pub fn href(&self) -> &str {
        match self {
            Link::Href(href) | Link::Object { href, .. } => href,
        }
    }

    pub fn meta(&self) -> Option<&Value> {
        match self {
            Link::Href(_) => None,
            Link::Object { meta, .. } => meta.as_ref(),
        }
    }
}

impl ErrorDocument {
    pub fn new(errors: impl IntoIterator<Item = ErrorObject>) -> Self {
        Self {
            errors: errors.into_iter().collect(),
            meta: None,
            jsonapi: None,
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl From<&crate::error::RequestError> for ErrorObject {
    fn from(err: &crate::error::RequestError) -> Self {
        use crate::error::RequestError;

        let title = match err {
            RequestError::InvalidQuery { .. } => "Invalid query parameter",
            RequestError::UnsupportedMediaType(_) => "Unsupported media type",
            RequestError::NotAcceptable(_) => "Not acceptable",
        };
        Self {
            status: Some(err.status().to_string()),
            title: Some(title.to_string()),
            detail: Some(err.to_string()),
            source: err.parameter().map(|p| ErrorSource {
                pointer: None,
                parameter: Some(p.to_string()),
            }),
            ..Self::default()
        }
    }
}

impl From<&crate::error::RequestError> for ErrorDocument {
    fn from(err: &crate::error::RequestError) -> Self {
        Self::new([ErrorObject::from(err)])
    }
}
