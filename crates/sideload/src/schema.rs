//! The resource descriptor contract.
//!
//! A [`Schema`] teaches the encoder how to project one Rust type onto the
//! wire: its resource type, id, attributes and relationships. Schemas are
//! registered once in a [`Registry`](crate::registry::Registry), which keeps
//! them behind the object-safe [`ResourceDescriptor`] trait.

use std::any::{Any, type_name};
use std::fmt;

use serde_json::Value;

use crate::error::{DescriptorResult, EncodeError};
use crate::links::LinkSpec;
use crate::params::IncludePaths;
use crate::types::{Attributes, ResourceIdentifier};

/// Relationships reported by a schema, in the order they should appear.
pub type Relationships<'a> = Vec<(String, Relationship<'a>)>;

/// Per-type adapter from a domain object to a resource.
///
/// Only [`resource_type`](Schema::resource_type), [`id`](Schema::id) and
/// [`attributes`](Schema::attributes) are required. Everything else has a
/// default matching a plain resource with a `self` link in primary data and
/// no relationships.
///
/// Schemas are shared by every encode that uses the registry, so they must not
/// keep mutable state of their own.
///
/// # Example
///
/// ```
/// use sideload::v1::{Attributes, DescriptorResult, IncludePaths, Relationship, Relationships, Schema};
/// use serde_json::json;
///
/// struct Post { id: u32, title: String, author: Author }
/// struct Author { id: u32 }
///
/// struct PostSchema;
///
/// impl Schema for PostSchema {
///     type Resource = Post;
///
///     fn resource_type(&self) -> &str { "posts" }
///
///     fn id(&self, post: &Post) -> String { post.id.to_string() }
///
///     fn attributes(&self, post: &Post) -> DescriptorResult<Attributes> {
///         let mut attributes = Attributes::new();
///         attributes.insert("title".into(), json!(post.title));
///         Ok(attributes)
///     }
///
///     fn relationships<'a>(
///         &self,
///         post: &'a Post,
///         _requested: &IncludePaths,
///     ) -> DescriptorResult<Relationships<'a>> {
///         Ok(vec![("author".into(), Relationship::one(&post.author))])
///     }
/// }
/// ```
pub trait Schema: Send + Sync + 'static {
    /// The domain type this schema describes.
    type Resource: Any;

    /// Wire `type` of every resource this schema produces.
    fn resource_type(&self) -> &str;

    fn id(&self, resource: &Self::Resource) -> String;

    /// Attributes in the order they should be emitted.
    fn attributes(&self, resource: &Self::Resource) -> DescriptorResult<Attributes>;

    /// Relationships of `resource`.
    ///
    /// `requested` holds the include paths below this resource, so
    /// `requested.contains("posts")` tells whether the client asked to expand
    /// `posts`. A schema may use it to skip relationships nobody asked for.
    ///
    /// A resource reached along several include paths is asked once per
    /// path. Eager data is used as returned on each call, while deferred data
    /// is produced on the first call that needs it and reused for the rest of
    /// the encode.
    fn relationships<'a>(
        &self,
        resource: &'a Self::Resource,
        requested: &IncludePaths,
    ) -> DescriptorResult<Relationships<'a>> {
        let _ = (resource, requested);
        Ok(Relationships::new())
    }

    /// URL fragment the resource id is appended to for the `self` link.
    fn self_sub_url(&self) -> String {
        format!("/{}/", self.resource_type())
    }

    fn show_self_in_primary(&self) -> bool {
        true
    }

    fn show_self_in_included(&self) -> bool {
        false
    }

    fn show_relationships_in_included(&self) -> bool {
        true
    }

    /// Resource-level meta when the resource is primary data.
    fn primary_meta(&self, resource: &Self::Resource) -> Option<Value> {
        let _ = resource;
        None
    }

    /// Resource-level meta when the resource is side-loaded.
    fn inclusion_meta(&self, resource: &Self::Resource) -> Option<Value> {
        let _ = resource;
        None
    }

    /// Meta attached to identifiers that point at the resource.
    fn linkage_meta(&self, resource: &Self::Resource) -> Option<Value> {
        let _ = resource;
        None
    }

    /// Extra resource links besides `self`.
    fn resource_links(&self, resource: &Self::Resource) -> Vec<(String, LinkSpec)> {
        let _ = resource;
        Vec::new()
    }

    /// Include paths used when the client sends no `include` parameter.
    fn default_include_paths(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Object-safe view of a [`Schema`], operating on `&dyn Any`.
///
/// Every method fails with [`EncodeError::DescriptorMismatch`] when handed an
/// object of the wrong type and wraps schema failures in
/// [`EncodeError::Descriptor`].
pub trait ResourceDescriptor: Send + Sync {
    fn resource_type(&self) -> &str;
    fn self_sub_url(&self) -> String;
    fn show_self_in_primary(&self) -> bool;
    fn show_self_in_included(&self) -> bool;
    fn show_relationships_in_included(&self) -> bool;
    fn default_include_paths(&self) -> Vec<String>;

    fn id(&self, resource: &dyn Any) -> Result<String, EncodeError>;
    fn attributes(&self, resource: &dyn Any) -> Result<Attributes, EncodeError>;
    fn relationships<'a>(
        &self,
        resource: &'a dyn Any,
        requested: &IncludePaths,
    ) -> Result<Relationships<'a>, EncodeError>;
    fn primary_meta(&self, resource: &dyn Any) -> Result<Option<Value>, EncodeError>;
    fn inclusion_meta(&self, resource: &dyn Any) -> Result<Option<Value>, EncodeError>;
    fn linkage_meta(&self, resource: &dyn Any) -> Result<Option<Value>, EncodeError>;
    fn resource_links(&self, resource: &dyn Any) -> Result<Vec<(String, LinkSpec)>, EncodeError>;
}

/// Adapter registering a typed [`Schema`] as a [`ResourceDescriptor`].
pub(crate) struct Described<S>(pub(crate) S);

impl<S: Schema> Described<S> {
    fn downcast<'a>(&self, resource: &'a dyn Any) -> Result<&'a S::Resource, EncodeError> {
        resource
            .downcast_ref::<S::Resource>()
            .ok_or_else(|| EncodeError::DescriptorMismatch {
                resource_type: self.0.resource_type().to_string(),
                expected: type_name::<S::Resource>(),
            })
    }

    fn failed(&self, source: crate::error::BoxError) -> EncodeError {
        EncodeError::Descriptor {
            resource_type: self.0.resource_type().to_string(),
            source,
        }
    }
}

impl<S: Schema> ResourceDescriptor for Described<S> {
    fn resource_type(&self) -> &str {
        self.0.resource_type()
    }

    fn self_sub_url(&self) -> String {
        self.0.self_sub_url()
    }

    fn show_self_in_primary(&self) -> bool {
        self.0.show_self_in_primary()
    }

    fn show_self_in_included(&self) -> bool {
        self.0.show_self_in_included()
    }

    fn show_relationships_in_included(&self) -> bool {
        self.0.show_relationships_in_included()
    }

    fn default_include_paths(&self) -> Vec<String> {
        self.0.default_include_paths()
    }

    fn id(&self, resource: &dyn Any) -> Result<String, EncodeError> {
        Ok(self.0.id(self.downcast(resource)?))
    }

    fn attributes(&self, resource: &dyn Any) -> Result<Attributes, EncodeError> {
        self.0
            .attributes(self.downcast(resource)?)
            .map_err(|e| self.failed(e))
    }

    fn relationships<'a>(
        &self,
        resource: &'a dyn Any,
        requested: &IncludePaths,
    ) -> Result<Relationships<'a>, EncodeError> {
        self.0
            .relationships(self.downcast(resource)?, requested)
            .map_err(|e| self.failed(e))
    }

    fn primary_meta(&self, resource: &dyn Any) -> Result<Option<Value>, EncodeError> {
        Ok(self.0.primary_meta(self.downcast(resource)?))
    }

    fn inclusion_meta(&self, resource: &dyn Any) -> Result<Option<Value>, EncodeError> {
        Ok(self.0.inclusion_meta(self.downcast(resource)?))
    }

    fn linkage_meta(&self, resource: &dyn Any) -> Result<Option<Value>, EncodeError> {
        Ok(self.0.linkage_meta(self.downcast(resource)?))
    }

    fn resource_links(&self, resource: &dyn Any) -> Result<Vec<(String, LinkSpec)>, EncodeError> {
        Ok(self.0.resource_links(self.downcast(resource)?))
    }
}

// ============================================================================
// References and relationship data
// ============================================================================

/// A reference to a related resource: a domain object borrowed for the
/// duration of one encode, or a bare identifier.
///
/// Objects are looked up in the registry by their concrete type, so pass the
/// object itself rather than a smart pointer to it (`&**arc`, not `&arc`).
#[derive(Clone)]
pub enum ResourceRef<'a> {
    Object {
        value: &'a dyn Any,
        type_name: &'static str,
    },
    Identifier(ResourceIdentifier),
}

impl<'a> ResourceRef<'a> {
    pub fn object<T: Any>(value: &'a T) -> Self {
        ResourceRef::Object {
            value,
            type_name: type_name::<T>(),
        }
    }

    pub fn identifier(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        ResourceRef::Identifier(ResourceIdentifier::new(resource_type, id))
    }
}

impl fmt::Debug for ResourceRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceRef::Object { type_name, .. } => {
                f.debug_tuple("Object").field(type_name).finish()
            }
            ResourceRef::Identifier(id) => f.debug_tuple("Identifier").field(id).finish(),
        }
    }
}

/// Resolved relationship data.
#[derive(Debug, Clone)]
pub enum Related<'a> {
    /// Present but empty to-one relationship (`"data": null`).
    Null,
    One(ResourceRef<'a>),
    Many(Vec<ResourceRef<'a>>),
}

impl<'a> Related<'a> {
    pub fn one<T: Any>(value: &'a T) -> Self {
        Related::One(ResourceRef::object(value))
    }

    pub fn many<T: Any>(values: impl IntoIterator<Item = &'a T>) -> Self {
        Related::Many(values.into_iter().map(ResourceRef::object).collect())
    }

    /// `Null` for `None`, otherwise a to-one relationship.
    pub fn optional<T: Any>(value: Option<&'a T>) -> Self {
        value.map_or(Related::Null, Related::one)
    }
}

/// Producer of relationship data, run at most once per encode.
pub type Deferred<'a> = Box<dyn FnOnce() -> DescriptorResult<Related<'a>> + 'a>;

/// Relationship data, either at hand or deferred until the encoder needs it.
pub enum RelationshipData<'a> {
    Eager(Related<'a>),
    Deferred(Deferred<'a>),
}

impl fmt::Debug for RelationshipData<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationshipData::Eager(related) => f.debug_tuple("Eager").field(related).finish(),
            RelationshipData::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// One relationship as reported by a [`Schema`].
///
/// # Example
///
/// ```
/// use sideload::v1::{LinkSpec, Related, Relationship};
/// use serde_json::json;
///
/// struct Comment { id: u32 }
/// let comments = vec![Comment { id: 1 }, Comment { id: 2 }];
///
/// let relationship = Relationship::deferred(|| Ok(Related::many(&comments)))
///     .with_related_link()
///     .with_link("first", LinkSpec::new("/comments?page=1"))
///     .with_meta(json!({ "total": 2 }));
/// assert!(relationship.shows_data());
/// ```
#[derive(Debug)]
pub struct Relationship<'a> {
    pub data: RelationshipData<'a>,
    pub show_data: bool,
    pub show_self: bool,
    pub show_related: bool,
    pub links: Vec<(String, LinkSpec)>,
    pub meta: Option<Value>,
}

impl<'a> Relationship<'a> {
    pub fn new(data: RelationshipData<'a>) -> Self {
        Self {
            data,
            show_data: true,
            show_self: false,
            show_related: false,
            links: Vec::new(),
            meta: None,
        }
    }

    pub fn related(related: Related<'a>) -> Self {
        Self::new(RelationshipData::Eager(related))
    }

    /// To-one relationship pointing at `value`.
    pub fn one<T: Any>(value: &'a T) -> Self {
        Self::related(Related::one(value))
    }

    /// To-many relationship over `values`, in order.
    pub fn many<T: Any>(values: impl IntoIterator<Item = &'a T>) -> Self {
        Self::related(Related::many(values))
    }

    /// Empty to-one relationship.
    pub fn null() -> Self {
        Self::related(Related::Null)
    }

    /// To-one relationship to a resource known only by type and id.
    pub fn identifier(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::related(Related::One(ResourceRef::identifier(resource_type, id)))
    }

    /// Relationship whose data is computed only if the encoder emits it.
    pub fn deferred<F>(producer: F) -> Self
    where
        F: FnOnce() -> DescriptorResult<Related<'a>> + 'a,
    {
        Self::new(RelationshipData::Deferred(Box::new(producer)))
    }

    /// Leave out `data`; the relationship is reported through links and meta
    /// only and nothing is included through it.
    pub fn hide_data(mut self) -> Self {
        self.show_data = false;
        self
    }

    /// Add `self`: `<resource self>/relationships/<name>`.
    pub fn with_self_link(mut self) -> Self {
        self.show_self = true;
        self
    }

    /// Add `related`: `<resource self>/<name>`.
    pub fn with_related_link(mut self) -> Self {
        self.show_related = true;
        self
    }

    pub fn with_link(mut self, name: impl Into<String>, link: LinkSpec) -> Self {
        self.links.push((name.into(), link));
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn shows_data(&self) -> bool {
        self.show_data
    }
}
