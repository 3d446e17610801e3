#![doc = include_str!("../README.md")]

mod encoder;
mod error;
mod links;
mod media;
mod params;
mod registry;
mod schema;
mod types;

pub mod v1 {
    //! Versioned public API for encoding JSON:API documents.
    //!
    //! Everything you need is re-exported from this module. The API falls into
    //! four groups:
    //!
    //! # Describing resources
    //!
    //! - [`Schema`]: per-type adapter from a domain object to a resource
    //! - [`Relationship`], [`Related`], [`ResourceRef`]: what a schema reports
    //!   for each relationship, eagerly or deferred
    //! - [`Registry`]: maps Rust types to their schemas, built once at startup
    //!
    //! # Encoding
    //!
    //! - [`Encoder`]: walks an object graph into a [`Document`]
    //! - [`Root`]: the primary data, one object, a collection, or nothing
    //! - [`EncoderOptions`]: URL prefix, pretty printing, `jsonapi` version
    //!
    //! # Requests
    //!
    //! - [`parse_request`] / [`parse_query`]: query string to
    //!   [`EncodingParameters`] (include paths, sparse fieldsets, sort, paging)
    //! - [`Negotiator`]: `Content-Type` and `Accept` against
    //!   `application/vnd.api+json` and its extensions
    //! - [`RequestError`]: client errors, renderable as an [`ErrorDocument`]
    //!
    //! # Wire types
    //!
    //! [`Document`], [`ResourceObject`], [`RelationshipObject`], [`Linkage`],
    //! [`ResourceIdentifier`], [`Link`] and the error document types, all
    //! `serde` serializable.
    //!
    //! # Example: a site with its posts side-loaded
    //!
    //! ```
    //! use std::sync::Arc;
    //! use serde_json::json;
    //! use sideload::v1::*;
    //!
    //! struct Site { id: u32, name: String, posts: Vec<Post> }
    //! struct Post { id: u32, title: String }
    //!
    //! struct SiteSchema;
    //! impl Schema for SiteSchema {
    //!     type Resource = Site;
    //!     fn resource_type(&self) -> &str { "sites" }
    //!     fn id(&self, site: &Site) -> String { site.id.to_string() }
    //!     fn attributes(&self, site: &Site) -> DescriptorResult<Attributes> {
    //!         let mut attributes = Attributes::new();
    //!         attributes.insert("name".into(), json!(site.name));
    //!         Ok(attributes)
    //!     }
    //!     fn relationships<'a>(
    //!         &self,
    //!         site: &'a Site,
    //!         _requested: &IncludePaths,
    //!     ) -> DescriptorResult<Relationships<'a>> {
    //!         Ok(vec![("posts".into(), Relationship::many(&site.posts))])
    //!     }
    //! }
    //!
    //! struct PostSchema;
    //! impl Schema for PostSchema {
    //!     type Resource = Post;
    //!     fn resource_type(&self) -> &str { "posts" }
    //!     fn id(&self, post: &Post) -> String { post.id.to_string() }
    //!     fn attributes(&self, post: &Post) -> DescriptorResult<Attributes> {
    //!         let mut attributes = Attributes::new();
    //!         attributes.insert("title".into(), json!(post.title));
    //!         Ok(attributes)
    //!     }
    //! }
    //!
    //! let registry = Registry::builder()
    //!     .register(SiteSchema)
    //!     .register(PostSchema)
    //!     .build();
    //! let encoder = Encoder::new(Arc::new(registry));
    //!
    //! let site = Site {
    //!     id: 1,
    //!     name: "JSON API Samples".into(),
    //!     posts: vec![Post { id: 321, title: "Included objects".into() }],
    //! };
    //!
    //! let params = parse_query(&RawQuery::parse("include=posts")).unwrap();
    //! let document = encoder.encode(Root::one(&site), &params).unwrap();
    //!
    //! assert_eq!(document.included.len(), 1);
    //! assert_eq!(
    //!     serde_json::to_value(&document).unwrap()["data"]["relationships"]["posts"],
    //!     json!({ "data": [{ "type": "posts", "id": "321" }] })
    //! );
    //! ```

    pub use crate::encoder::{Encoder, EncoderOptions, Root};
    pub use crate::error::{
        BoxError, DescriptorResult, EncodeError, MediaTypeError, RequestError,
    };
    pub use crate::links::{LinkAssembler, LinkSpec, identifier};
    pub use crate::media::{
        AcceptHeader, AcceptRange, JSON_API_MEDIA_TYPE, MediaType, Negotiated, Negotiator,
    };
    pub use crate::params::{
        CurrentRequest, EncodingParameters, IncludePaths, QueryValue, RawQuery, SortParameter,
        StaticRequest, parse_query, parse_request,
    };
    pub use crate::registry::{Registry, RegistryBuilder};
    pub use crate::schema::{
        Deferred, Related, Relationship, RelationshipData, Relationships, ResourceDescriptor,
        ResourceRef, Schema,
    };
    pub use crate::types::{
        Attributes, Document, ErrorDocument, ErrorObject, ErrorSource, JsonApiObject, Link,
        Linkage, Links, PrimaryData, RelationshipObject, RelationshipObjects, ResourceIdentifier,
        ResourceKey, ResourceObject,
    };
}
