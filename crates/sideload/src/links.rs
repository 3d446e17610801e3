//! Link and identifier assembly.
//!
//! Schemas hand out links relative to the API root ([`LinkSpec`]); the
//! [`LinkAssembler`] turns them into wire [`Link`]s by prepending the
//! encoder's URL prefix.

use serde_json::Value;

use crate::error::EncodeError;
use crate::schema::{ResourceDescriptor, ResourceRef};
use crate::types::{Link, ResourceIdentifier};

/// A link as supplied by a schema.
///
/// Relative hrefs are prefixed with the encoder's URL prefix; absolute ones
/// are emitted verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkSpec {
    pub href: String,
    pub meta: Option<Value>,
    pub absolute: bool,
}

impl LinkSpec {
    /// Link relative to the API root, e.g. `"/posts/321/comments"`.
    pub fn new(sub_href: impl Into<String>) -> Self {
        Self {
            href: sub_href.into(),
            meta: None,
            absolute: false,
        }
    }

    /// Link used as-is, never prefixed.
    pub fn absolute(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            meta: None,
            absolute: true,
        }
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// Builds `self`, relationship and custom links under one URL prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkAssembler<'p> {
    prefix: &'p str,
}

impl<'p> LinkAssembler<'p> {
    pub fn new(prefix: &'p str) -> Self {
        Self { prefix }
    }

    /// `<prefix><sub_url><id>`, e.g. `/sites/` + `1` → `/sites/1`.
    pub fn resource_self(&self, sub_url: &str, id: &str) -> String {
        format!("{}{}{}", self.prefix, sub_url, id)
    }

    /// `<resource self>/relationships/<name>`.
    pub fn relationship_self(&self, resource_self: &str, name: &str) -> Link {
        Link::Href(format!(
            "{}/relationships/{}",
            resource_self.trim_end_matches('/'),
            name
        ))
    }

    /// `<resource self>/<name>`.
    pub fn relationship_related(&self, resource_self: &str, name: &str) -> Link {
        Link::Href(format!("{}/{}", resource_self.trim_end_matches('/'), name))
    }

    pub fn resolve(&self, spec: LinkSpec) -> Link {
        let href = if spec.absolute {
            spec.href
        } else {
            format!("{}{}", self.prefix, spec.href)
        };
        Link::new(href, spec.meta)
    }
}

/// The identifier for `reference`, with the descriptor's linkage meta.
///
/// Bare identifiers pass through unchanged.
pub fn identifier(
    descriptor: &dyn ResourceDescriptor,
    reference: &ResourceRef<'_>,
) -> Result<ResourceIdentifier, EncodeError> {
    match reference {
        ResourceRef::Identifier(identifier) => Ok(identifier.clone()),
        ResourceRef::Object { value, .. } => Ok(ResourceIdentifier {
            resource_type: descriptor.resource_type().to_string(),
            id: descriptor.id(*value)?,
            meta: descriptor.linkage_meta(*value)?,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DescriptorResult;
    use crate::schema::{Described, Schema};
    use crate::types::Attributes;
    use serde_json::json;

    struct Person {
        id: u64,
    }

    struct PersonSchema;

    impl Schema for PersonSchema {
        type Resource = Person;

        fn resource_type(&self) -> &str {
            "people"
        }

        fn id(&self, person: &Person) -> String {
            person.id.to_string()
        }

        fn attributes(&self, _: &Person) -> DescriptorResult<Attributes> {
            Ok(Attributes::new())
        }

        fn linkage_meta(&self, person: &Person) -> Option<Value> {
            (person.id == 0).then(|| json!({"anonymous": true}))
        }
    }

    #[test]
    fn test_resource_self_without_prefix() {
        let links = LinkAssembler::default();
        assert_eq!(links.resource_self("/sites/", "1"), "/sites/1");
    }

    #[test]
    fn test_resource_self_with_prefix() {
        let links = LinkAssembler::new("http://example.com");
        assert_eq!(
            links.resource_self("/sites/", "1"),
            "http://example.com/sites/1"
        );
    }

    #[test]
    fn test_relationship_links() {
        let links = LinkAssembler::default();
        assert_eq!(
            links.relationship_self("/sites/1", "posts").href(),
            "/sites/1/relationships/posts"
        );
        assert_eq!(
            links.relationship_related("/sites/1/", "posts").href(),
            "/sites/1/posts"
        );
    }

    #[test]
    fn test_resolve_prefixes_relative_links_only() {
        let links = LinkAssembler::new("http://example.com");
        assert_eq!(
            links.resolve(LinkSpec::new("/posts?page=2")).href(),
            "http://example.com/posts?page=2"
        );
        assert_eq!(
            links.resolve(LinkSpec::absolute("https://docs.example.com")).href(),
            "https://docs.example.com"
        );
    }

    #[test]
    fn test_resolve_keeps_meta() {
        let link = LinkAssembler::default()
            .resolve(LinkSpec::new("/posts").with_meta(json!({"count": 10})));
        assert_eq!(link.meta(), Some(&json!({"count": 10})));
    }

    #[test]
    fn test_identifier_from_object() {
        let descriptor = Described(PersonSchema);
        let person = Person { id: 123 };
        let id = identifier(&descriptor, &ResourceRef::object(&person)).unwrap();
        assert_eq!(id, ResourceIdentifier::new("people", "123"));

        let anonymous = Person { id: 0 };
        let id = identifier(&descriptor, &ResourceRef::object(&anonymous)).unwrap();
        assert_eq!(id.meta, Some(json!({"anonymous": true})));
    }

    #[test]
    fn test_identifier_passthrough() {
        let descriptor = Described(PersonSchema);
        let id = identifier(&descriptor, &ResourceRef::identifier("people", "7")).unwrap();
        assert_eq!(id.id, "7");
    }
}
