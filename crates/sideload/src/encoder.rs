//! The document builder.
//!
//! [`Encoder::encode`] walks the object graph from the roots, turning every
//! object into a resource through its registered descriptor. Relationships on
//! a requested include path are followed and their targets side-loaded into
//! `included`; everything else is emitted as linkage only.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::EncodeError;
use crate::links::{self, LinkAssembler};
use crate::params::{EncodingParameters, IncludePaths};
use crate::registry::Registry;
use crate::schema::{Related, Relationship, RelationshipData, ResourceDescriptor, ResourceRef};
use crate::types::{
    Document, ErrorDocument, ErrorObject, JsonApiObject, Link, Linkage, PrimaryData,
    RelationshipObject, ResourceIdentifier, ResourceKey, ResourceObject,
};

/// Options controlling the documents an [`Encoder`] produces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncoderOptions {
    /// Prepended to every relative link, e.g. `http://example.com/api`.
    pub url_prefix: Option<String>,
    /// Pretty-print JSON from [`Encoder::to_json`].
    pub pretty: bool,
    /// Emit a top-level `jsonapi` member with this version.
    pub jsonapi_version: Option<String>,
}

impl EncoderOptions {
    pub fn with_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.url_prefix = Some(prefix.into());
        self
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn with_jsonapi_version(mut self, version: impl Into<String>) -> Self {
        self.jsonapi_version = Some(version.into());
        self
    }
}

/// What to put in `data`: nothing, one resource, or a collection.
#[derive(Debug, Clone, Default)]
pub enum Root<'a> {
    #[default]
    Null,
    One(ResourceRef<'a>),
    Many(Vec<ResourceRef<'a>>),
}

impl<'a> Root<'a> {
    pub fn one<T: Any>(value: &'a T) -> Self {
        Root::One(ResourceRef::object(value))
    }

    pub fn many<T: Any>(values: impl IntoIterator<Item = &'a T>) -> Self {
        Root::Many(values.into_iter().map(ResourceRef::object).collect())
    }
}

/// Builds documents from domain objects using a shared [`Registry`].
///
/// An encoder holds no per-call state; every [`encode`](Encoder::encode)
/// starts from scratch, so one encoder can serve concurrent requests.
#[derive(Debug, Clone)]
pub struct Encoder {
    registry: Arc<Registry>,
    options: EncoderOptions,
}

impl Encoder {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            options: EncoderOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EncoderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &EncoderOptions {
        &self.options
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encode `root` as primary data, side-loading whatever `params`
    /// asks for.
    ///
    /// When `params.include_paths` is `None` each root uses its descriptor's
    /// default include paths. A root repeated in a collection is emitted once.
    pub fn encode(
        &self,
        root: Root<'_>,
        params: &EncodingParameters,
    ) -> Result<Document, EncodeError> {
        let mut walk = Walk::new(&self.registry, params, self.link_assembler());
        let data = match root {
            Root::Null => PrimaryData::Null,
            Root::One(reference) => {
                walk.primary(vec![reference])?;
                walk.data
                    .pop()
                    .map_or(PrimaryData::Null, |object| PrimaryData::Resource(Box::new(object)))
            }
            Root::Many(references) => {
                walk.primary(references)?;
                PrimaryData::Resources(std::mem::take(&mut walk.data))
            }
        };
        debug!(included = walk.included.len(), "Encoded document");

        let mut document = self.document(Some(data));
        document.included = walk.included;
        Ok(document)
    }

    /// Encode `root` as resource identifiers only, as for a relationship
    /// endpoint.
    pub fn encode_identifiers(&self, root: Root<'_>) -> Result<Document, EncodeError> {
        let as_object = |reference: &ResourceRef<'_>| {
            identify(&self.registry, reference).map(|identifier| ResourceObject {
                meta: identifier.meta,
                ..ResourceObject::new(identifier.resource_type, identifier.id)
            })
        };
        let data = match root {
            Root::Null => PrimaryData::Null,
            Root::One(reference) => PrimaryData::Resource(Box::new(as_object(&reference)?)),
            Root::Many(references) => PrimaryData::Resources(
                references
                    .iter()
                    .map(as_object)
                    .collect::<Result<_, _>>()?,
            ),
        };
        Ok(self.document(Some(data)))
    }

    /// A document with top-level `meta` and no `data`.
    pub fn encode_meta(&self, meta: Value) -> Document {
        self.document(None).with_meta(meta)
    }

    pub fn encode_errors(&self, errors: impl IntoIterator<Item = ErrorObject>) -> ErrorDocument {
        let mut document = ErrorDocument::new(errors);
        document.jsonapi = self.jsonapi();
        document
    }

    /// Serialize a document, pretty-printed if the options say so.
    pub fn to_json<T: Serialize>(&self, document: &T) -> Result<String, serde_json::Error> {
        if self.options.pretty {
            serde_json::to_string_pretty(document)
        } else {
            serde_json::to_string(document)
        }
    }

    fn link_assembler(&self) -> LinkAssembler<'_> {
        LinkAssembler::new(self.options.url_prefix.as_deref().unwrap_or_default())
    }

    fn jsonapi(&self) -> Option<JsonApiObject> {
        self.options
            .jsonapi_version
            .as_ref()
            .map(|version| JsonApiObject {
                version: version.clone(),
                meta: None,
            })
    }

    fn document(&self, data: Option<PrimaryData>) -> Document {
        Document {
            data,
            jsonapi: self.jsonapi(),
            ..Document::default()
        }
    }
}

/// Identifier for `reference`, resolving objects through the registry.
fn identify(
    registry: &Registry,
    reference: &ResourceRef<'_>,
) -> Result<ResourceIdentifier, EncodeError> {
    match reference {
        ResourceRef::Identifier(identifier) => Ok(identifier.clone()),
        ResourceRef::Object { value, type_name } => {
            let descriptor = registry.resolve_object(*value, *type_name)?;
            links::identifier(descriptor, reference)
        }
    }
}

// ============================================================================
// Graph walk
// ============================================================================

/// Relationships to follow from one resource, with their resolved data.
type Follow<'a> = Vec<(String, Related<'a>)>;

/// Where a placed resource object lives.
#[derive(Debug, Clone, Copy)]
enum Slot {
    Data(usize),
    Included(usize),
}

enum Pending<'r, 'a> {
    Identifier(ResourceIdentifier),
    Object {
        descriptor: &'r dyn ResourceDescriptor,
        value: &'a dyn Any,
        key: ResourceKey,
    },
}

/// State of one encode pass.
///
/// Include paths shrink by one segment per relationship followed, so the
/// walk is bounded by the longest path even on cyclic graphs. `visited`
/// keeps a resource reached twice with the same remaining paths from being
/// walked twice; `placed` keeps it from being emitted twice and remembers
/// its object, so linkage found on a later visit lands on the emitted copy.
struct Walk<'r, 'a> {
    registry: &'r Registry,
    params: &'r EncodingParameters,
    links: LinkAssembler<'r>,
    placed: HashMap<ResourceKey, Slot>,
    visited: HashSet<(ResourceKey, IncludePaths)>,
    resolved: HashMap<(ResourceKey, String), Related<'a>>,
    data: Vec<ResourceObject>,
    included: Vec<ResourceObject>,
}

impl<'r, 'a> Walk<'r, 'a> {
    fn new(
        registry: &'r Registry,
        params: &'r EncodingParameters,
        links: LinkAssembler<'r>,
    ) -> Self {
        Self {
            registry,
            params,
            links,
            placed: HashMap::new(),
            visited: HashSet::new(),
            resolved: HashMap::new(),
            data: Vec::new(),
            included: Vec::new(),
        }
    }

    /// Build the primary resources into `data`. All roots are built before
    /// any relationship is followed, so none of them can end up in `included`.
    fn primary(&mut self, references: Vec<ResourceRef<'a>>) -> Result<(), EncodeError> {
        let registry = self.registry;
        let mut pending = Vec::with_capacity(references.len());
        for reference in references {
            let (key, root) = match reference {
                ResourceRef::Identifier(identifier) => {
                    (identifier.key(), Pending::Identifier(identifier))
                }
                ResourceRef::Object { value, type_name } => {
                    let descriptor = registry.resolve_object(value, type_name)?;
                    let key = ResourceKey::new(descriptor.resource_type(), descriptor.id(value)?);
                    let root = Pending::Object {
                        descriptor,
                        value,
                        key: key.clone(),
                    };
                    (key, root)
                }
            };
            if self.placed.contains_key(&key) {
                trace!(%key, "Skipping repeated primary resource");
                continue;
            }
            self.placed.insert(key, Slot::Data(pending.len()));
            pending.push(root);
        }

        let mut walks = Vec::new();
        for root in pending {
            match root {
                Pending::Identifier(identifier) => self.data.push(ResourceObject {
                    meta: identifier.meta,
                    ..ResourceObject::new(identifier.resource_type, identifier.id)
                }),
                Pending::Object {
                    descriptor,
                    value,
                    key,
                } => {
                    let paths = match &self.params.include_paths {
                        Some(paths) => paths.clone(),
                        None => IncludePaths::new(descriptor.default_include_paths()),
                    };
                    debug!(%key, include = ?paths, "Encoding primary resource");
                    self.visited.insert((key.clone(), paths.clone()));
                    let (object, follow) = self.build(descriptor, value, &key, &paths, true)?;
                    self.data.push(object);
                    walks.push((follow, paths));
                }
            }
        }
        for (follow, paths) in walks {
            self.expand(follow, &paths)?;
        }
        Ok(())
    }

    /// Side-load the targets of the followed relationships.
    fn expand(&mut self, follow: Follow<'a>, paths: &IncludePaths) -> Result<(), EncodeError> {
        for (name, related) in follow {
            let nested = paths.nested(&name);
            let targets = match related {
                Related::Null => Vec::new(),
                Related::One(target) => vec![target],
                Related::Many(targets) => targets,
            };
            for target in targets {
                self.include(target, &nested)?;
            }
        }
        Ok(())
    }

    fn include(&mut self, target: ResourceRef<'a>, paths: &IncludePaths) -> Result<(), EncodeError> {
        // A bare identifier has nothing to side-load.
        let ResourceRef::Object { value, type_name } = target else {
            return Ok(());
        };
        let registry = self.registry;
        let descriptor = registry.resolve_object(value, type_name)?;
        let key = ResourceKey::new(descriptor.resource_type(), descriptor.id(value)?);
        if !self.visited.insert((key.clone(), paths.clone())) {
            trace!(%key, "Already visited");
            return Ok(());
        }

        let follow = if !self.placed.contains_key(&key) {
            trace!(%key, "Including resource");
            self.placed
                .insert(key.clone(), Slot::Included(self.included.len()));
            let (object, follow) = self.build(descriptor, value, &key, paths, false)?;
            self.included.push(object);
            follow
        } else {
            trace!(%key, "Already placed, following deeper paths only");
            self.follow(descriptor, value, &key, paths)?
        };
        self.expand(follow, paths)
    }

    /// Build the full resource object and collect the relationships to
    /// follow from it.
    fn build(
        &mut self,
        descriptor: &'r dyn ResourceDescriptor,
        value: &'a dyn Any,
        key: &ResourceKey,
        paths: &IncludePaths,
        primary: bool,
    ) -> Result<(ResourceObject, Follow<'a>), EncodeError> {
        let mut object = ResourceObject::new(key.resource_type.clone(), key.id.clone());
        object.attributes = descriptor.attributes(value)?;
        if let Some(fields) = self.params.fields_for(&key.resource_type) {
            object.attributes.retain(|name, _| fields.contains(name));
        }

        let resource_self = self
            .links
            .resource_self(&descriptor.self_sub_url(), &key.id);
        let show_relationships = primary || descriptor.show_relationships_in_included();
        let mut follow = Vec::new();
        if show_relationships || !paths.is_empty() {
            for (name, relationship) in descriptor.relationships(value, paths)? {
                let traverse = paths.contains(&name);
                let (rendered, related) = self.relationship(
                    descriptor,
                    key,
                    &name,
                    relationship,
                    &resource_self,
                    show_relationships || traverse,
                )?;
                if show_relationships || traverse {
                    object.relationships.insert(name.clone(), rendered);
                }
                if let Some(related) = related.filter(|_| traverse) {
                    follow.push((name, related));
                }
            }
        }

        let show_self = if primary {
            descriptor.show_self_in_primary()
        } else {
            descriptor.show_self_in_included()
        };
        if show_self {
            object
                .links
                .insert("self".to_string(), Link::Href(resource_self));
        }
        for (name, spec) in descriptor.resource_links(value)? {
            object.links.insert(name, self.links.resolve(spec));
        }
        object.meta = if primary {
            descriptor.primary_meta(value)?
        } else {
            descriptor.inclusion_meta(value)?
        };
        Ok((object, follow))
    }

    /// Relationships to follow from a resource that is already placed.
    ///
    /// A relationship first traversed on this visit is rendered onto the
    /// placed object, so everything side-loaded through it stays linked.
    fn follow(
        &mut self,
        descriptor: &'r dyn ResourceDescriptor,
        value: &'a dyn Any,
        key: &ResourceKey,
        paths: &IncludePaths,
    ) -> Result<Follow<'a>, EncodeError> {
        let mut follow = Vec::new();
        if paths.is_empty() {
            return Ok(follow);
        }
        let resource_self = self
            .links
            .resource_self(&descriptor.self_sub_url(), &key.id);
        for (name, relationship) in descriptor.relationships(value, paths)? {
            if !relationship.show_data || !paths.contains(&name) {
                continue;
            }
            if self.is_linked(key, &name) {
                let related = self.resolve(descriptor, key, &name, relationship.data)?;
                follow.push((name, related));
                continue;
            }
            trace!(%key, relationship = %name, "Linking newly followed relationship");
            let (rendered, related) =
                self.relationship(descriptor, key, &name, relationship, &resource_self, true)?;
            if let Some(object) = self.placed_object(key) {
                object.relationships.insert(name.clone(), rendered);
            }
            if let Some(related) = related {
                follow.push((name, related));
            }
        }
        Ok(follow)
    }

    fn placed_object(&mut self, key: &ResourceKey) -> Option<&mut ResourceObject> {
        match *self.placed.get(key)? {
            Slot::Data(index) => self.data.get_mut(index),
            Slot::Included(index) => self.included.get_mut(index),
        }
    }

    /// Whether the placed object already carries data for `name`.
    fn is_linked(&mut self, key: &ResourceKey, name: &str) -> bool {
        self.placed_object(key)
            .and_then(|object| object.relationships.get(name))
            .is_some_and(|relationship| relationship.data.is_some())
    }

    /// Render one relationship. Returns its data too when it was resolved.
    fn relationship(
        &mut self,
        owner: &'r dyn ResourceDescriptor,
        key: &ResourceKey,
        name: &str,
        relationship: Relationship<'a>,
        resource_self: &str,
        needs_data: bool,
    ) -> Result<(RelationshipObject, Option<Related<'a>>), EncodeError> {
        let mut rendered = RelationshipObject::default();
        if relationship.show_self {
            rendered.links.insert(
                "self".to_string(),
                self.links.relationship_self(resource_self, name),
            );
        }
        if relationship.show_related {
            rendered.links.insert(
                "related".to_string(),
                self.links.relationship_related(resource_self, name),
            );
        }
        for (link_name, spec) in relationship.links {
            rendered.links.insert(link_name, self.links.resolve(spec));
        }
        rendered.meta = relationship.meta;

        if !relationship.show_data || !needs_data {
            return Ok((rendered, None));
        }
        let related = self.resolve(owner, key, name, relationship.data)?;
        rendered.data = Some(self.linkage(&related)?);
        Ok((rendered, Some(related)))
    }

    /// Relationship data. Deferred data is produced at most once per resource
    /// and relationship; eager data is taken as given on every visit.
    fn resolve(
        &mut self,
        owner: &'r dyn ResourceDescriptor,
        key: &ResourceKey,
        name: &str,
        data: RelationshipData<'a>,
    ) -> Result<Related<'a>, EncodeError> {
        let producer = match data {
            RelationshipData::Eager(related) => return Ok(related),
            RelationshipData::Deferred(producer) => producer,
        };
        let slot = (key.clone(), name.to_string());
        if let Some(related) = self.resolved.get(&slot) {
            return Ok(related.clone());
        }
        trace!(%key, relationship = name, "Resolving deferred relationship");
        let related = producer().map_err(|source| EncodeError::Descriptor {
            resource_type: owner.resource_type().to_string(),
            source,
        })?;
        self.resolved.insert(slot, related.clone());
        Ok(related)
    }

    fn linkage(&self, related: &Related<'a>) -> Result<Linkage, EncodeError> {
        Ok(match related {
            Related::Null => Linkage::Null,
            Related::One(target) => Linkage::One(identify(self.registry, target)?),
            Related::Many(targets) => Linkage::Many(
                targets
                    .iter()
                    .map(|target| identify(self.registry, target))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DescriptorResult;
    use crate::links::LinkSpec;
    use crate::schema::{Relationships, Schema};
    use crate::types::Attributes;
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Tag {
        label: &'static str,
    }

    struct Article {
        id: u32,
        title: &'static str,
        tags: Vec<Tag>,
        audits: Cell<u32>,
        broken: bool,
    }

    impl Article {
        fn new(id: u32, title: &'static str, tags: Vec<Tag>) -> Self {
            Self {
                id,
                title,
                tags,
                audits: Cell::new(0),
                broken: false,
            }
        }
    }

    struct TagSchema;

    impl Schema for TagSchema {
        type Resource = Tag;

        fn resource_type(&self) -> &str {
            "tags"
        }

        fn id(&self, tag: &Tag) -> String {
            tag.label.to_string()
        }

        fn attributes(&self, tag: &Tag) -> DescriptorResult<Attributes> {
            let mut attributes = Attributes::new();
            attributes.insert("label".into(), json!(tag.label));
            Ok(attributes)
        }

        fn show_self_in_included(&self) -> bool {
            true
        }
    }

    struct ArticleSchema;

    impl Schema for ArticleSchema {
        type Resource = Article;

        fn resource_type(&self) -> &str {
            "articles"
        }

        fn id(&self, article: &Article) -> String {
            article.id.to_string()
        }

        fn attributes(&self, article: &Article) -> DescriptorResult<Attributes> {
            let mut attributes = Attributes::new();
            attributes.insert("title".into(), json!(article.title));
            attributes.insert("words".into(), json!(article.title.len()));
            Ok(attributes)
        }

        fn relationships<'a>(
            &self,
            article: &'a Article,
            _requested: &IncludePaths,
        ) -> DescriptorResult<Relationships<'a>> {
            let broken = article.broken;
            Ok(vec![
                ("tags".into(), Relationship::many(&article.tags).with_related_link()),
                (
                    "audit".into(),
                    Relationship::deferred(move || {
                        article.audits.set(article.audits.get() + 1);
                        if broken {
                            return Err("audit log unavailable".into());
                        }
                        Ok(Related::Null)
                    })
                    .hide_data()
                    .with_self_link(),
                ),
                ("owner".into(), Relationship::identifier("people", "9")),
            ])
        }

        fn resource_links(&self, article: &Article) -> Vec<(String, LinkSpec)> {
            vec![(
                "canonical".into(),
                LinkSpec::absolute(format!("https://example.com/a/{}", article.id)),
            )]
        }

        fn default_include_paths(&self) -> Vec<String> {
            vec!["tags".into()]
        }
    }

    fn encoder() -> Encoder {
        let registry = Registry::builder()
            .register(TagSchema)
            .register(ArticleSchema)
            .build();
        Encoder::new(Arc::new(registry))
    }

    fn no_include() -> EncodingParameters {
        EncodingParameters::new().with_include(Vec::<String>::new())
    }

    fn to_value(document: &Document) -> Value {
        serde_json::to_value(document).unwrap()
    }

    // ── Primary data ───────────────────────────────────────────────────

    #[test]
    fn test_null_root() {
        let document = encoder()
            .encode(Root::Null, &EncodingParameters::new())
            .unwrap();
        assert_eq!(to_value(&document), json!({"data": null}));
    }

    #[test]
    fn test_empty_collection() {
        let document = encoder()
            .encode(Root::many(Vec::<&Article>::new()), &no_include())
            .unwrap();
        assert_eq!(to_value(&document), json!({"data": []}));
    }

    #[test]
    fn test_single_resource_without_include() {
        let article = Article::new(1, "Hello", vec![Tag { label: "rust" }]);
        let document = encoder().encode(Root::one(&article), &no_include()).unwrap();
        assert_eq!(
            to_value(&document),
            json!({
                "data": {
                    "type": "articles",
                    "id": "1",
                    "attributes": {"title": "Hello", "words": 5},
                    "relationships": {
                        "audit": {"links": {"self": "/articles/1/relationships/audit"}},
                        "owner": {"data": {"type": "people", "id": "9"}},
                        "tags": {
                            "data": [{"type": "tags", "id": "rust"}],
                            "links": {"related": "/articles/1/tags"}
                        }
                    },
                    "links": {
                        "canonical": "https://example.com/a/1",
                        "self": "/articles/1"
                    }
                }
            })
        );
    }

    #[test]
    fn test_repeated_roots_emitted_once() {
        let a = Article::new(1, "One", vec![]);
        let b = Article::new(2, "Two", vec![]);
        let again = Article::new(1, "One again", vec![]);
        let document = encoder()
            .encode(Root::many([&a, &b, &again]), &no_include())
            .unwrap();
        let ids: Vec<&str> = document.primary().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(document.primary()[0].attributes["title"], json!("One"));
    }

    #[test]
    fn test_identifier_root_passes_through() {
        let document = encoder()
            .encode(
                Root::One(ResourceRef::identifier("people", "9")),
                &EncodingParameters::new(),
            )
            .unwrap();
        assert_eq!(
            to_value(&document),
            json!({"data": {"type": "people", "id": "9"}})
        );
    }

    // ── Included ───────────────────────────────────────────────────────

    #[test]
    fn test_include_dedups_shared_targets() {
        let a = Article::new(1, "One", vec![Tag { label: "rust" }, Tag { label: "web" }]);
        let b = Article::new(2, "Two", vec![Tag { label: "web" }, Tag { label: "cli" }]);
        let params = EncodingParameters::new().with_include(["tags"]);
        let document = encoder().encode(Root::many([&a, &b]), &params).unwrap();

        let included: Vec<String> = document
            .included
            .iter()
            .map(|r| r.key().to_string())
            .collect();
        assert_eq!(included, vec!["tags:rust", "tags:web", "tags:cli"]);
        assert_eq!(
            document.included[0].links.get("self").map(Link::href),
            Some("/tags/rust")
        );
    }

    #[test]
    fn test_default_include_paths_apply_without_include_parameter() {
        let article = Article::new(1, "Hello", vec![Tag { label: "rust" }]);
        let document = encoder()
            .encode(Root::one(&article), &EncodingParameters::new())
            .unwrap();
        assert_eq!(document.included.len(), 1);

        let document = encoder().encode(Root::one(&article), &no_include()).unwrap();
        assert!(document.included.is_empty());
    }

    #[test]
    fn test_unknown_include_path_ignored() {
        let article = Article::new(1, "Hello", vec![Tag { label: "rust" }]);
        let params = EncodingParameters::new().with_include(["comments.author", "tags.nothing"]);
        let document = encoder().encode(Root::one(&article), &params).unwrap();
        assert_eq!(document.included.len(), 1);
    }

    #[test]
    fn test_field_sets_filter_attributes() {
        let article = Article::new(1, "Hello", vec![Tag { label: "rust" }]);
        let params = no_include()
            .with_fields("articles", ["words", "missing"])
            .with_fields("tags", Vec::<String>::new());
        let document = encoder().encode(Root::one(&article), &params).unwrap();
        let primary = document.primary()[0];
        assert_eq!(primary.attributes.keys().collect::<Vec<_>>(), vec!["words"]);
    }

    // ── Linkage found on a later visit ─────────────────────────────────

    struct Stop {
        name: &'static str,
        routes: Vec<(&'static str, Rc<Stop>)>,
    }

    impl Stop {
        fn new(name: &'static str, routes: Vec<(&'static str, Rc<Stop>)>) -> Rc<Self> {
            Rc::new(Self { name, routes })
        }
    }

    /// Reports a route only when the client asked to follow it.
    struct StopSchema {
        relationships_in_included: bool,
    }

    impl Schema for StopSchema {
        type Resource = Stop;

        fn resource_type(&self) -> &str {
            "stops"
        }

        fn id(&self, stop: &Stop) -> String {
            stop.name.to_string()
        }

        fn attributes(&self, _stop: &Stop) -> DescriptorResult<Attributes> {
            Ok(Attributes::new())
        }

        fn relationships<'a>(
            &self,
            stop: &'a Stop,
            requested: &IncludePaths,
        ) -> DescriptorResult<Relationships<'a>> {
            Ok(stop
                .routes
                .iter()
                .filter(|(name, _)| requested.contains(name))
                .map(|(name, next)| (name.to_string(), Relationship::one(&**next)))
                .collect())
        }

        fn show_relationships_in_included(&self) -> bool {
            self.relationships_in_included
        }
    }

    fn stop_encoder(relationships_in_included: bool) -> Encoder {
        let schema = StopSchema {
            relationships_in_included,
        };
        Encoder::new(Arc::new(Registry::builder().register(schema).build()))
    }

    fn linkage_ids(object: &ResourceObject, name: &str) -> Vec<String> {
        object
            .relationships
            .get(name)
            .and_then(|relationship| relationship.data.as_ref())
            .map(|linkage| linkage.identifiers().iter().map(|i| i.id.clone()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_late_path_links_already_included_resource() {
        let d = Stop::new("d", vec![]);
        let b = Stop::new("b", vec![("d", d)]);
        let c = Stop::new("c", vec![("b", b.clone())]);
        let a = Stop::new("a", vec![("b", b), ("c", c)]);

        let params = EncodingParameters::new().with_include(["b", "c.b.d"]);
        let document = stop_encoder(true).encode(Root::one(&*a), &params).unwrap();

        let included: Vec<&str> = document.included.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(included, vec!["b", "c", "d"]);
        let b = document.find_included("stops", "b").unwrap();
        assert_eq!(linkage_ids(b, "d"), vec!["d"]);
    }

    #[test]
    fn test_late_path_links_primary_resource() {
        let c = Stop::new("c", vec![]);
        let b = Stop::new("b", vec![("c", c)]);
        let a = Stop::new("a", vec![("b", b.clone())]);

        let params = EncodingParameters::new().with_include(["b.c"]);
        let document = stop_encoder(true)
            .encode(Root::Many(vec![ResourceRef::object(&*a), ResourceRef::object(&*b)]), &params)
            .unwrap();

        let included: Vec<&str> = document.included.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(included, vec!["c"]);
        assert_eq!(linkage_ids(document.primary()[1], "c"), vec!["c"]);
    }

    #[test]
    fn test_traversed_relationship_shown_when_included_relationships_hidden() {
        let c = Stop::new("c", vec![]);
        let b = Stop::new("b", vec![("c", c)]);
        let a = Stop::new("a", vec![("b", b)]);

        let params = EncodingParameters::new().with_include(["b.c"]);
        let document = stop_encoder(false).encode(Root::one(&*a), &params).unwrap();

        let b = document.find_included("stops", "b").unwrap();
        assert_eq!(linkage_ids(b, "c"), vec!["c"]);
        let c = document.find_included("stops", "c").unwrap();
        assert!(c.relationships.is_empty());
    }

    // ── Deferred data ──────────────────────────────────────────────────

    #[test]
    fn test_hidden_deferred_data_never_produced() {
        let article = Article::new(1, "Hello", vec![]);
        let params = EncodingParameters::new().with_include(["audit"]);
        encoder().encode(Root::one(&article), &params).unwrap();
        assert_eq!(article.audits.get(), 0);
    }

    #[test]
    fn test_deferred_failure_is_fatal() {
        struct Failing;
        struct FailingSchema;

        impl Schema for FailingSchema {
            type Resource = Failing;

            fn resource_type(&self) -> &str {
                "failing"
            }

            fn id(&self, _: &Failing) -> String {
                "1".into()
            }

            fn attributes(&self, _: &Failing) -> DescriptorResult<Attributes> {
                Ok(Attributes::new())
            }

            fn relationships<'a>(
                &self,
                _: &'a Failing,
                _: &IncludePaths,
            ) -> DescriptorResult<Relationships<'a>> {
                Ok(vec![(
                    "parent".into(),
                    Relationship::deferred(|| Err("database gone".into())),
                )])
            }
        }

        let encoder = Encoder::new(Arc::new(Registry::builder().register(FailingSchema).build()));
        let err = encoder
            .encode(Root::one(&Failing), &EncodingParameters::new())
            .unwrap_err();
        assert!(matches!(err, EncodeError::Descriptor { ref resource_type, .. } if resource_type == "failing"));
        assert!(err.to_string().contains("database gone"));
    }

    #[test]
    fn test_unregistered_related_type_is_fatal() {
        struct Orphan;
        let article = Article::new(1, "Hello", vec![]);
        let encoder = encoder();

        let err = encoder
            .encode(Root::one(&Orphan), &EncodingParameters::new())
            .unwrap_err();
        assert!(matches!(err, EncodeError::UnregisteredType { .. }));

        // The registered root still encodes.
        assert!(encoder.encode(Root::one(&article), &no_include()).is_ok());
    }

    // ── Options and other documents ────────────────────────────────────

    #[test]
    fn test_url_prefix_and_version() {
        let article = Article::new(7, "Hi", vec![]);
        let encoder = encoder().with_options(
            EncoderOptions::default()
                .with_url_prefix("http://example.com")
                .with_jsonapi_version("1.0"),
        );
        let document = encoder.encode(Root::one(&article), &no_include()).unwrap();
        let value = to_value(&document);
        assert_eq!(value["jsonapi"], json!({"version": "1.0"}));
        assert_eq!(value["data"]["links"]["self"], json!("http://example.com/articles/7"));
        assert_eq!(
            value["data"]["links"]["canonical"],
            json!("https://example.com/a/7")
        );
        assert_eq!(
            value["data"]["relationships"]["tags"]["links"]["related"],
            json!("http://example.com/articles/7/tags")
        );
    }

    #[test]
    fn test_encode_identifiers() {
        let a = Article::new(1, "One", vec![]);
        let b = Article::new(2, "Two", vec![]);
        let document = encoder().encode_identifiers(Root::many([&a, &b])).unwrap();
        assert_eq!(
            to_value(&document),
            json!({"data": [
                {"type": "articles", "id": "1"},
                {"type": "articles", "id": "2"}
            ]})
        );
    }

    #[test]
    fn test_encode_meta_has_no_data() {
        let document = encoder().encode_meta(json!({"count": 3}));
        assert_eq!(to_value(&document), json!({"meta": {"count": 3}}));
    }

    #[test]
    fn test_encode_errors() {
        let encoder = encoder().with_options(EncoderOptions::default().with_jsonapi_version("1.0"));
        let document = encoder.encode_errors([ErrorObject {
            status: Some("404".into()),
            ..ErrorObject::default()
        }]);
        assert_eq!(
            serde_json::to_value(&document).unwrap(),
            json!({"errors": [{"status": "404"}], "jsonapi": {"version": "1.0"}})
        );
    }

    #[test]
    fn test_to_json_honours_pretty() {
        let document = encoder().encode_meta(json!({"a": 1}));
        assert!(!encoder().to_json(&document).unwrap().contains('\n'));

        let pretty = encoder().with_options(EncoderOptions::default().with_pretty(true));
        assert!(pretty.to_json(&document).unwrap().contains('\n'));
    }
}
