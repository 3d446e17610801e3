//! A small blog domain: sites, posts, people and comments.
//!
//! Datasets are JSON files with one array per type, referencing each other by
//! id. Loading resolves the references into a shared object graph.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use serde_json::json;
use sideload::v1::{
    Attributes, DescriptorResult, IncludePaths, LinkSpec, Registry, Related, Relationship,
    Relationships, ResourceRef, Schema,
};

/// The built-in dataset.
pub const SAMPLE: &str = r#"
{
  "sites": [
    { "id": "1", "name": "JSON API Samples", "posts": ["321"] }
  ],
  "posts": [
    {
      "id": "321",
      "title": "Included objects",
      "body": "Yes, it is supported",
      "author": "123",
      "comments": ["456", "789"]
    }
  ],
  "people": [
    { "id": "123", "first_name": "John", "last_name": "Dow" }
  ],
  "comments": [
    { "id": "456", "body": "Included objects work as easy as basic ones", "author": "123" },
    { "id": "789", "body": "Let's try!", "author": "123" }
  ]
}
"#;

// ============================================================================
// Domain
// ============================================================================

pub struct Site {
    pub id: String,
    pub name: String,
    pub posts: Vec<Arc<Post>>,
}

pub struct Post {
    pub id: String,
    pub title: String,
    pub body: String,
    pub author: Option<Arc<Person>>,
    pub comments: Vec<Arc<Comment>>,
}

/// A person knows the comments they wrote. Set once after loading; the
/// person↔comment cycle lives as long as the process.
pub struct Person {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub comments: OnceLock<Vec<Arc<Comment>>>,
}

pub struct Comment {
    pub id: String,
    pub body: String,
    pub author: Option<Arc<Person>>,
}

pub struct Blog {
    sites: HashMap<String, Arc<Site>>,
    posts: HashMap<String, Arc<Post>>,
    people: HashMap<String, Arc<Person>>,
    comments: HashMap<String, Arc<Comment>>,
}

// ============================================================================
// Dataset format
// ============================================================================

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Dataset {
    #[serde(default)]
    sites: Vec<SiteRecord>,
    #[serde(default)]
    posts: Vec<PostRecord>,
    #[serde(default)]
    people: Vec<PersonRecord>,
    #[serde(default)]
    comments: Vec<CommentRecord>,
}

#[derive(Deserialize)]
struct SiteRecord {
    id: String,
    name: String,
    #[serde(default)]
    posts: Vec<String>,
}

#[derive(Deserialize)]
struct PostRecord {
    id: String,
    title: String,
    #[serde(default)]
    body: String,
    author: Option<String>,
    #[serde(default)]
    comments: Vec<String>,
}

#[derive(Deserialize)]
struct PersonRecord {
    id: String,
    first_name: String,
    last_name: String,
}

#[derive(Deserialize)]
struct CommentRecord {
    id: String,
    body: String,
    author: Option<String>,
}

fn find<T>(items: &HashMap<String, Arc<T>>, kind: &str, id: &str, owner: &str) -> Result<Arc<T>> {
    items
        .get(id)
        .cloned()
        .ok_or_else(|| anyhow!("{} references unknown {} '{}'", owner, kind, id))
}

impl Blog {
    pub fn sample() -> Result<Self> {
        Self::from_json(SAMPLE)
    }

    /// Load a dataset and resolve its id references.
    pub fn from_json(json: &str) -> Result<Self> {
        let dataset: Dataset = serde_json::from_str(json).context("Invalid blog dataset")?;

        let mut people = HashMap::new();
        for record in dataset.people {
            let person = Person {
                id: record.id.clone(),
                first_name: record.first_name,
                last_name: record.last_name,
                comments: OnceLock::new(),
            };
            if people.insert(record.id.clone(), Arc::new(person)).is_some() {
                bail!("duplicate person '{}'", record.id);
            }
        }

        let mut comments = HashMap::new();
        let mut written: HashMap<String, Vec<Arc<Comment>>> = HashMap::new();
        for record in dataset.comments {
            let owner = format!("comment '{}'", record.id);
            let author = record
                .author
                .map(|id| find(&people, "person", &id, &owner))
                .transpose()?;
            let comment = Arc::new(Comment {
                id: record.id.clone(),
                body: record.body,
                author,
            });
            if let Some(author) = &comment.author {
                written
                    .entry(author.id.clone())
                    .or_default()
                    .push(comment.clone());
            }
            if comments.insert(record.id.clone(), comment).is_some() {
                bail!("duplicate comment '{}'", record.id);
            }
        }
        for (id, person) in &people {
            let _ = person.comments.set(written.remove(id).unwrap_or_default());
        }

        let mut posts = HashMap::new();
        for record in dataset.posts {
            let owner = format!("post '{}'", record.id);
            let post = Post {
                id: record.id.clone(),
                title: record.title,
                body: record.body,
                author: record
                    .author
                    .map(|id| find(&people, "person", &id, &owner))
                    .transpose()?,
                comments: record
                    .comments
                    .iter()
                    .map(|id| find(&comments, "comment", id, &owner))
                    .collect::<Result<_>>()?,
            };
            if posts.insert(record.id.clone(), Arc::new(post)).is_some() {
                bail!("duplicate post '{}'", record.id);
            }
        }

        let mut sites = HashMap::new();
        for record in dataset.sites {
            let owner = format!("site '{}'", record.id);
            let site = Site {
                id: record.id.clone(),
                name: record.name,
                posts: record
                    .posts
                    .iter()
                    .map(|id| find(&posts, "post", id, &owner))
                    .collect::<Result<_>>()?,
            };
            if sites.insert(record.id.clone(), Arc::new(site)).is_some() {
                bail!("duplicate site '{}'", record.id);
            }
        }

        Ok(Self {
            sites,
            posts,
            people,
            comments,
        })
    }

    /// The object behind a `TYPE:ID` reference.
    pub fn lookup(&self, reference: &str) -> Result<ResourceRef<'_>> {
        let (resource_type, id) = reference
            .split_once(':')
            .ok_or_else(|| anyhow!("expected TYPE:ID, got '{}'", reference))?;
        let missing = || anyhow!("no {} with id '{}'", resource_type, id);
        Ok(match resource_type {
            "sites" => ResourceRef::object(&**self.sites.get(id).ok_or_else(missing)?),
            "posts" => ResourceRef::object(&**self.posts.get(id).ok_or_else(missing)?),
            "people" => ResourceRef::object(&**self.people.get(id).ok_or_else(missing)?),
            "comments" => ResourceRef::object(&**self.comments.get(id).ok_or_else(missing)?),
            other => bail!(
                "unknown resource type '{}' (expected sites, posts, people or comments)",
                other
            ),
        })
    }
}

// ============================================================================
// Schemas
// ============================================================================

pub fn registry() -> Registry {
    Registry::builder()
        .register(SiteSchema)
        .register(PostSchema)
        .register(PersonSchema)
        .register(CommentSchema)
        .build()
}

struct SiteSchema;

impl Schema for SiteSchema {
    type Resource = Site;

    fn resource_type(&self) -> &str {
        "sites"
    }

    fn id(&self, site: &Site) -> String {
        site.id.clone()
    }

    fn attributes(&self, site: &Site) -> DescriptorResult<Attributes> {
        let mut attributes = Attributes::new();
        attributes.insert("name".into(), json!(site.name));
        Ok(attributes)
    }

    fn relationships<'a>(
        &self,
        site: &'a Site,
        _requested: &IncludePaths,
    ) -> DescriptorResult<Relationships<'a>> {
        let posts = Relationship::many(site.posts.iter().map(|post| &**post))
            .with_related_link()
            .with_meta(json!({ "count": site.posts.len() }));
        Ok(vec![("posts".into(), posts)])
    }
}

struct PostSchema;

impl Schema for PostSchema {
    type Resource = Post;

    fn resource_type(&self) -> &str {
        "posts"
    }

    fn id(&self, post: &Post) -> String {
        post.id.clone()
    }

    fn attributes(&self, post: &Post) -> DescriptorResult<Attributes> {
        let mut attributes = Attributes::new();
        attributes.insert("title".into(), json!(post.title));
        attributes.insert("body".into(), json!(post.body));
        Ok(attributes)
    }

    fn relationships<'a>(
        &self,
        post: &'a Post,
        _requested: &IncludePaths,
    ) -> DescriptorResult<Relationships<'a>> {
        Ok(vec![
            (
                "author".into(),
                Relationship::related(Related::optional(post.author.as_deref())),
            ),
            (
                "comments".into(),
                Relationship::many(post.comments.iter().map(|comment| &**comment))
                    .with_self_link()
                    .with_related_link(),
            ),
        ])
    }
}

struct PersonSchema;

impl Schema for PersonSchema {
    type Resource = Person;

    fn resource_type(&self) -> &str {
        "people"
    }

    fn id(&self, person: &Person) -> String {
        person.id.clone()
    }

    fn attributes(&self, person: &Person) -> DescriptorResult<Attributes> {
        let mut attributes = Attributes::new();
        attributes.insert("first_name".into(), json!(person.first_name));
        attributes.insert("last_name".into(), json!(person.last_name));
        Ok(attributes)
    }

    fn relationships<'a>(
        &self,
        person: &'a Person,
        _requested: &IncludePaths,
    ) -> DescriptorResult<Relationships<'a>> {
        let comments = Relationship::deferred(move || {
            let comments = person
                .comments
                .get()
                .ok_or("comments of person were never linked")?;
            Ok(Related::many(comments.iter().map(|comment| &**comment)))
        });
        Ok(vec![("comments".into(), comments)])
    }

    fn resource_links(&self, person: &Person) -> Vec<(String, LinkSpec)> {
        vec![(
            "profile".into(),
            LinkSpec::new(format!("/people/{}/profile", person.id)),
        )]
    }
}

struct CommentSchema;

impl Schema for CommentSchema {
    type Resource = Comment;

    fn resource_type(&self) -> &str {
        "comments"
    }

    fn id(&self, comment: &Comment) -> String {
        comment.id.clone()
    }

    fn attributes(&self, comment: &Comment) -> DescriptorResult<Attributes> {
        let mut attributes = Attributes::new();
        attributes.insert("body".into(), json!(comment.body));
        Ok(attributes)
    }

    fn relationships<'a>(
        &self,
        comment: &'a Comment,
        _requested: &IncludePaths,
    ) -> DescriptorResult<Relationships<'a>> {
        Ok(vec![(
            "author".into(),
            Relationship::related(Related::optional(comment.author.as_deref())),
        )])
    }

    fn show_self_in_included(&self) -> bool {
        true
    }
}
