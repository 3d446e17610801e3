#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use serde_json::json;
use sideload::v1::*;

pub struct Site {
    pub id: String,
    pub name: String,
    pub posts: Vec<Arc<Post>>,
}

pub struct Post {
    pub id: String,
    pub title: String,
    pub body: String,
    pub author: Arc<Author>,
    pub comments: Vec<Arc<Comment>>,
}

/// Authors point back at their comments, closing a cycle.
pub struct Author {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub comments: OnceLock<Vec<Arc<Comment>>>,
    pub comment_loads: AtomicUsize,
}

pub struct Comment {
    pub id: String,
    pub body: String,
    pub author: Arc<Author>,
}

pub struct Blog {
    pub site: Site,
    pub author: Arc<Author>,
}

impl Blog {
    pub fn post(&self) -> &Post {
        &self.site.posts[0]
    }

    pub fn comment(&self, index: usize) -> &Comment {
        &self.post().comments[index]
    }

    pub fn comment_loads(&self) -> usize {
        self.author.comment_loads.load(Ordering::SeqCst)
    }
}

/// Site 1 with post 321 by author 123, commented twice by the same author.
pub fn blog() -> Blog {
    let author = Arc::new(Author {
        id: "123".into(),
        first_name: "John".into(),
        last_name: "Dow".into(),
        comments: OnceLock::new(),
        comment_loads: AtomicUsize::new(0),
    });
    let comments = vec![
        Arc::new(Comment {
            id: "456".into(),
            body: "Included objects work as easy as basic ones".into(),
            author: author.clone(),
        }),
        Arc::new(Comment {
            id: "789".into(),
            body: "Let's try!".into(),
            author: author.clone(),
        }),
    ];
    let _ = author.comments.set(comments.clone());
    let post = Arc::new(Post {
        id: "321".into(),
        title: "Included objects".into(),
        body: "Yes, it is supported".into(),
        author: author.clone(),
        comments,
    });
    Blog {
        site: Site {
            id: "1".into(),
            name: "JSON API Samples".into(),
            posts: vec![post],
        },
        author,
    }
}

// ============================================================================
// Schemas
// ============================================================================

/// Reports `posts` only when asked for it.
pub struct SiteSchema;

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
        requested: &IncludePaths,
    ) -> DescriptorResult<Relationships<'a>> {
        let mut relationships = Relationships::new();
        if requested.contains("posts") {
            relationships.push((
                "posts".into(),
                Relationship::many(site.posts.iter().map(|post| &**post)),
            ));
        }
        Ok(relationships)
    }
}

/// Reports only the relationships asked for.
pub struct PostSchema;

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
        requested: &IncludePaths,
    ) -> DescriptorResult<Relationships<'a>> {
        let mut relationships = Relationships::new();
        if requested.contains("author") {
            relationships.push(("author".into(), Relationship::one(&*post.author)));
        }
        if requested.contains("comments") {
            relationships.push((
                "comments".into(),
                Relationship::many(post.comments.iter().map(|comment| &**comment)),
            ));
        }
        Ok(relationships)
    }
}

/// Always reports `comments`, produced lazily.
pub struct AuthorSchema;

impl Schema for AuthorSchema {
    type Resource = Author;

    fn resource_type(&self) -> &str {
        "people"
    }

    fn id(&self, author: &Author) -> String {
        author.id.clone()
    }

    fn attributes(&self, author: &Author) -> DescriptorResult<Attributes> {
        let mut attributes = Attributes::new();
        attributes.insert("first_name".into(), json!(author.first_name));
        attributes.insert("last_name".into(), json!(author.last_name));
        Ok(attributes)
    }

    fn relationships<'a>(
        &self,
        author: &'a Author,
        _requested: &IncludePaths,
    ) -> DescriptorResult<Relationships<'a>> {
        let comments = Relationship::deferred(move || {
            author.comment_loads.fetch_add(1, Ordering::SeqCst);
            Ok(match author.comments.get() {
                Some(comments) => Related::many(comments.iter().map(|comment| &**comment)),
                None => Related::Null,
            })
        });
        Ok(vec![("comments".into(), comments)])
    }
}

/// Always reports `author`.
pub struct CommentSchema;

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
            Relationship::one(&*comment.author),
        )])
    }
}

pub fn registry() -> Arc<Registry> {
    Arc::new(
        Registry::builder()
            .register(AuthorSchema)
            .register(CommentSchema)
            .register(PostSchema)
            .register(SiteSchema)
            .build(),
    )
}

pub fn encoder() -> Encoder {
    Encoder::new(registry())
}

/// A request carrying the JSON:API media type on both headers.
pub fn request(query: &str) -> StaticRequest {
    StaticRequest::new(RawQuery::parse(query))
        .with_header("Content-Type", JSON_API_MEDIA_TYPE)
        .with_header("Accept", JSON_API_MEDIA_TYPE)
}

pub fn params(query: &str) -> EncodingParameters {
    parse_request(&request(query), &Negotiator::new()).unwrap()
}

/// `type:id` of each resource, in order.
pub fn keys<'a>(resources: impl IntoIterator<Item = &'a ResourceObject>) -> Vec<String> {
    resources.into_iter().map(|r| r.key().to_string()).collect()
}
