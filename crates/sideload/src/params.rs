//! Query parameter parsing.
//!
//! [`RawQuery`] is the request's query string decoded into nested maps,
//! PHP style: `fields[posts]=title` becomes `fields → {posts → "title"}`.
//! [`parse_query`] turns it into [`EncodingParameters`], the immutable
//! configuration of one encode.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::RequestError;
use crate::media::Negotiator;

const PARAM_INCLUDE: &str = "include";
const PARAM_FIELDS: &str = "fields";
const PARAM_SORT: &str = "sort";
const PARAM_PAGE: &str = "page";
const PARAM_FILTER: &str = "filter";

// ============================================================================
// Raw query
// ============================================================================

/// One decoded query value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Value(String),
    List(Vec<String>),
    Map(BTreeMap<String, QueryValue>),
}

/// Query parameters keyed by their base name.
///
/// A key given both as a plain value and with brackets (`fields=title&fields[posts]=body`)
/// keeps the shape it was first given and is recorded as conflicting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawQuery {
    values: BTreeMap<String, QueryValue>,
    #[serde(skip)]
    conflicts: BTreeSet<String>,
}

impl RawQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a URL query string (without the leading `?`).
    ///
    /// Bracketed keys nest: `page[number]=2` → `page → {number → "2"}`,
    /// `ids[]=1&ids[]=2` → `ids → ["1", "2"]`. A plain key given more than
    /// once collects its values into a list.
    ///
    /// ```
    /// use sideload::v1::{QueryValue, RawQuery};
    ///
    /// let query = RawQuery::parse("include=posts.author&fields%5Bposts%5D=title,body");
    /// assert_eq!(query.get("include"), Some(&QueryValue::Value("posts.author".into())));
    /// match query.get("fields") {
    ///     Some(QueryValue::Map(types)) => {
    ///         assert_eq!(types["posts"], QueryValue::Value("title,body".into()));
    ///     }
    ///     other => panic!("unexpected {:?}", other),
    /// }
    /// ```
    pub fn parse(query: &str) -> Self {
        let mut raw = Self::new();
        let query = query.strip_prefix('?').unwrap_or(query);
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let (base, path) = split_key(&key);
            if base.is_empty() {
                continue;
            }
            if !insert_nested(&mut raw.values, base, &path, value.into_owned()) {
                raw.conflicts.insert(base.to_string());
            }
        }
        raw
    }

    pub fn insert(&mut self, key: impl Into<String>, value: QueryValue) {
        let key = key.into();
        self.conflicts.remove(&key);
        self.values.insert(key, value);
    }

    pub fn with(mut self, key: impl Into<String>, value: QueryValue) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.values.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &QueryValue)> {
        self.values.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether `key` was given as a plain value and as a bracketed map.
    pub fn is_conflicting(&self, key: &str) -> bool {
        self.conflicts.contains(key)
    }
}

impl<K: Into<String>> FromIterator<(K, QueryValue)> for RawQuery {
    fn from_iter<I: IntoIterator<Item = (K, QueryValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            conflicts: BTreeSet::new(),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Value(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Value(value)
    }
}

/// `fields[posts][]` → (`fields`, [`posts`, ``]). Keys with an unbalanced
/// bracket are taken literally.
fn split_key(key: &str) -> (&str, Vec<&str>) {
    let Some(open) = key.find('[') else {
        return (key, Vec::new());
    };
    let base = &key[..open];
    let mut rest = &key[open..];
    let mut path = Vec::new();
    while let Some(inner) = rest.strip_prefix('[') {
        let Some(close) = inner.find(']') else {
            return (key, Vec::new());
        };
        path.push(&inner[..close]);
        rest = &inner[close + 1..];
    }
    if !rest.is_empty() {
        return (key, Vec::new());
    }
    (base, path)
}

/// Returns `false`, leaving `map` as it was, when `key` already holds a value
/// of the other shape: a map where a plain value arrives or the reverse.
fn insert_nested(
    map: &mut BTreeMap<String, QueryValue>,
    key: &str,
    path: &[&str],
    value: String,
) -> bool {
    match path.split_first() {
        None | Some((&"", _)) => {
            let list = path.first() == Some(&"");
            let merged = match map.remove(key) {
                Some(QueryValue::Value(previous)) => QueryValue::List(vec![previous, value]),
                Some(QueryValue::List(mut values)) => {
                    values.push(value);
                    QueryValue::List(values)
                }
                Some(existing @ QueryValue::Map(_)) => {
                    map.insert(key.to_string(), existing);
                    return false;
                }
                None if list => QueryValue::List(vec![value]),
                None => QueryValue::Value(value),
            };
            map.insert(key.to_string(), merged);
            true
        }
        Some((next, rest)) => {
            let entry = map
                .entry(key.to_string())
                .or_insert_with(|| QueryValue::Map(BTreeMap::new()));
            match entry {
                QueryValue::Map(inner) => insert_nested(inner, next, rest, value),
                QueryValue::Value(_) | QueryValue::List(_) => false,
            }
        }
    }
}

// ============================================================================
// Include paths
// ============================================================================

/// A set of dot-separated relationship paths, e.g. `posts.author`.
///
/// Paths are interpreted relative to the resource being encoded: at the root
/// they are the client's `include` values, and [`IncludePaths::nested`]
/// yields the paths below one relationship.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IncludePaths(BTreeSet<String>);

impl IncludePaths {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            paths
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        )
    }

    /// Whether any path starts with the relationship `name`.
    ///
    /// ```
    /// use sideload::v1::IncludePaths;
    ///
    /// let paths = IncludePaths::new(["posts.author", "tags"]);
    /// assert!(paths.contains("posts"));
    /// assert!(paths.contains("tags"));
    /// assert!(!paths.contains("post"));
    /// assert!(!paths.contains("author"));
    /// ```
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|p| first_segment(p) == name)
    }

    /// The paths below relationship `name`, with `name.` stripped.
    ///
    /// ```
    /// use sideload::v1::IncludePaths;
    ///
    /// let paths = IncludePaths::new(["posts.author.comments", "posts.tags", "site"]);
    /// let below = paths.nested("posts");
    /// assert_eq!(below, IncludePaths::new(["author.comments", "tags"]));
    /// ```
    pub fn nested(&self, name: &str) -> IncludePaths {
        IncludePaths(
            self.0
                .iter()
                .filter_map(|p| p.strip_prefix(name)?.strip_prefix('.'))
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn insert(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !path.is_empty() {
            self.0.insert(path);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn first_segment(path: &str) -> &str {
    path.split('.').next().unwrap_or(path)
}

// ============================================================================
// Encoding parameters
// ============================================================================

/// A `sort` entry: `-created` sorts descending on `created`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortParameter {
    pub field: String,
    pub ascending: bool,
}

/// Everything the client asked for that shapes the encoded document.
///
/// `include_paths: None` means the client sent no `include`, so each primary
/// resource's default include paths apply. `field_sets: None` means no
/// sparse fieldsets at all, while an empty set for a type keeps no attributes
/// of that type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_paths: Option<IncludePaths>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_sets: Option<BTreeMap<String, BTreeSet<String>>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortParameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<QueryValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<QueryValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub unrecognized: BTreeMap<String, QueryValue>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub extensions: BTreeSet<String>,
}

impl EncodingParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the include paths.
    pub fn with_include<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_paths = Some(IncludePaths::new(paths));
        self
    }

    /// Restrict attributes of `resource_type` to `fields`.
    pub fn with_fields<I, S>(mut self, resource_type: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.field_sets
            .get_or_insert_with(BTreeMap::new)
            .insert(
                resource_type.into(),
                fields.into_iter().map(Into::into).collect(),
            );
        self
    }

    /// The sparse fieldset for `resource_type`, if one was requested.
    pub fn fields_for(&self, resource_type: &str) -> Option<&BTreeSet<String>> {
        self.field_sets.as_ref()?.get(resource_type)
    }
}

/// Read-only view of the incoming request.
pub trait CurrentRequest {
    /// Header value by case-insensitive name.
    fn header(&self, name: &str) -> Option<&str>;

    fn query_parameters(&self) -> RawQuery;
}

/// An in-memory [`CurrentRequest`].
#[derive(Debug, Clone, Default)]
pub struct StaticRequest {
    headers: Vec<(String, String)>,
    query: RawQuery,
}

impl StaticRequest {
    pub fn new(query: RawQuery) -> Self {
        Self {
            headers: Vec::new(),
            query,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

impl CurrentRequest for StaticRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn query_parameters(&self) -> RawQuery {
        self.query.clone()
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Build [`EncodingParameters`] from a decoded query.
///
/// Unknown keys end up in `unrecognized`. Unknown type names in `fields` and
/// unknown relationships in `include` are kept as given; they simply never
/// match anything during encoding.
///
/// ```
/// use sideload::v1::{RawQuery, parse_query};
///
/// let query = RawQuery::parse("include=posts&fields[posts]=title&sort=-created,title");
/// let params = parse_query(&query).unwrap();
/// assert!(params.include_paths.as_ref().unwrap().contains("posts"));
/// assert!(params.fields_for("posts").unwrap().contains("title"));
/// assert!(!params.sort[0].ascending);
/// ```
pub fn parse_query(query: &RawQuery) -> Result<EncodingParameters, RequestError> {
    let mut params = EncodingParameters::new();
    for (key, value) in query.iter() {
        let known = [PARAM_INCLUDE, PARAM_FIELDS, PARAM_SORT, PARAM_PAGE, PARAM_FILTER];
        if query.is_conflicting(key) && known.contains(&key.as_str()) {
            return Err(RequestError::invalid_query(
                key.as_str(),
                "given both as a value and with bracketed keys",
            ));
        }
        match key.as_str() {
            PARAM_INCLUDE => {
                params.include_paths = Some(IncludePaths::new(split_list(PARAM_INCLUDE, value)?));
            }
            PARAM_FIELDS => params.field_sets = Some(parse_fields(value)?),
            PARAM_SORT => params.sort = parse_sort(value)?,
            PARAM_PAGE => params.page = Some(value.clone()),
            PARAM_FILTER => params.filter = Some(value.clone()),
            _ => {
                params.unrecognized.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(params)
}

/// Negotiate `Content-Type` and `Accept`, then parse the query.
///
/// The extensions accepted by either header are recorded on the result.
pub fn parse_request(
    request: &impl CurrentRequest,
    negotiator: &Negotiator,
) -> Result<EncodingParameters, RequestError> {
    let content = negotiator
        .content_type(request.header("Content-Type"))
        .map_err(RequestError::UnsupportedMediaType)?;
    let accept = negotiator
        .accept(request.header("Accept"))
        .map_err(RequestError::NotAcceptable)?;

    let mut params = parse_query(&request.query_parameters())?;
    params.extensions = content.extensions;
    params.extensions.extend(accept.extensions);
    Ok(params)
}

/// Comma-separated items of a scalar or list value, trimmed, empties dropped.
fn split_list(parameter: &str, value: &QueryValue) -> Result<Vec<String>, RequestError> {
    let items = |s: &str| -> Vec<String> {
        s.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    };
    match value {
        QueryValue::Value(s) => Ok(items(s)),
        QueryValue::List(values) => Ok(values.iter().flat_map(|s| items(s)).collect()),
        QueryValue::Map(_) => Err(RequestError::invalid_query(
            parameter,
            "expected a comma-separated list",
        )),
    }
}

fn parse_fields(value: &QueryValue) -> Result<BTreeMap<String, BTreeSet<String>>, RequestError> {
    let QueryValue::Map(types) = value else {
        return Err(RequestError::invalid_query(
            PARAM_FIELDS,
            "expected fields[TYPE]=field,...",
        ));
    };
    types
        .iter()
        .map(|(resource_type, names)| {
            let parameter = format!("{}[{}]", PARAM_FIELDS, resource_type);
            let names = split_list(&parameter, names)?;
            Ok((resource_type.clone(), names.into_iter().collect()))
        })
        .collect()
}

fn parse_sort(value: &QueryValue) -> Result<Vec<SortParameter>, RequestError> {
    let raw: Vec<&str> = match value {
        QueryValue::Value(s) if s.trim().is_empty() => return Ok(Vec::new()),
        QueryValue::Value(s) => s.split(',').collect(),
        QueryValue::List(values) => values.iter().flat_map(|s| s.split(',')).collect(),
        QueryValue::Map(_) => {
            return Err(RequestError::invalid_query(
                PARAM_SORT,
                "expected a comma-separated list",
            ));
        }
    };
    raw.into_iter()
        .map(|item| {
            let item = item.trim();
            let (field, ascending) = match item.strip_prefix('-') {
                Some(field) => (field, false),
                None => (item.strip_prefix('+').unwrap_or(item), true),
            };
            if field.is_empty() {
                return Err(RequestError::invalid_query(PARAM_SORT, "empty sort field"));
            }
            Ok(SortParameter {
                field: field.to_string(),
                ascending,
            })
        })
        .collect()
}
