//! Media type parsing and JSON:API content negotiation.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::MediaTypeError;

/// `application/vnd.api+json`
pub const JSON_API_MEDIA_TYPE: &str = "application/vnd.api+json";

const JSON_API_TYPE: &str = "application";
const JSON_API_SUBTYPE: &str = "vnd.api+json";
const PARAM_EXT: &str = "ext";
const PARAM_QUALITY: &str = "q";

/// A parsed media type: `type/subtype; name=value; ...`.
///
/// Type, subtype and parameter names are lowercased; parameter values keep
/// their case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    pub kind: String,
    pub subtype: String,
    pub parameters: BTreeMap<String, String>,
}

impl MediaType {
    pub fn new(kind: impl Into<String>, subtype: impl Into<String>) -> Self {
        Self {
            kind: kind.into().to_ascii_lowercase(),
            subtype: subtype.into().to_ascii_lowercase(),
            parameters: BTreeMap::new(),
        }
    }

    /// `application/vnd.api+json` without parameters.
    pub fn json_api() -> Self {
        Self::new(JSON_API_TYPE, JSON_API_SUBTYPE)
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Parse a single media type.
    ///
    /// ```
    /// use sideload::v1::MediaType;
    ///
    /// let media = MediaType::parse("Application/VND.API+JSON; ext=\"bulk,jsonpatch\"").unwrap();
    /// assert!(media.is_json_api());
    /// assert_eq!(media.parameter("ext"), Some("bulk,jsonpatch"));
    /// assert!(MediaType::parse("application").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self, MediaTypeError> {
        let mut pieces = split_unquoted(input, ';').into_iter();
        let essence = pieces.next().unwrap_or_default().trim();
        let (kind, subtype) = essence
            .split_once('/')
            .ok_or_else(|| MediaTypeError::malformed(input, "expected type/subtype"))?;
        if !is_token(kind) || !is_token(subtype) {
            return Err(MediaTypeError::malformed(input, "invalid type or subtype"));
        }

        let mut media = MediaType::new(kind, subtype);
        for piece in pieces {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            let (name, value) = piece
                .split_once('=')
                .ok_or_else(|| MediaTypeError::malformed(input, "parameter without value"))?;
            let name = name.trim();
            if !is_token(name) {
                return Err(MediaTypeError::malformed(input, "invalid parameter name"));
            }
            let value = parse_parameter_value(value.trim())
                .ok_or_else(|| MediaTypeError::malformed(input, "invalid parameter value"))?;
            media.parameters.insert(name.to_ascii_lowercase(), value);
        }
        Ok(media)
    }

    /// `type/subtype` without parameters.
    pub fn essence(&self) -> String {
        format!("{}/{}", self.kind, self.subtype)
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_json_api(&self) -> bool {
        self.kind == JSON_API_TYPE && self.subtype == JSON_API_SUBTYPE
    }

    /// `*/*` or `application/*`: a range that admits JSON:API.
    pub fn admits_json_api(&self) -> bool {
        (self.kind == "*" && self.subtype == "*")
            || (self.kind == JSON_API_TYPE && self.subtype == "*")
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.subtype)?;
        for (name, value) in &self.parameters {
            if is_token(value) {
                write!(f, ";{}={}", name, value)?;
            } else {
                let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, ";{}=\"{}\"", name, escaped)?;
            }
        }
        Ok(())
    }
}

impl FromStr for MediaType {
    type Err = MediaTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MediaType::parse(s)
    }
}

impl Serialize for MediaType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// RFC 7230 `token`.
fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}

/// Token or quoted string, unquoted and unescaped.
fn parse_parameter_value(raw: &str) -> Option<String> {
    let Some(quoted) = raw.strip_prefix('"') else {
        return is_token(raw).then(|| raw.to_string());
    };
    let inner = quoted.strip_suffix('"')?;
    let mut value = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => value.push(chars.next()?),
            '"' => return None,
            c => value.push(c),
        }
    }
    Some(value)
}

/// Split on `separator` outside double quotes.
fn split_unquoted(input: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            c if c == separator && !quoted => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

// ============================================================================
// Accept
// ============================================================================

/// One media range of an `Accept` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptRange {
    pub media_type: MediaType,
    /// Weight in thousandths (`q=0.5` → 500).
    pub quality: u16,
    pub position: usize,
}

/// A parsed `Accept` header, ordered by weight, then by position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcceptHeader {
    ranges: Vec<AcceptRange>,
}

impl AcceptHeader {
    /// ```
    /// use sideload::v1::AcceptHeader;
    ///
    /// let accept = AcceptHeader::parse("text/html;q=0.5, application/vnd.api+json").unwrap();
    /// let first = &accept.ranges()[0];
    /// assert!(first.media_type.is_json_api());
    /// assert_eq!(first.quality, 1000);
    /// ```
    pub fn parse(input: &str) -> Result<Self, MediaTypeError> {
        let mut ranges = Vec::new();
        for (position, item) in split_unquoted(input, ',').into_iter().enumerate() {
            if item.trim().is_empty() {
                continue;
            }
            let mut media_type = MediaType::parse(item)?;
            let quality = match media_type.parameters.remove(PARAM_QUALITY) {
                Some(q) => parse_quality(&q)
                    .ok_or_else(|| MediaTypeError::malformed(input, "invalid q weight"))?,
                None => 1000,
            };
            ranges.push(AcceptRange {
                media_type,
                quality,
                position,
            });
        }
        ranges.sort_by(|a, b| b.quality.cmp(&a.quality));
        Ok(Self { ranges })
    }

    pub fn ranges(&self) -> &[AcceptRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// `qvalue = ( "0" [ "." 0*3DIGIT ] ) / ( "1" [ "." 0*3("0") ] )`
fn parse_quality(raw: &str) -> Option<u16> {
    let (whole, fraction) = raw.split_once('.').unwrap_or((raw, ""));
    if fraction.len() > 3 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let thousandths = format!("{:0<3}", fraction).parse::<u16>().ok()?;
    match whole {
        "0" => Some(thousandths),
        "1" if thousandths == 0 => Some(1000),
        _ => None,
    }
}

// ============================================================================
// Negotiation
// ============================================================================

/// Outcome of a successful negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Negotiated {
    pub media_type: MediaType,
    pub extensions: BTreeSet<String>,
}

impl Default for Negotiated {
    fn default() -> Self {
        Self {
            media_type: MediaType::json_api(),
            extensions: BTreeSet::new(),
        }
    }
}

/// Checks `Content-Type` and `Accept` against `application/vnd.api+json`
/// and a set of supported extensions.
///
/// The only media type parameter allowed is `ext`, a comma-separated list
/// of extension names, each of which must be registered.
///
/// ```
/// use sideload::v1::Negotiator;
///
/// let negotiator = Negotiator::new().with_extension("bulk");
///
/// let ok = negotiator.content_type(Some("application/vnd.api+json; ext=bulk")).unwrap();
/// assert!(ok.extensions.contains("bulk"));
/// assert!(negotiator.content_type(Some("application/vnd.api+json; ext=patch")).is_err());
/// assert!(negotiator.accept(Some("text/html, */*;q=0.1")).is_ok());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Negotiator {
    extensions: BTreeSet<String>,
}

impl Negotiator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extensions.insert(extension.into());
        self
    }

    pub fn supports(&self, extension: &str) -> bool {
        self.extensions.contains(extension)
    }

    /// Validate a request `Content-Type`. A missing header means no body
    /// and is accepted.
    pub fn content_type(&self, header: Option<&str>) -> Result<Negotiated, MediaTypeError> {
        let Some(header) = header.filter(|h| !h.trim().is_empty()) else {
            return Ok(Negotiated::default());
        };
        let media_type = MediaType::parse(header)?;
        if !media_type.is_json_api() {
            return Err(MediaTypeError::WrongBaseType {
                found: media_type.essence(),
            });
        }
        let extensions = self.check_parameters(&media_type)?;
        Ok(Negotiated {
            media_type,
            extensions,
        })
    }

    /// Pick the best acceptable range of an `Accept` header. A missing
    /// header accepts anything.
    pub fn accept(&self, header: Option<&str>) -> Result<Negotiated, MediaTypeError> {
        let Some(header) = header.filter(|h| !h.trim().is_empty()) else {
            return Ok(Negotiated::default());
        };
        let accept = AcceptHeader::parse(header)?;

        let mut rejection = None;
        for range in accept.ranges().iter().filter(|r| r.quality > 0) {
            let media_type = &range.media_type;
            if media_type.admits_json_api() {
                return Ok(Negotiated::default());
            }
            if !media_type.is_json_api() {
                rejection.get_or_insert(MediaTypeError::WrongBaseType {
                    found: media_type.essence(),
                });
                continue;
            }
            match self.check_parameters(media_type) {
                Ok(extensions) => {
                    return Ok(Negotiated {
                        media_type: media_type.clone(),
                        extensions,
                    });
                }
                Err(e) => rejection = Some(e),
            }
        }
        Err(rejection.unwrap_or_else(|| MediaTypeError::WrongBaseType {
            found: header.trim().to_string(),
        }))
    }

    fn check_parameters(&self, media_type: &MediaType) -> Result<BTreeSet<String>, MediaTypeError> {
        let mut extensions = BTreeSet::new();
        for (name, value) in &media_type.parameters {
            if name != PARAM_EXT {
                return Err(MediaTypeError::UnsupportedParameter(name.clone()));
            }
            for extension in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
                if !self.supports(extension) {
                    return Err(MediaTypeError::UnsupportedExtension(extension.to_string()));
                }
                extensions.insert(extension.to_string());
            }
        }
        Ok(extensions)
    }
}
