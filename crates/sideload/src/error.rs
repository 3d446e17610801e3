use thiserror::Error;

/// Error type returned by descriptor callbacks and deferred relationship data.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result of a descriptor callback.
pub type DescriptorResult<T> = std::result::Result<T, BoxError>;

/// Fatal failures while building a document.
///
/// These point at a setup defect or broken domain data, never at the client
/// request, so callers should not retry them.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("no resource descriptor registered for {type_name}")]
    UnregisteredType { type_name: &'static str },

    #[error("descriptor for '{resource_type}' failed: {source}")]
    Descriptor {
        resource_type: String,
        #[source]
        source: BoxError,
    },

    #[error("descriptor for '{resource_type}' expects {expected}")]
    DescriptorMismatch {
        resource_type: String,
        expected: &'static str,
    },
}

/// Client-recoverable request errors: a malformed query or an unacceptable
/// media type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("invalid query parameter '{parameter}': {reason}")]
    InvalidQuery { parameter: String, reason: String },

    #[error("unsupported Content-Type: {0}")]
    UnsupportedMediaType(MediaTypeError),

    #[error("not acceptable: {0}")]
    NotAcceptable(MediaTypeError),
}

impl RequestError {
    pub(crate) fn invalid_query(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidQuery {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// HTTP status code this error maps to.
    pub fn status(&self) -> u16 {
        match self {
            Self::InvalidQuery { .. } => 400,
            Self::UnsupportedMediaType(_) => 415,
            Self::NotAcceptable(_) => 406,
        }
    }

    /// The query parameter at fault, if any.
    pub fn parameter(&self) -> Option<&str> {
        match self {
            Self::InvalidQuery { parameter, .. } => Some(parameter),
            _ => None,
        }
    }
}

/// Reasons a media type header is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaTypeError {
    #[error("malformed media type '{header}': {reason}")]
    Malformed { header: String, reason: String },

    #[error("expected application/vnd.api+json, found {found}")]
    WrongBaseType { found: String },

    #[error("unsupported extension '{0}'")]
    UnsupportedExtension(String),

    #[error("unsupported media type parameter '{0}'")]
    UnsupportedParameter(String),
}

impl MediaTypeError {
    pub(crate) fn malformed(header: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            header: header.to_string(),
            reason: reason.into(),
        }
    }
}
