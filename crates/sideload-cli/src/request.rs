use anyhow::{Result, bail};
use clap::Args;
use serde::Serialize;
use sideload::v1::{
    ErrorDocument, Negotiator, RawQuery, RequestError, StaticRequest,
};

/// The parts of an HTTP request the codec looks at.
#[derive(Args, Debug, Clone, Default)]
pub struct RequestArgs {
    /// Query string, e.g. "include=posts&fields[posts]=title"
    #[arg(short, long, default_value = "")]
    pub query: String,

    /// Accept header
    #[arg(long)]
    pub accept: Option<String>,

    /// Content-Type header
    #[arg(long)]
    pub content_type: Option<String>,

    /// Supported media type extension (repeatable)
    #[arg(long = "ext")]
    pub extensions: Vec<String>,
}

impl RequestArgs {
    pub fn negotiator(&self) -> Negotiator {
        self.extensions
            .iter()
            .fold(Negotiator::new(), |negotiator, ext| negotiator.with_extension(ext))
    }

    pub fn to_request(&self) -> StaticRequest {
        let query = self.query.trim_start_matches('?');
        let mut request = StaticRequest::new(RawQuery::parse(query));
        if let Some(accept) = &self.accept {
            request = request.with_header("Accept", accept);
        }
        if let Some(content_type) = &self.content_type {
            request = request.with_header("Content-Type", content_type);
        }
        request
    }
}

pub fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", json);
    Ok(())
}

/// Print the error document for `err` and fail with its status.
pub fn reject<T>(err: &RequestError, pretty: bool) -> Result<T> {
    print_json(&ErrorDocument::from(err), pretty)?;
    bail!("request rejected ({}): {}", err.status(), err)
}
