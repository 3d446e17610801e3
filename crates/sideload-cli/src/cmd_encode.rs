use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use sideload::v1::{Encoder, EncoderOptions, Root, parse_request};

use crate::blog::{self, Blog};
use crate::request::{self, RequestArgs};

pub struct EncodeArgs {
    pub dataset: Option<PathBuf>,
    pub roots: Vec<String>,
    pub collection: bool,
    pub identifiers: bool,
    pub url_prefix: Option<String>,
    pub jsonapi_version: Option<String>,
}

pub fn run(args: EncodeArgs, request: RequestArgs, pretty: bool) -> Result<()> {
    let json = render(args, &request, pretty)?;
    println!("{}", json);
    Ok(())
}

fn render(args: EncodeArgs, request: &RequestArgs, pretty: bool) -> Result<String> {
    let blog = match &args.dataset {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {:?}", path))?;
            Blog::from_json(&json).with_context(|| format!("Failed to load {:?}", path))?
        }
        None => Blog::sample()?,
    };

    let params = match parse_request(&request.to_request(), &request.negotiator()) {
        Ok(params) => params,
        Err(err) => return request::reject(&err, pretty),
    };

    let mut references = args
        .roots
        .iter()
        .map(|root| blog.lookup(root))
        .collect::<Result<Vec<_>>>()?;
    debug!(
        roots = references.len(),
        identifiers = args.identifiers,
        "Resolved roots"
    );
    let root = if references.len() == 1 && !args.collection {
        Root::One(references.remove(0))
    } else {
        Root::Many(references)
    };

    let mut options = EncoderOptions::default().with_pretty(pretty);
    if let Some(prefix) = args.url_prefix {
        options = options.with_url_prefix(prefix);
    }
    if let Some(version) = args.jsonapi_version {
        options = options.with_jsonapi_version(version);
    }
    let encoder = Encoder::new(Arc::new(blog::registry())).with_options(options);

    let document = if args.identifiers {
        encoder.encode_identifiers(root)
    } else {
        encoder.encode(root, &params)
    }
    .context("Failed to encode document")?;

    Ok(encoder.to_json(&document)?)
}
