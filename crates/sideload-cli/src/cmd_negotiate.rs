use anyhow::Result;
use serde::Serialize;

use sideload::v1::{Negotiated, RequestError};

use crate::request::{self, RequestArgs};

#[derive(Debug, Serialize)]
struct Outcome {
    content_type: Negotiated,
    accept: Negotiated,
}

pub fn run(request: RequestArgs, pretty: bool) -> Result<()> {
    match negotiate(&request) {
        Ok(outcome) => request::print_json(&outcome, pretty),
        Err(err) => request::reject(&err, pretty),
    }
}

fn negotiate(request: &RequestArgs) -> Result<Outcome, RequestError> {
    let negotiator = request.negotiator();
    let content_type = negotiator
        .content_type(request.content_type.as_deref())
        .map_err(RequestError::UnsupportedMediaType)?;
    let accept = negotiator
        .accept(request.accept.as_deref())
        .map_err(RequestError::NotAcceptable)?;
    Ok(Outcome {
        content_type,
        accept,
    })
}
