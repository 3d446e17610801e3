use anyhow::Result;

use sideload::v1::{EncodingParameters, RequestError, parse_request};

use crate::request::{self, RequestArgs};

pub fn run(request: RequestArgs, pretty: bool) -> Result<()> {
    match parse(&request) {
        Ok(params) => request::print_json(&params, pretty),
        Err(err) => request::reject(&err, pretty),
    }
}

fn parse(request: &RequestArgs) -> Result<EncodingParameters, RequestError> {
    parse_request(&request.to_request(), &request.negotiator())
}
