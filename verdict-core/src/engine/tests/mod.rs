mod dispatch_tests;
mod lookup_tests;

use crate::engine::{DefaultOutcome, Policy};
use crate::icap::HttpTarget;
use http::Method;
use std::time::Duration;

pub(super) fn policy(default_outcome: DefaultOutcome) -> Policy {
    Policy {
        default_outcome,
        block_page: "http://block.example/page/".to_string(),
        lookup_base_url: "http://127.0.0.1:9/sb/01".to_string(),
        lookup_timeout: Duration::from_millis(500),
        debug: false,
    }
}

pub(super) fn target(method: Method, authority: &str, uri: &str) -> HttpTarget {
    HttpTarget {
        method,
        authority: authority.to_string(),
        uri: uri.to_string(),
    }
}
