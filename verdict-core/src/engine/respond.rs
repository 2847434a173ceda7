use crate::engine::SERVICE_BRAND;
use crate::engine::encode::encode_query_value;
use crate::engine::normalize::AdaptationOutcome;
use crate::engine::policy::Policy;
use crate::icap::{HeaderList, HttpResponseHead, HttpTarget, IcapResponse};
use http::StatusCode;

/// Turn an outcome into the ICAP response for a REQMOD.
///
/// `Allow` is a bare 204. `Redirect` is an ICAP 200 wrapping a synthetic
/// `307` that points at the block page with the original URI attached.
pub fn respond(outcome: AdaptationOutcome, target: &HttpTarget, policy: &Policy) -> IcapResponse {
    match outcome {
        AdaptationOutcome::Allow => IcapResponse::no_content(),
        AdaptationOutcome::Redirect => {
            let mut headers = HeaderList::new();
            headers.set("Location", block_location(&policy.block_page, &target.uri));
            headers.set("Content-Length", "0");

            IcapResponse::adapted(HttpResponseHead {
                status: StatusCode::TEMPORARY_REDIRECT,
                reason: format!("{SERVICE_BRAND} this url has been filtered!"),
                headers,
            })
        }
    }
}

/// Block page URL with the original URI in the `url` query parameter.
pub fn block_location(block_page: &str, uri: &str) -> String {
    let separator = if block_page.contains('?') { '&' } else { '?' };
    format!("{block_page}{separator}url={}", encode_query_value(uri))
}
