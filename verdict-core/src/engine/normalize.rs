use crate::engine::lookup::LookupResult;
use crate::engine::policy::{DefaultOutcome, Policy};

/// Canonical decision for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaptationOutcome {
    /// Forward the original request unchanged.
    Allow,
    /// Send the client to the block page. The location is built by the
    /// responder from the original request.
    Redirect,
}

/// Fold a lookup result and the configured default into an outcome.
///
/// Explicit answers always win. Only inconclusive results (`Unknown` or
/// `LookupFailed`) consult `policy.default_outcome`, so an unreachable
/// reputation service blocks nothing unless deny-by-default is configured.
pub fn normalize(result: LookupResult, policy: &Policy) -> AdaptationOutcome {
    match result {
        LookupResult::Allow => AdaptationOutcome::Allow,
        LookupResult::Deny => AdaptationOutcome::Redirect,
        LookupResult::Unknown | LookupResult::LookupFailed => match policy.default_outcome {
            DefaultOutcome::Allow => AdaptationOutcome::Allow,
            DefaultOutcome::Deny => AdaptationOutcome::Redirect,
        },
    }
}
