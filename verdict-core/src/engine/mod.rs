//! Request classification and adaptation decisions.
//!
//! One REQMOD flows strictly through classify -> lookup -> normalize ->
//! respond. No stage keeps state between requests; the only shared value is
//! the read-only [`Policy`].

pub mod classify;
pub mod dispatch;
mod encode;
pub mod lookup;
pub mod normalize;
pub mod policy;
pub mod respond;

#[cfg(test)]
mod tests;

pub use classify::{LookupKey, classify};
pub use dispatch::{Dispatcher, IcapService, ServiceOptions};
pub use lookup::{HttpLookupClient, LookupResult, ReputationOracle, lookup};
pub use normalize::{AdaptationOutcome, normalize};
pub use policy::{DefaultOutcome, ParseDefaultOutcomeError, Policy};
pub use respond::{block_location, respond};

/// Product name used in service strings and the block status line.
pub const SERVICE_BRAND: &str = "Verdict";

/// Service revision tag sent as `ISTag` on every response.
pub const ISTAG: &str = concat!("\"VD-", env!("CARGO_PKG_VERSION"), "\"");
