//! Minimal ICAP (RFC 3507) plumbing: request head parsing, body draining and
//! response serialization. Message bodies are never inspected.

mod codec;
mod error;
mod method;
mod request;
mod response;


pub use codec::{CodecLimits, read_request};
pub use error::IcapError;
pub use method::IcapMethod;
pub use request::{AdaptationRequest, Encapsulated, HttpTarget, Section};
pub use response::{HeaderList, HttpResponseHead, IcapResponse};

/// Protocol version written on every response line.
pub const ICAP_VERSION: &str = "ICAP/1.0";

/// Default ICAP port as registered with IANA.
pub const DEFAULT_ICAP_PORT: u16 = 1344;
