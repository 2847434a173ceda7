use crate::icap::HttpTarget;
use http::uri::Authority;

/// What the reputation service is asked about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupKey {
    /// Tunnelled traffic: only the destination is known.
    HostPort { host: String, port: u16 },
    /// Plain HTTP: the full request URI.
    Uri { uri: String },
}

/// Derive the lookup key for a request.
///
/// A CONNECT whose authority splits into a non-empty host and a non-zero port
/// is looked up by host and port. Everything else, including a CONNECT with
/// no usable port, is looked up by URI.
pub fn classify(target: &HttpTarget) -> LookupKey {
    if target.is_tunnel()
        && let Some((host, port)) = split_authority(&target.authority)
    {
        return LookupKey::HostPort { host, port };
    }

    LookupKey::Uri {
        uri: target.uri.clone(),
    }
}

/// Split `host:port` into its parts. IPv6 brackets are removed from the host.
pub fn split_authority(authority: &str) -> Option<(String, u16)> {
    let authority: Authority = authority.parse().ok()?;
    let port = authority.port_u16().filter(|port| *port != 0)?;
    let host = authority
        .host()
        .trim_start_matches('[')
        .trim_end_matches(']');

    if host.is_empty() {
        return None;
    }

    Some((host.to_string(), port))
}
