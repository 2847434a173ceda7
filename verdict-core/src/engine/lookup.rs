use crate::engine::classify::LookupKey;
use crate::engine::encode::encode_query_value;
use crate::engine::policy::Policy;
use async_trait::async_trait;
use reqwest::header::CONNECTION;
use std::fmt::{Display, Formatter};
use tracing::debug;

/// Normalized answer of the reputation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupResult {
    Allow,
    Deny,
    /// The service answered, but without an opinion (or with a body too short to read).
    Unknown,
    /// Transport error, timeout or non-2xx status.
    LookupFailed,
}

impl LookupResult {
    /// Map a raw response body to a result.
    ///
    /// Bodies shorter than two bytes carry no token and count as `Unknown`.
    pub fn from_body(body: &[u8]) -> Self {
        if body.len() < 2 {
            LookupResult::Unknown
        } else if body.starts_with(b"OK") {
            LookupResult::Allow
        } else if body.starts_with(b"ERR") {
            LookupResult::Deny
        } else {
            LookupResult::Unknown
        }
    }

    /// Inconclusive results defer to the configured default outcome.
    pub fn is_inconclusive(&self) -> bool {
        matches!(self, LookupResult::Unknown | LookupResult::LookupFailed)
    }
}

impl Display for LookupResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupResult::Allow => f.write_str("OK"),
            LookupResult::Deny => f.write_str("ERR"),
            LookupResult::Unknown => f.write_str("DUNO"),
            LookupResult::LookupFailed => f.write_str("FAILED"),
        }
    }
}

/// A source of reputation answers.
///
/// Implementations never fail: every error is folded into
/// [`LookupResult::LookupFailed`] or [`LookupResult::Unknown`].
#[async_trait]
pub trait ReputationOracle: Send + Sync {
    async fn lookup_host_port(&self, host: &str, port: u16) -> LookupResult;

    async fn lookup_uri(&self, uri: &str) -> LookupResult;
}

/// Issue exactly one lookup for `key`.
pub async fn lookup(oracle: &dyn ReputationOracle, key: &LookupKey) -> LookupResult {
    match key {
        LookupKey::HostPort { host, port } => oracle.lookup_host_port(host, *port).await,
        LookupKey::Uri { uri } => oracle.lookup_uri(uri).await,
    }
}

/// Reputation client talking to the HTTP lookup service.
///
/// Every call is a single `GET` on a fresh connection, bounded by the policy
/// timeout. There are no retries and nothing is cached. With `debug` set in
/// the policy every query and answer is logged.
pub struct HttpLookupClient {
    client: reqwest::Client,
    base_url: String,
    debug: bool,
}

impl HttpLookupClient {
    pub fn new(policy: &Policy) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(policy.lookup_timeout)
            .pool_max_idle_per_host(0)
            .user_agent(concat!("verdict/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: policy.lookup_base_url.trim_end_matches('/').to_string(),
            debug: policy.debug,
        })
    }

    pub fn host_port_url(&self, host: &str, port: u16) -> String {
        format!(
            "{}/tcp/?host={}&port={}",
            self.base_url,
            encode_query_value(host),
            port
        )
    }

    pub fn uri_url(&self, uri: &str) -> String {
        format!("{}/url/?url={}", self.base_url, encode_query_value(uri))
    }

    async fn query(&self, url: &str) -> LookupResult {
        if self.debug {
            debug!(url, "reputation query");
        }

        let response = match self.client.get(url).header(CONNECTION, "close").send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(url, error = %e, timeout = e.is_timeout(), "reputation lookup failed");
                return LookupResult::LookupFailed;
            }
        };

        let status = response.status();
        if !status.is_success() {
            debug!(url, status = status.as_u16(), "reputation service returned an error status");
            return LookupResult::LookupFailed;
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                debug!(url, error = %e, "failed to read reputation answer");
                return LookupResult::LookupFailed;
            }
        };

        let result = LookupResult::from_body(&body);
        if self.debug {
            debug!(
                url,
                answer = %String::from_utf8_lossy(&body),
                answer_size = body.len(),
                result = %result,
                "reputation answer"
            );
        }
        result
    }
}

#[async_trait]
impl ReputationOracle for HttpLookupClient {
    async fn lookup_host_port(&self, host: &str, port: u16) -> LookupResult {
        self.query(&self.host_port_url(host, port)).await
    }

    async fn lookup_uri(&self, uri: &str) -> LookupResult {
        self.query(&self.uri_url(uri)).await
    }
}
