use crate::conf::types::ServerConfig;
use crate::engine::classify::{LookupKey, classify};
use crate::engine::lookup::{ReputationOracle, lookup};
use crate::engine::normalize::{AdaptationOutcome, normalize};
use crate::engine::policy::Policy;
use crate::engine::respond::respond;
use crate::engine::{ISTAG, SERVICE_BRAND};
use crate::icap::{AdaptationRequest, HeaderList, IcapMethod, IcapResponse};
use std::sync::Arc;
use tracing::{debug, info, warn};

const OPTIONS_TTL_SECS: u32 = 1800;

/// Headers the proxy should pass along with every request.
const X_INCLUDE: &str = "X-Client-IP, X-Authenticated-Groups, X-Authenticated-User, X-Subscriber-Id";

/// The two ICAP services exposed on the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcapService {
    /// Runs the decision pipeline on REQMOD.
    Filter,
    /// Catch-all that never adapts anything.
    Bypass,
}

impl IcapService {
    pub fn description(&self) -> String {
        match self {
            IcapService::Filter => format!("{SERVICE_BRAND} filter ICAP service"),
            IcapService::Bypass => format!("{SERVICE_BRAND} default ICAP service"),
        }
    }

    /// `ISTag` and `Service`, present on every terminal response.
    fn identity_headers(&self) -> HeaderList {
        let mut headers = HeaderList::new();
        headers.set("ISTag", ISTAG);
        headers.set("Service", self.description());
        headers
    }
}

#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// ICAP URI path of the filter service, e.g. `/filter`.
    pub filter_path: String,
    /// Advertised through `Max-Connections` in OPTIONS responses.
    pub max_connections: u32,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            filter_path: "/filter".to_string(),
            max_connections: 4000,
        }
    }
}

impl From<&ServerConfig> for ServiceOptions {
    fn from(cfg: &ServerConfig) -> Self {
        Self {
            filter_path: cfg.filter_path.clone(),
            max_connections: cfg.max_connections,
        }
    }
}

/// Routes each ICAP request to exactly one terminal response.
///
/// Holds only read-only state, so a single instance serves every connection
/// concurrently.
pub struct Dispatcher {
    policy: Arc<Policy>,
    oracle: Arc<dyn ReputationOracle>,
    options: ServiceOptions,
}

impl Dispatcher {
    pub fn new(
        policy: Arc<Policy>,
        oracle: Arc<dyn ReputationOracle>,
        options: ServiceOptions,
    ) -> Self {
        Self {
            policy,
            oracle,
            options,
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn service_for(&self, req: &AdaptationRequest) -> IcapService {
        if req.service_path() == self.options.filter_path {
            IcapService::Filter
        } else {
            IcapService::Bypass
        }
    }

    pub async fn dispatch(&self, req: &AdaptationRequest) -> IcapResponse {
        let service = self.service_for(req);

        let response = match service {
            IcapService::Filter => self.filter(req).await,
            IcapService::Bypass => self.bypass(req),
        };

        with_identity(service, response)
    }

    /// Answer for a request the codec could not frame.
    pub fn malformed(&self) -> IcapResponse {
        with_identity(IcapService::Bypass, IcapResponse::bad_request())
    }

    async fn filter(&self, req: &AdaptationRequest) -> IcapResponse {
        match &req.method {
            IcapMethod::Options => self.options_response(IcapService::Filter),
            IcapMethod::ReqMod => self.decide(req).await,
            // Response bodies are never adapted.
            IcapMethod::RespMod => IcapResponse::no_content(),
            IcapMethod::Other(method) => {
                warn!(method = %method, uri = %req.uri, "unsupported ICAP method");
                IcapResponse::method_not_allowed()
            }
        }
    }

    fn bypass(&self, req: &AdaptationRequest) -> IcapResponse {
        match &req.method {
            IcapMethod::Options => self.options_response(IcapService::Bypass),
            IcapMethod::ReqMod | IcapMethod::RespMod => {
                debug!(
                    method = %req.method,
                    uri = %req.uri,
                    filter_path = %self.options.filter_path,
                    "request on the default service, not adapting"
                );
                IcapResponse::no_content()
            }
            IcapMethod::Other(method) => {
                warn!(method = %method, uri = %req.uri, "unsupported ICAP method");
                IcapResponse::method_not_allowed()
            }
        }
    }

    fn options_response(&self, service: IcapService) -> IcapResponse {
        let resp = IcapResponse::new(http::StatusCode::OK)
            .with_header("Methods", "REQMOD, RESPMOD")
            .with_header("Options-TTL", OPTIONS_TTL_SECS.to_string())
            .with_header("Allow", "204")
            .with_header("Preview", "0")
            .with_header("Transfer-Preview", "*")
            .with_header("Max-Connections", self.options.max_connections.to_string());

        match service {
            IcapService::Filter => resp.with_header("X-Include", X_INCLUDE),
            IcapService::Bypass => resp
                .with_header(
                    "This-Server",
                    "Default ICAP url which bypass all requests adaptation",
                )
                .with_header("X-Include", format!("{X_INCLUDE}, X-Server-IP")),
        }
    }

    /// classify -> lookup -> normalize -> respond, once per REQMOD.
    async fn decide(&self, req: &AdaptationRequest) -> IcapResponse {
        let Some(target) = &req.target else {
            // The codec rejects REQMOD without a request header.
            return IcapResponse::bad_request();
        };

        let key = classify(target);
        let result = lookup(self.oracle.as_ref(), &key).await;
        let outcome = normalize(result, &self.policy);

        if self.policy.debug && result.is_inconclusive() {
            debug!(
                uri = %target.uri,
                result = %result,
                default_outcome = %self.policy.default_outcome,
                default_answer = true,
                "inconclusive reputation answer, taking default action"
            );
        }

        let lookup_kind = match &key {
            LookupKey::HostPort { .. } => "tcp",
            LookupKey::Uri { .. } => "url",
        };

        info!(
            method = %target.method,
            uri = %target.uri,
            lookup = lookup_kind,
            result = %result,
            blocked = outcome == AdaptationOutcome::Redirect,
            "adaptation decision"
        );

        respond(outcome, target, &self.policy)
    }
}

fn with_identity(service: IcapService, response: IcapResponse) -> IcapResponse {
    let mut headers = service.identity_headers();
    headers.merge(response.headers);
    IcapResponse { headers, ..response }
}
