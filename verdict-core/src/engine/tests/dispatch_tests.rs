use super::policy;
use crate::engine::{
    DefaultOutcome, Dispatcher, ISTAG, IcapService, LookupResult, Policy, ReputationOracle,
    ServiceOptions,
};
use crate::icap::{AdaptationRequest, HttpTarget, IcapMethod, IcapResponse};
use async_trait::async_trait;
use http::{HeaderMap, Method, StatusCode};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

/// Oracle returning a fixed answer and recording every question.
struct FixedOracle {
    answer: LookupResult,
    asked: Mutex<Vec<String>>,
}

impl FixedOracle {
    fn new(answer: LookupResult) -> Arc<Self> {
        Arc::new(Self {
            answer,
            asked: Mutex::new(Vec::new()),
        })
    }

    fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReputationOracle for FixedOracle {
    async fn lookup_host_port(&self, host: &str, port: u16) -> LookupResult {
        self.asked.lock().unwrap().push(format!("tcp {host} {port}"));
        self.answer
    }

    async fn lookup_uri(&self, uri: &str) -> LookupResult {
        self.asked.lock().unwrap().push(format!("url {uri}"));
        self.answer
    }
}

fn dispatcher(oracle: Arc<FixedOracle>, default: DefaultOutcome) -> Dispatcher {
    Dispatcher::new(
        Arc::new(policy(default)),
        oracle,
        ServiceOptions::default(),
    )
}

fn request(method: IcapMethod, path: &str, target: Option<(Method, &str, &str)>) -> AdaptationRequest {
    AdaptationRequest {
        method,
        uri: format!("icap://127.0.0.1:1344{path}"),
        headers: HeaderMap::new(),
        target: target.map(|(method, authority, uri)| HttpTarget {
            method,
            authority: authority.to_string(),
            uri: uri.to_string(),
        }),
    }
}

fn location(resp: &IcapResponse) -> Option<String> {
    resp.adapted
        .as_ref()
        .and_then(|head| head.headers.get("Location"))
        .map(str::to_string)
}

#[tokio::test]
async fn allowed_get_passes_through() {
    // Arrange
    let oracle = FixedOracle::new(LookupResult::Allow);
    let d = dispatcher(oracle.clone(), DefaultOutcome::Allow);
    let req = request(
        IcapMethod::ReqMod,
        "/filter",
        Some((Method::GET, "example.com", "http://example.com/index.html")),
    );

    // Act
    let resp = d.dispatch(&req).await;

    // Assert
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
    assert_eq!(oracle.asked(), vec!["url http://example.com/index.html"]);
}

#[tokio::test]
async fn denied_get_is_redirected_to_block_page() {
    // Arrange
    let oracle = FixedOracle::new(LookupResult::Deny);
    let d = dispatcher(oracle.clone(), DefaultOutcome::Allow);
    let req = request(
        IcapMethod::ReqMod,
        "/filter",
        Some((Method::GET, "bad.example", "http://bad.example/x")),
    );

    // Act
    let resp = d.dispatch(&req).await;

    // Assert
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(
        location(&resp).as_deref(),
        Some("http://block.example/page/?url=http%3A%2F%2Fbad.example%2Fx")
    );
}

#[tokio::test]
async fn connect_is_looked_up_by_host_and_port() {
    // Arrange
    let oracle = FixedOracle::new(LookupResult::Allow);
    let d = dispatcher(oracle.clone(), DefaultOutcome::Allow);
    let req = request(
        IcapMethod::ReqMod,
        "/filter",
        Some((Method::CONNECT, "secure.example:443", "secure.example:443")),
    );

    // Act
    let resp = d.dispatch(&req).await;

    // Assert
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
    assert_eq!(oracle.asked(), vec!["tcp secure.example 443"]);
}

#[tokio::test]
async fn failed_lookup_with_deny_default_blocks() {
    let oracle = FixedOracle::new(LookupResult::LookupFailed);
    let d = dispatcher(oracle, DefaultOutcome::Deny);
    let req = request(
        IcapMethod::ReqMod,
        "/filter",
        Some((Method::GET, "example.com", "http://example.com/")),
    );

    let resp = d.dispatch(&req).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(
        location(&resp).as_deref(),
        Some("http://block.example/page/?url=http%3A%2F%2Fexample.com%2F")
    );
}

#[tokio::test]
async fn unknown_answer_with_allow_default_passes() {
    let oracle = FixedOracle::new(LookupResult::Unknown);
    let d = dispatcher(oracle, DefaultOutcome::Allow);
    let req = request(
        IcapMethod::ReqMod,
        "/filter",
        Some((Method::GET, "example.com", "http://example.com/")),
    );

    let resp = d.dispatch(&req).await;

    assert_eq!(resp.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn respmod_is_never_adapted_or_looked_up() {
    let oracle = FixedOracle::new(LookupResult::Deny);
    let d = dispatcher(oracle.clone(), DefaultOutcome::Deny);
    let req = request(IcapMethod::RespMod, "/filter", None);

    let resp = d.dispatch(&req).await;

    assert_eq!(resp.status, StatusCode::NO_CONTENT);
    assert!(oracle.asked().is_empty());
}

#[tokio::test]
async fn unknown_method_is_rejected() {
    let oracle = FixedOracle::new(LookupResult::Allow);
    let d = dispatcher(oracle.clone(), DefaultOutcome::Allow);
    let req = request(IcapMethod::Other("PURGE".to_string()), "/filter", None);

    let resp = d.dispatch(&req).await;

    assert_eq!(resp.status, StatusCode::METHOD_NOT_ALLOWED);
    assert!(oracle.asked().is_empty());
}

#[tokio::test]
async fn filter_options_advertise_capabilities() {
    // Arrange
    let d = dispatcher(FixedOracle::new(LookupResult::Allow), DefaultOutcome::Allow);
    let req = request(IcapMethod::Options, "/filter", None);

    // Act
    let resp = d.dispatch(&req).await;

    // Assert
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.headers.get("Methods"), Some("REQMOD, RESPMOD"));
    assert_eq!(resp.headers.get("Allow"), Some("204"));
    assert_eq!(resp.headers.get("Preview"), Some("0"));
    assert_eq!(resp.headers.get("Options-TTL"), Some("1800"));
    assert_eq!(resp.headers.get("Max-Connections"), Some("4000"));
    assert_eq!(resp.headers.get("This-Server"), None);
}

#[tokio::test]
async fn other_paths_bypass_adaptation() {
    // Arrange
    let oracle = FixedOracle::new(LookupResult::Deny);
    let d = dispatcher(oracle.clone(), DefaultOutcome::Deny);
    let req = request(
        IcapMethod::ReqMod,
        "/somewhere-else",
        Some((Method::GET, "bad.example", "http://bad.example/")),
    );

    // Act
    let resp = d.dispatch(&req).await;

    // Assert
    assert_eq!(d.service_for(&req), IcapService::Bypass);
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
    assert_eq!(resp.headers.get("Service"), Some("Verdict default ICAP service"));
    assert!(oracle.asked().is_empty());
}

#[tokio::test]
async fn bypass_options_describe_the_default_service() {
    let d = dispatcher(FixedOracle::new(LookupResult::Allow), DefaultOutcome::Allow);
    let req = request(IcapMethod::Options, "/", None);

    let resp = d.dispatch(&req).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(
        resp.headers.get("This-Server"),
        Some("Default ICAP url which bypass all requests adaptation")
    );
    assert!(resp.headers.get("X-Include").unwrap().ends_with("X-Server-IP"));
}

#[tokio::test]
async fn every_response_leads_with_identity_headers() {
    let d = dispatcher(FixedOracle::new(LookupResult::Deny), DefaultOutcome::Allow);
    let req = request(
        IcapMethod::ReqMod,
        "/filter",
        Some((Method::GET, "bad.example", "http://bad.example/")),
    );

    let resp = d.dispatch(&req).await;
    let names: Vec<&str> = resp.headers.iter().map(|(name, _)| name).take(2).collect();

    assert_eq!(names, vec!["ISTag", "Service"]);
    assert_eq!(resp.headers.get("ISTag"), Some(ISTAG));
    assert_eq!(resp.headers.get("Service"), Some("Verdict filter ICAP service"));
}

#[test]
fn malformed_requests_get_a_400_with_identity() {
    let d = dispatcher(FixedOracle::new(LookupResult::Allow), DefaultOutcome::Allow);

    let resp = d.malformed();

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.headers.get("ISTag"), Some(ISTAG));
}

/// Collects the field names of every event emitted while it is installed.
#[derive(Clone, Default)]
struct FieldNames(Arc<Mutex<Vec<String>>>);

impl FieldNames {
    fn contains(&self, name: &str) -> bool {
        self.0.lock().unwrap().iter().any(|n| n == name)
    }
}

impl<S: Subscriber> Layer<S> for FieldNames {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        event.record(&mut self.clone());
    }
}

impl Visit for FieldNames {
    fn record_debug(&mut self, field: &Field, _value: &dyn std::fmt::Debug) {
        self.0.lock().unwrap().push(field.name().to_string());
    }
}

async fn default_answer_logged(debug: bool) -> bool {
    let names = FieldNames::default();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(names.clone()));

    let d = Dispatcher::new(
        Arc::new(Policy {
            debug,
            ..policy(DefaultOutcome::Allow)
        }),
        FixedOracle::new(LookupResult::LookupFailed),
        ServiceOptions::default(),
    );
    let req = request(
        IcapMethod::ReqMod,
        "/filter",
        Some((Method::GET, "example.com", "http://example.com/")),
    );
    d.dispatch(&req).await;

    names.contains("default_answer")
}

#[tokio::test]
async fn default_answer_is_logged_only_with_debug_diagnostics() {
    // Act
    let quiet = default_answer_logged(false).await;
    let verbose = default_answer_logged(true).await;

    // Assert
    assert!(!quiet);
    assert!(verbose);
}
