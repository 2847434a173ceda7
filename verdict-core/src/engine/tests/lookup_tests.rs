use super::policy;
use crate::engine::{DefaultOutcome, HttpLookupClient, LookupKey, LookupResult, lookup};
use pretty_assertions::assert_eq;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// One-shot HTTP server answering a single request with `status` and `body`.
///
/// The request line it received is sent back on the returned channel.
fn reputation_stub(status: u16, body: &'static str) -> (String, mpsc::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());

        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            if line == "\r\n" || line.is_empty() {
                break;
            }
        }
        tx.send(request_line.trim_end().to_string()).unwrap();

        let mut stream = stream;
        write!(
            stream,
            "HTTP/1.1 {status} X\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
        .unwrap();
    });

    (format!("http://{addr}/sb/01"), rx)
}

fn client_for(base_url: &str, timeout: Duration) -> HttpLookupClient {
    let mut p = policy(DefaultOutcome::Allow);
    p.lookup_base_url = base_url.to_string();
    p.lookup_timeout = timeout;
    HttpLookupClient::new(&p).unwrap()
}

#[test]
fn body_tokens_map_to_results() {
    assert_eq!(LookupResult::from_body(b"OK"), LookupResult::Allow);
    assert_eq!(LookupResult::from_body(b"OK\n"), LookupResult::Allow);
    assert_eq!(LookupResult::from_body(b"ERR"), LookupResult::Deny);
    assert_eq!(LookupResult::from_body(b"ERR: malware"), LookupResult::Deny);
    assert_eq!(LookupResult::from_body(b"DUNNO"), LookupResult::Unknown);
}

#[test]
fn short_bodies_are_unknown() {
    assert_eq!(LookupResult::from_body(b""), LookupResult::Unknown);
    assert_eq!(LookupResult::from_body(b"O"), LookupResult::Unknown);
    assert_eq!(LookupResult::from_body(b"ER"), LookupResult::Unknown);
}

#[test]
fn only_unknown_and_failed_are_inconclusive() {
    assert!(!LookupResult::Allow.is_inconclusive());
    assert!(!LookupResult::Deny.is_inconclusive());
    assert!(LookupResult::Unknown.is_inconclusive());
    assert!(LookupResult::LookupFailed.is_inconclusive());
}

#[test]
fn query_urls_are_encoded() {
    let client = client_for("http://filterdb:8080/sb/01/", Duration::from_secs(1));

    assert_eq!(
        client.uri_url("http://bad.example/x"),
        "http://filterdb:8080/sb/01/url/?url=http%3A%2F%2Fbad.example%2Fx"
    );
    assert_eq!(
        client.host_port_url("secure.example", 443),
        "http://filterdb:8080/sb/01/tcp/?host=secure.example&port=443"
    );
}

#[tokio::test]
async fn uri_lookup_hits_the_url_endpoint() {
    // Arrange
    let (base, requests) = reputation_stub(200, "ERR");
    let client = client_for(&base, Duration::from_secs(2));
    let key = LookupKey::Uri {
        uri: "http://bad.example/x".to_string(),
    };

    // Act
    let result = lookup(&client, &key).await;

    // Assert
    assert_eq!(result, LookupResult::Deny);
    assert_eq!(
        requests.recv_timeout(Duration::from_secs(2)).unwrap(),
        "GET /sb/01/url/?url=http%3A%2F%2Fbad.example%2Fx HTTP/1.1"
    );
}

#[tokio::test]
async fn host_port_lookup_hits_the_tcp_endpoint() {
    // Arrange
    let (base, requests) = reputation_stub(200, "OK");
    let client = client_for(&base, Duration::from_secs(2));
    let key = LookupKey::HostPort {
        host: "secure.example".to_string(),
        port: 443,
    };

    // Act
    let result = lookup(&client, &key).await;

    // Assert
    assert_eq!(result, LookupResult::Allow);
    assert_eq!(
        requests.recv_timeout(Duration::from_secs(2)).unwrap(),
        "GET /sb/01/tcp/?host=secure.example&port=443 HTTP/1.1"
    );
}

#[tokio::test]
async fn error_status_is_a_failed_lookup() {
    let (base, _requests) = reputation_stub(500, "OK");
    let client = client_for(&base, Duration::from_secs(2));

    let result = client_lookup_uri(&client).await;

    assert_eq!(result, LookupResult::LookupFailed);
}

#[tokio::test]
async fn unreachable_service_is_a_failed_lookup() {
    // Bind then drop to get a port nobody listens on.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = client_for(&format!("http://127.0.0.1:{port}/sb/01"), Duration::from_secs(2));

    let result = client_lookup_uri(&client).await;

    assert_eq!(result, LookupResult::LookupFailed);
}

#[tokio::test]
async fn slow_service_times_out() {
    // Arrange
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        let (_stream, _) = listener.accept().unwrap();
        thread::sleep(Duration::from_secs(3));
    });
    let client = client_for(&format!("http://{addr}/sb/01"), Duration::from_millis(200));

    // Act
    let result = client_lookup_uri(&client).await;

    // Assert
    assert_eq!(result, LookupResult::LookupFailed);
}

async fn client_lookup_uri(client: &HttpLookupClient) -> LookupResult {
    lookup(
        client,
        &LookupKey::Uri {
            uri: "http://example.com/".to_string(),
        },
    )
    .await
}
