use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

/// A canned answer for requests whose target contains `needle`.
#[derive(Debug, Clone)]
struct Rule {
    needle: String,
    status: u16,
    body: String,
}

/// In-process stand-in for the reputation lookup service.
///
/// Answers `200 OK` with body `OK` unless a rule matches the request target.
/// Every request target is recorded, so tests can assert which endpoint was hit.
pub struct FakeReputation {
    base_url: String,
    rules: Arc<Mutex<Vec<Rule>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FakeReputation {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind reputation stub");
        let addr = listener.local_addr().expect("no local addr");

        let rules: Arc<Mutex<Vec<Rule>>> = Arc::default();
        let requests: Arc<Mutex<Vec<String>>> = Arc::default();

        thread::spawn({
            let rules = rules.clone();
            let requests = requests.clone();
            move || {
                for stream in listener.incoming() {
                    let Ok(stream) = stream else { continue };
                    let rules = rules.clone();
                    let requests = requests.clone();
                    thread::spawn(move || handle(stream, &rules, &requests));
                }
            }
        });

        Self {
            base_url: format!("http://{addr}/sb/01"),
            rules,
            requests,
        }
    }

    /// Answer `body` with `200` for targets containing `needle`.
    pub fn answer(&self, needle: &str, body: &str) -> &Self {
        self.answer_with_status(needle, 200, body)
    }

    pub fn answer_with_status(&self, needle: &str, status: u16, body: &str) -> &Self {
        self.rules.lock().unwrap().push(Rule {
            needle: needle.to_string(),
            status,
            body: body.to_string(),
        });
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Request targets received so far, e.g. `/sb/01/url/?url=...`.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

fn handle(stream: TcpStream, rules: &Mutex<Vec<Rule>>, requests: &Mutex<Vec<String>>) {
    let Ok(read_half) = stream.try_clone() else {
        return;
    };
    let mut reader = BufReader::new(read_half);

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) if line == "\r\n" => break,
            Ok(_) => {}
        }
    }

    let target = request_line
        .split_whitespace()
        .nth(1)
        .unwrap_or_default()
        .to_string();
    requests.lock().unwrap().push(target.clone());

    let (status, body) = rules
        .lock()
        .unwrap()
        .iter()
        .find(|rule| target.contains(&rule.needle))
        .map(|rule| (rule.status, rule.body.clone()))
        .unwrap_or((200, "OK".to_string()));

    let mut stream = stream;
    let _ = write!(
        stream,
        "HTTP/1.1 {status} Stub\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
}
