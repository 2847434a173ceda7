use crate::harness::config::fixture_config;
use crate::harness::{CapturedEvent, IcapClient, init_test_tracing};
use std::net::TcpStream;
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};
use verdict_core::server::build_pingora_server;

/// Handle to a running Verdict test server.
pub struct TestServer {
    addr: String,
}

impl TestServer {
    /// Start Verdict from an HCL fixture, asking `lookup_base_url` for reputations.
    ///
    /// The listen port is allocated dynamically and injected into the config,
    /// so servers from parallel tests never collide.
    pub fn start(fixture: &str, lookup_base_url: &str) -> Self {
        // Initialize tracing (this must happen first).
        init_test_tracing(events());

        let listen_port = free_port();
        let cfg = fixture_config(fixture, listen_port, lookup_base_url);

        let server = build_pingora_server(&cfg).expect("failed to build verdict server");

        // Run server in background thread
        thread::spawn(move || {
            server.run_forever();
        });

        let addr = format!("127.0.0.1:{listen_port}");
        wait_for_server(&addr);

        Self { addr }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Open a fresh ICAP connection to the server.
    pub fn client(&self) -> IcapClient {
        IcapClient::connect(&self.addr)
    }

    /// Events captured so far across every server in this test binary.
    pub fn events(&self) -> Vec<CapturedEvent> {
        events().lock().unwrap().clone()
    }
}

/// Poll until the server accepts connections (or panic).
fn wait_for_server(addr: &str) {
    let deadline = Instant::now() + Duration::from_secs(5);

    loop {
        match TcpStream::connect(addr) {
            Ok(_) => return,
            Err(_) => {
                if Instant::now() > deadline {
                    panic!("server failed to start at {addr}");
                }
                thread::sleep(Duration::from_millis(25));
            }
        }
    }
}

static EVENTS: OnceLock<Arc<Mutex<Vec<CapturedEvent>>>> = OnceLock::new();

fn events() -> Arc<Mutex<Vec<CapturedEvent>>> {
    EVENTS
        .get_or_init(|| Arc::new(Mutex::new(Vec::new())))
        .clone()
}

/// Allocate a free port on localhost.
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}
