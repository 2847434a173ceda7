mod config;
pub mod icap_client;
pub mod reputation;
pub mod server;
pub mod tracing;

pub use icap_client::{IcapClient, IcapReply};
pub use reputation::FakeReputation;
pub use server::TestServer;
pub use tracing::{CapturedEvent, init_test_tracing};
