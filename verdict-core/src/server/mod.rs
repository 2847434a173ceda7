mod app;
mod pid;
pub mod setup;


pub use app::{IcapApp, serve_connection};
pub use setup::{build_icap_app, build_pingora_server, run};
