pub mod cli;
pub mod conf;
pub mod engine;
pub mod icap;
pub mod logging;
pub mod server;
