//! WebSocket server: accept loop and per-connection transport glue

pub mod config;
pub mod listener;

pub use config::ServerConfig;
pub use listener::RelayServer;
