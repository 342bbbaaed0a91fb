//! Worker runtime: configuration and the multi-worker HTTP server.

mod config;
mod server;

pub use config::{DispatchConfig, Environment, ServerConfig, ENV_VAR};
pub use server::Server;
