//! # Switchyard - request dispatch core for multi-worker HTTP servers
//!
//! Switchyard resolves each inbound request to a registered handler, binds
//! the handler's declared parameters from the request, calls it, turns the
//! result into a response, and contains every failure so a worker keeps
//! serving after a handler error or panic.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     Server (N worker threads)                       │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                   │  one Coordinator per worker
//!                                   ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                           Coordinator                               │
//! │  ┌──────────────┐  ┌───────────────────┐  ┌────────┐  ┌─────────┐   │
//! │  │ RouteTable   │─▶│ ParameterResolver │─▶│Invoker │─▶│ coerce  │   │
//! │  │ (trie/method)│  │ (plan per handler)│  │        │  │         │   │
//! │  └──────────────┘  └───────────────────┘  └────────┘  └─────────┘   │
//! │            └──────────── FailureBoundary ─────────────────┘         │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use switchyard::prelude::*;
//!
//! #[handler]
//! fn show_item(id: u64, get: Params) -> serde_json::Value {
//!     serde_json::json!({ "id": id, "expand": get.get("expand") })
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     Server::new(ServerConfig::new()).run(|dispatch| {
//!         let mut routes = RouteTable::new();
//!         routes.get("/items/{id}", ShowItemHandler)?;
//!         Ok(Coordinator::new(routes.freeze(), dispatch.clone()))
//!     })
//! }
//! ```
//!
//! ## Handler parameters
//!
//! Parameter names decide where values come from: `connection`, `request`,
//! `session`, `get` (query), `post` (form body) and `files` are fixed; any
//! other name binds the path variable of the same name, then the declared
//! default. A required parameter that cannot be bound answers 400 without
//! running the handler.

extern crate self as switchyard;

pub mod dispatch;
pub mod error;
pub mod handler;
pub mod http;
pub mod render;
pub mod routing;
pub mod runtime;
pub mod session;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::dispatch::{Coordinator, DiagnosticSink, MemorySink, TracingSink};
    pub use crate::error::{DispatchError, InputError, RouteError};
    pub use crate::handler::{
        Args, Controller, ControllerBase, Flow, Handler, HandlerSpec, IntoReply, Json, ParamDecl, Reply,
    };
    pub use crate::http::{Connection, Files, Method, MethodSet, Params, Request, Response, StatusCode};
    pub use crate::render::Renderer;
    pub use crate::routing::{Member, Routable, RouteTable};
    pub use crate::runtime::{DispatchConfig, Environment, Server, ServerConfig};
    pub use crate::session::{MemorySessionStore, Session, SessionStore};
    pub use switchyard_macro::{handler, routes};
}

// Re-export for convenience
pub use dispatch::Coordinator;
pub use handler::{Controller, ControllerBase, Handler};
pub use http::{Request, Response};
pub use routing::RouteTable;
pub use runtime::{Server, ServerConfig};
pub use switchyard_macro::{handler, routes};
