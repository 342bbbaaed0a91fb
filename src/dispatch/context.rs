//! Per-request dispatch state.

use crate::http::{Connection, Method, Request};
use crate::routing::PathVars;
use crate::session::Session;
use std::sync::Arc;

/// Per-request state, owned by the call stack handling one request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    /// Path with the query string stripped, percent-decoded.
    pub path: String,
    pub vars: PathVars,
    pub connection: Connection,
    pub request: Arc<Request>,
    pub session: Session,
}
