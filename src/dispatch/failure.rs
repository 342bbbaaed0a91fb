//! Failure containment: diagnostics and the safe 500 response.

use crate::dispatch::RequestContext;
use crate::error::DispatchError;
use crate::http::{Method, Params, Response, StatusCode};
use crate::runtime::Environment;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use tracing::error;

const MAX_BODY_EXCERPT: usize = 4096;
const GENERIC_BODY: &str = "<h1>Internal Server Error</h1>";

/// Context captured when a request fails.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticRecord {
    pub timestamp: DateTime<Utc>,
    pub method: Method,
    pub uri: String,
    pub error: String,
    /// Decoded form fields of the request body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Params>,
    /// Raw body excerpt, when the body is not a form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<Map<String, Value>>,
}

impl DiagnosticRecord {
    /// Capture the request state around `err`.
    pub fn capture(ctx: &RequestContext, err: &DispatchError) -> Self {
        let post = Some(ctx.request.post()).filter(|p| !p.is_empty());
        let body = match (&post, ctx.request.text()) {
            (None, Some(text)) if !text.is_empty() => Some(excerpt(text)),
            _ => None,
        };
        Self {
            timestamp: Utc::now(),
            method: ctx.method,
            uri: ctx.request.uri.clone(),
            error: err.to_string(),
            post,
            body,
            session: ctx.session.snapshot(),
        }
    }
}

fn excerpt(mut text: String) -> String {
    if text.len() > MAX_BODY_EXCERPT {
        let mut cut = MAX_BODY_EXCERPT;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push_str("...");
    }
    text
}

impl fmt::Display for DiagnosticRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}] {} {}", self.timestamp.to_rfc2822(), self.method, self.uri)?;
        write!(f, "\n{}\n", self.error)?;
        if let Some(post) = &self.post {
            let post = serde_json::to_string_pretty(post).map_err(|_| fmt::Error)?;
            write!(f, "\n{} {}\n", self.method, post)?;
        }
        if let Some(body) = &self.body {
            write!(f, "\nbody = {}\n", body)?;
        }
        if let Some(session) = &self.session {
            let session = serde_json::to_string_pretty(session).map_err(|_| fmt::Error)?;
            write!(f, "\nsession = {}\n", session)?;
        }
        Ok(())
    }
}

/// Operational log destination for diagnostics.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, record: &DiagnosticRecord);
}

/// Emits each record as one `error!` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, record: &DiagnosticRecord) {
        error!(method = %record.method, uri = %record.uri, "{}", record);
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<DiagnosticRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<DiagnosticRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, record: &DiagnosticRecord) {
        self.records.lock().push(record.clone());
    }
}

/// Run `f`, turning a panic into [`DispatchError::Panic`].
pub fn contain<T>(f: impl FnOnce() -> Result<T, DispatchError>) -> Result<T, DispatchError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(DispatchError::Panic(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Logs a failed request and answers it.
pub struct FailureBoundary {
    sink: std::sync::Arc<dyn DiagnosticSink>,
    environment: Environment,
}

impl FailureBoundary {
    pub fn new(sink: std::sync::Arc<dyn DiagnosticSink>, environment: Environment) -> Self {
        Self { sink, environment }
    }

    /// Emit `record` and build the 500 response. Production gets a generic
    /// body, every other environment the full diagnostic.
    pub fn respond(&self, record: DiagnosticRecord) -> Response {
        self.sink.emit(&record);
        if self.environment.is_production() {
            Response::html(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_BODY)
        } else {
            Response::error(StatusCode::INTERNAL_SERVER_ERROR, record.to_string())
        }
    }
}

impl fmt::Debug for FailureBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureBoundary")
            .field("environment", &self.environment)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Connection, Request};
    use crate::routing::PathVars;
    use crate::session::Session;
    use std::sync::Arc;

    fn context(request: Request) -> RequestContext {
        RequestContext {
            method: request.method,
            path: request.path().to_string(),
            vars: PathVars::default(),
            connection: Connection::detached(),
            request: Arc::new(request),
            session: Session::detached(),
        }
    }

    #[test]
    fn test_capture_form_and_session() {
        let ctx = context(Request::new(Method::Post, "/login?next=/").form("user=ann"));
        ctx.session.set("cart", vec![1, 2]).unwrap();
        let record = DiagnosticRecord::capture(&ctx, &DispatchError::Misuse("bad".into()));

        assert_eq!(record.uri, "/login?next=/");
        assert_eq!(record.post.as_ref().and_then(|p| p.get("user")), Some("ann"));
        assert!(record.body.is_none());
        assert!(record.session.as_ref().unwrap().contains_key("cart"));

        let text = record.to_string();
        assert!(text.contains("POST /login?next=/"));
        assert!(text.contains("bad"));
        assert!(text.contains("\"user\": \"ann\""));
        assert!(text.contains("session = "));
    }

    #[test]
    fn test_capture_raw_body() {
        let ctx = context(Request::new(Method::Put, "/doc").body("x".repeat(MAX_BODY_EXCERPT + 10)));
        let record = DiagnosticRecord::capture(&ctx, &DispatchError::Panic("p".into()));
        let body = record.body.unwrap();
        assert_eq!(body.len(), MAX_BODY_EXCERPT + 3);
        assert!(record.post.is_none());
        assert!(record.session.is_none());
    }

    #[test]
    fn test_contain_catches_panics() {
        let result: Result<(), _> = contain(|| panic!("handler exploded"));
        assert!(matches!(result, Err(DispatchError::Panic(msg)) if msg == "handler exploded"));

        let ok = contain(|| Ok::<_, DispatchError>(7)).unwrap();
        assert_eq!(ok, 7);
    }

    #[test]
    fn test_respond_by_environment() {
        let sink = Arc::new(MemorySink::new());
        let ctx = context(Request::new(Method::Get, "/boom"));
        let record = || DiagnosticRecord::capture(&ctx, &DispatchError::Misuse("oops".into()));

        let dev = FailureBoundary::new(sink.clone(), Environment::Testing).respond(record());
        assert_eq!(dev.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(dev.text_body().unwrap().contains("oops"));

        let prod = FailureBoundary::new(sink.clone(), Environment::Production).respond(record());
        assert_eq!(prod.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(prod.text_body().as_deref(), Some(GENERIC_BODY));

        assert_eq!(sink.len(), 2);
    }
}
