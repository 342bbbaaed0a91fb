//! The per-worker request coordinator.

use crate::dispatch::coerce::coerce;
use crate::dispatch::context::RequestContext;
use crate::dispatch::failure::{contain, DiagnosticRecord, DiagnosticSink, FailureBoundary, TracingSink};
use crate::error::DispatchError;
use crate::handler::{
    ControllerBase, Flow, Handler, HandlerInvoker, Invocation, ParameterResolver, Target,
};
use crate::http::{Connection, Method, Request, Response, StatusCode};
use crate::render::{NoRenderer, Renderer};
use crate::routing::{CompiledRouteTable, RouteMatch};
use crate::runtime::DispatchConfig;
use crate::session::{MemorySessionStore, Session, SessionStore};
use std::sync::Arc;
use tracing::{debug, info};

/// Resolves requests to handlers and answers them.
///
/// Each worker owns one coordinator; nothing in it is shared with other
/// workers. The route table is immutable and binding plans are computed once
/// per handler, so requests need no locking beyond the plan cache.
pub struct Coordinator {
    routes: CompiledRouteTable,
    resolver: ParameterResolver,
    sessions: Arc<dyn SessionStore>,
    renderer: Arc<dyn Renderer>,
    boundary: FailureBoundary,
    config: DispatchConfig,
}

/// Builder for [`Coordinator`]. Unset capabilities fall back to an
/// in-memory session store, no renderer, and the tracing sink.
pub struct CoordinatorBuilder {
    routes: CompiledRouteTable,
    config: DispatchConfig,
    sessions: Option<Arc<dyn SessionStore>>,
    renderer: Option<Arc<dyn Renderer>>,
    sink: Option<Arc<dyn DiagnosticSink>>,
}

impl CoordinatorBuilder {
    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn sessions(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(store);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Coordinator {
        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingSink));
        info!(
            "coordinator ready: {} routes, {} environment",
            self.routes.len(),
            self.config.environment
        );
        Coordinator {
            routes: self.routes,
            resolver: ParameterResolver::new(),
            sessions: self
                .sessions
                .unwrap_or_else(|| Arc::new(MemorySessionStore::new())),
            renderer: self.renderer.unwrap_or_else(|| Arc::new(NoRenderer)),
            boundary: FailureBoundary::new(sink, self.config.environment),
            config: self.config,
        }
    }
}

impl Coordinator {
    pub fn builder(routes: CompiledRouteTable) -> CoordinatorBuilder {
        CoordinatorBuilder {
            routes,
            config: DispatchConfig::default(),
            sessions: None,
            renderer: None,
            sink: None,
        }
    }

    /// A coordinator with default capabilities.
    pub fn new(routes: CompiledRouteTable, config: DispatchConfig) -> Self {
        Self::builder(routes).config(config).build()
    }

    pub fn routes(&self) -> &CompiledRouteTable {
        &self.routes
    }

    pub fn resolver(&self) -> &ParameterResolver {
        &self.resolver
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Dispatch `request` using its own method and target.
    pub fn dispatch(&self, connection: &Connection, request: Request) -> Response {
        let method = request.method;
        let uri = request.uri.clone();
        self.handle(method, &uri, connection, request)
    }

    /// Answer one request. Never panics and never returns an error: every
    /// failure after routing becomes a 500 response.
    pub fn handle(
        &self,
        method: Method,
        raw_uri: &str,
        connection: &Connection,
        request: Request,
    ) -> Response {
        let path = decode_path(raw_uri);

        let (route, vars) = match self.routes.match_route(method, &path) {
            RouteMatch::NotFound => {
                debug!("no route for {} {}", method, path);
                return Response::html(
                    StatusCode::NOT_FOUND,
                    format!("<h1>Not Found: {}</h1>", escape_html(&path)),
                );
            }
            RouteMatch::MethodNotAllowed(allowed) => {
                debug!("{} not allowed for {}, allowed: {}", method, path, allowed);
                return Response::html(StatusCode::METHOD_NOT_ALLOWED, "<h1>Method Not Allowed</h1>")
                    .header("Allow", allowed.to_string());
            }
            RouteMatch::Matched { route, vars } => (route, vars),
        };

        let session = Session::new(
            self.sessions.clone(),
            request.cookie(&self.config.session_cookie),
        );
        let ctx = RequestContext {
            method,
            path,
            vars,
            connection: connection.clone(),
            request: Arc::new(request),
            session,
        };

        let response = match contain(|| self.invoke(route.handler(), &ctx)) {
            Ok(response) => response,
            Err(err) => self.boundary.respond(DiagnosticRecord::capture(&ctx, &err)),
        };
        self.finish(&ctx, response)
    }

    fn invoke(&self, handler: &Handler, ctx: &RequestContext) -> Result<Response, DispatchError> {
        let plan = self.resolver.plan_for(handler.spec());

        let invocation = match handler.target() {
            Target::Function(call) => HandlerInvoker::invoke(&plan, ctx, |args| call(args))?,
            Target::Method {
                controller,
                method,
                construct,
            } => {
                let base = ControllerBase::new(
                    ctx.connection.clone(),
                    ctx.request.clone(),
                    *controller,
                    method.as_ref(),
                    ctx.session.clone(),
                    self.renderer.clone(),
                    self.config.environment,
                );
                let mut instance = construct(base);
                match instance.before_route().map_err(DispatchError::Handler)? {
                    Flow::Respond(reply) => {
                        debug!("{}::{} answered by before_route", controller, method);
                        Invocation::Returned(reply)
                    }
                    Flow::Continue => {
                        HandlerInvoker::invoke(&plan, ctx, |args| instance.call(args))?
                    }
                }
            }
        };

        match invocation {
            Invocation::Returned(reply) => coerce(reply),
            Invocation::Rejected(input) => {
                debug!("bad request for {} {}: {}", ctx.method, ctx.path, input);
                Ok(Response::html(StatusCode::BAD_REQUEST, "<h1>Bad Request</h1>"))
            }
        }
    }

    /// Attach headers queued on the connection and a new session cookie.
    fn finish(&self, ctx: &RequestContext, mut response: Response) -> Response {
        for (name, value) in ctx.connection.take_headers() {
            response.append_header(name, value);
        }
        if let Some(cookie) = ctx.session.issued_cookie(&self.config.session_cookie) {
            response.append_header("Set-Cookie", cookie);
        }
        response
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("routes", &self.routes.len())
            .field("plans", &self.resolver.cached())
            .field("config", &self.config)
            .finish()
    }
}

/// Strip the query string and percent-decode the path. `+` stays literal.
pub fn decode_path(raw_uri: &str) -> String {
    let path = raw_uri.split_once('?').map_or(raw_uri, |(path, _)| path);
    String::from_utf8_lossy(&urlencoding::decode_binary(path.as_bytes())).into_owned()
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::failure::MemorySink;
    use crate::handler::{Args, Controller, HandlerSpec};
    use crate::routing::RouteTable;
    use crate::runtime::Environment;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static GUARDED_CALLS: AtomicUsize = AtomicUsize::new(0);

    struct Guarded {
        base: ControllerBase,
    }

    impl Controller for Guarded {
        fn new(base: ControllerBase) -> Self {
            Guarded { base }
        }

        fn before_route(&mut self) -> anyhow::Result<Flow> {
            if self.base.request().get_header("authorization").is_none() {
                return Ok(self.base.redirect("/login").into());
            }
            Ok(Flow::Continue)
        }
    }

    fn coordinator(sink: Arc<MemorySink>, environment: Environment) -> Coordinator {
        let mut table = RouteTable::new();
        table
            .get(
                "/items/{id}",
                Handler::function(HandlerSpec::named("items::show").param("id"), |mut args: Args| {
                    let id: u32 = args.take("id")?;
                    Ok::<_, anyhow::Error>(json!({"id": id}))
                }),
            )
            .unwrap();
        table
            .get(
                "/secret",
                Handler::method::<Guarded, _, _>(
                    HandlerSpec::named("Guarded::secret"),
                    "secret",
                    |this: &mut Guarded, _: Args| {
                        GUARDED_CALLS.fetch_add(1, Ordering::SeqCst);
                        this.base.text(format!("{} ok", this.base.method()))
                    },
                ),
            )
            .unwrap();
        table
            .post(
                "/visit",
                Handler::function(HandlerSpec::named("visit").param("session"), |mut args: Args| {
                    let session: Session = args.take("session")?;
                    session.set("visited", true)?;
                    Ok::<_, anyhow::Error>(Response::ok())
                }),
            )
            .unwrap();
        table
            .get(
                "/boom",
                Handler::function(HandlerSpec::named("boom"), |_| -> anyhow::Result<Response> {
                    anyhow::bail!("database unreachable")
                }),
            )
            .unwrap();
        Coordinator::builder(table.freeze())
            .config(DispatchConfig::new().environment(environment))
            .sink(sink)
            .build()
    }

    #[test]
    fn test_decode_path() {
        assert_eq!(decode_path("/items/42?x=1"), "/items/42");
        assert_eq!(decode_path("/a%20b/c+d"), "/a b/c+d");
        assert_eq!(decode_path("/caf%C3%A9"), "/café");
    }

    #[test]
    fn test_matched_json() {
        let sink = Arc::new(MemorySink::new());
        let coordinator = coordinator(sink.clone(), Environment::Testing);
        let response = coordinator.dispatch(&Connection::detached(), Request::new(Method::Get, "/items/42?x=1"));
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.text_body().as_deref(), Some(r#"{"id":42}"#));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_bad_path_value_is_client_error() {
        let sink = Arc::new(MemorySink::new());
        let coordinator = coordinator(sink.clone(), Environment::Testing);
        let response = coordinator.dispatch(&Connection::detached(), Request::new(Method::Get, "/items/abc"));
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_not_found_escapes_path() {
        let coordinator = coordinator(Arc::new(MemorySink::new()), Environment::Testing);
        let response = coordinator.dispatch(
            &Connection::detached(),
            Request::new(Method::Get, "/%3Cscript%3E"),
        );
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(
            response.text_body().as_deref(),
            Some("<h1>Not Found: /&lt;script&gt;</h1>")
        );
    }

    #[test]
    fn test_method_not_allowed_sets_allow() {
        let coordinator = coordinator(Arc::new(MemorySink::new()), Environment::Testing);
        let response = coordinator.dispatch(&Connection::detached(), Request::new(Method::Delete, "/items/1"));
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.get_header("Allow"), Some("GET"));
    }

    #[test]
    fn test_before_route_short_circuits() {
        let coordinator = coordinator(Arc::new(MemorySink::new()), Environment::Testing);
        let before = GUARDED_CALLS.load(Ordering::SeqCst);

        let denied = coordinator.dispatch(&Connection::detached(), Request::new(Method::Get, "/secret"));
        assert_eq!(denied.status, StatusCode::FOUND);
        assert_eq!(denied.get_header("Location"), Some("/login"));
        assert_eq!(GUARDED_CALLS.load(Ordering::SeqCst), before);

        let allowed = coordinator.dispatch(
            &Connection::detached(),
            Request::new(Method::Get, "/secret").header("Authorization", "Bearer t"),
        );
        assert_eq!(allowed.text_body().as_deref(), Some("secret ok"));
    }

    #[test]
    fn test_session_cookie_issued_on_first_write() {
        let coordinator = coordinator(Arc::new(MemorySink::new()), Environment::Testing);
        let response = coordinator.dispatch(&Connection::detached(), Request::new(Method::Post, "/visit"));
        let cookie = response.get_header("Set-Cookie").unwrap();
        assert!(cookie.starts_with("sid="));

        let id = cookie.trim_start_matches("sid=").split(';').next().unwrap();
        let again = coordinator.dispatch(
            &Connection::detached(),
            Request::new(Method::Post, "/visit").header("Cookie", format!("sid={}", id)),
        );
        assert!(again.get_header("Set-Cookie").is_none());
    }

    #[test]
    fn test_failure_is_contained_and_logged_once() {
        let sink = Arc::new(MemorySink::new());
        let coordinator = coordinator(sink.clone(), Environment::Production);
        let response = coordinator.dispatch(&Connection::detached(), Request::new(Method::Get, "/boom"));

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.text_body().as_deref(), Some("<h1>Internal Server Error</h1>"));
        assert_eq!(sink.len(), 1);
        assert!(sink.records()[0].error.contains("database unreachable"));

        let next = coordinator.dispatch(&Connection::detached(), Request::new(Method::Get, "/items/7"));
        assert_eq!(next.status, StatusCode::OK);
    }

    #[test]
    fn test_connection_headers_are_merged() {
        let mut table = RouteTable::new();
        table
            .get(
                "/trace",
                Handler::function(HandlerSpec::named("trace").param("connection"), |mut args: Args| {
                    let connection: Connection = args.take("connection")?;
                    connection.push_header("X-Trace", "abc");
                    Ok::<_, anyhow::Error>(Response::ok())
                }),
            )
            .unwrap();
        let coordinator = Coordinator::new(table.freeze(), DispatchConfig::default());
        let response = coordinator.dispatch(&Connection::detached(), Request::new(Method::Get, "/trace"));
        assert_eq!(response.get_header("X-Trace"), Some("abc"));
    }

    #[test]
    fn test_session_cookie_keeps_handler_cookies() {
        let mut table = RouteTable::new();
        table
            .post(
                "/login",
                Handler::function(
                    HandlerSpec::named("login").param("session").param("connection"),
                    |mut args: Args| {
                        let session: Session = args.take("session")?;
                        let connection: Connection = args.take("connection")?;
                        session.set("user", "ada")?;
                        connection.push_header("Set-Cookie", "theme=dark; Path=/");
                        Ok::<_, anyhow::Error>(Response::ok().header("Set-Cookie", "remember=1; Path=/"))
                    },
                ),
            )
            .unwrap();
        let coordinator = Coordinator::new(table.freeze(), DispatchConfig::default());
        let response = coordinator.dispatch(&Connection::detached(), Request::new(Method::Post, "/login"));

        let cookies: Vec<_> = response.get_all("Set-Cookie").collect();
        assert_eq!(cookies.len(), 3);
        assert_eq!(cookies[0], "remember=1; Path=/");
        assert_eq!(cookies[1], "theme=dark; Path=/");
        assert!(cookies[2].starts_with("sid=") && cookies[2].ends_with("; Path=/; HttpOnly"));
    }
}
