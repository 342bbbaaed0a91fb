//! Per-request controller instances and the services they get.

use crate::handler::reply::Flow;
use crate::http::{Connection, Request, Response, StatusCode};
use crate::render::{NoRenderer, Renderer};
use crate::routing::split_words;
use crate::runtime::Environment;
use crate::session::Session;
use anyhow::{anyhow, bail};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

const SEND_FILE_PREFIX: &str = "/secure";

/// A type whose methods handle requests.
///
/// One instance is constructed per matched request and dropped with it.
pub trait Controller: Sized + Send + 'static {
    fn new(base: ControllerBase) -> Self;

    /// Runs before every routed method of this controller. Returning
    /// [`Flow::Respond`] answers the request without calling the method.
    fn before_route(&mut self) -> anyhow::Result<Flow> {
        Ok(Flow::Continue)
    }

    /// Short type name, used for derived route prefixes and template paths.
    fn name() -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }
}

/// Request-local scratch values, merged into template variables on render.
#[derive(Debug, Clone, Default)]
pub struct Locals(Map<String, Value>);

impl Locals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Serialize) -> Result<(), serde_json::Error> {
        self.0.insert(key.into(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Services handed to a controller when it is constructed.
///
/// Scratch state lives in [`ControllerBase::locals`], session-backed state
/// in [`ControllerBase::session`].
#[derive(Clone)]
pub struct ControllerBase {
    connection: Connection,
    request: Arc<Request>,
    controller: &'static str,
    method: String,
    session: Session,
    renderer: Arc<dyn Renderer>,
    environment: Environment,
    locals: Locals,
}

impl ControllerBase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        connection: Connection,
        request: Arc<Request>,
        controller: &'static str,
        method: impl Into<String>,
        session: Session,
        renderer: Arc<dyn Renderer>,
        environment: Environment,
    ) -> Self {
        Self {
            connection,
            request,
            controller,
            method: method.into(),
            session,
            renderer,
            environment,
            locals: Locals::new(),
        }
    }

    /// A base over a default request, for tests and tooling.
    pub fn detached() -> Self {
        Self::new(
            Connection::detached(),
            Arc::new(Request::default()),
            "Detached",
            "",
            Session::detached(),
            Arc::new(NoRenderer),
            Environment::Testing,
        )
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Name of the controller type.
    pub fn controller(&self) -> &'static str {
        self.controller
    }

    /// Name of the routed method.
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn locals(&self) -> &Locals {
        &self.locals
    }

    pub fn locals_mut(&mut self) -> &mut Locals {
        &mut self.locals
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Move session data to a fresh id, e.g. right after login.
    pub fn regenerate_session(&self) -> anyhow::Result<()> {
        self.session.regenerate()?;
        Ok(())
    }

    pub fn text(&self, text: impl Into<String>) -> Response {
        Response::text(text)
    }

    pub fn json<T: Serialize + ?Sized>(&self, value: &T) -> Result<Response, serde_json::Error> {
        Response::json(value)
    }

    pub fn json_with_status<T: Serialize + ?Sized>(
        &self,
        value: &T,
        status: impl Into<StatusCode>,
    ) -> Result<Response, serde_json::Error> {
        let mut response = Response::json(value)?;
        response.status = status.into();
        Ok(response)
    }

    pub fn redirect(&self, location: impl Into<String>) -> Response {
        Response::redirect(location, StatusCode::FOUND)
    }

    pub fn send_blob(&self, data: impl Into<Bytes>) -> Response {
        Response::ok().body(data)
    }

    /// Hand a file under the `/secure` internal location to the front proxy.
    pub fn send_file(&self, path: &str) -> Response {
        self.send_file_under(path, SEND_FILE_PREFIX)
    }

    pub fn send_file_under(&self, path: &str, prefix: &str) -> Response {
        Response::ok().header(
            "X-Accel-Redirect",
            format!("{}/{}", prefix, path.trim_start_matches('/')),
        )
    }

    pub fn not_found(&self) -> Response {
        Response::html(StatusCode::NOT_FOUND, "<h1>Not Found</h1>")
    }

    pub fn is_ajax(&self) -> bool {
        self.request.get_header("X-Requested-With") == Some("XMLHttpRequest")
    }

    /// Client address as reported by the front proxy, else the socket peer.
    pub fn remote_ip(&self) -> Option<String> {
        ["X-Real-IP", "X-Forwarded-For"]
            .iter()
            .find_map(|h| self.request.get_header(h).filter(|v| !v.is_empty()))
            .map(str::to_string)
            .or_else(|| self.connection.remote_addr().map(|a| a.ip().to_string()))
    }

    /// First segment of the request path.
    pub fn prefix(&self) -> Option<&str> {
        self.request.path().split('/').nth(1).filter(|s| !s.is_empty())
    }

    /// Resolve a template name: absolute names are kept, others live under
    /// the controller's directory (`UserProfile` renders from `/user/profile/`).
    pub fn template_path(&self, template: &str) -> String {
        if template.starts_with('/') {
            return template.to_string();
        }
        let dir = split_words(self.controller).join("/").to_lowercase();
        format!("/{}/{}", dir, template)
    }

    /// Render `template` with the locals, `vars` (an object or null) and an
    /// `app` entry describing the current route.
    pub fn render(&mut self, template: &str, vars: Value) -> anyhow::Result<Response> {
        let vars = match vars {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => bail!("template variables must be an object, got {}", other),
        };

        let app = serde_json::json!({
            "controller": self.controller,
            "method": self.method,
            "prefix": self.prefix(),
            "path": self.request.path(),
        });
        self.locals.insert("app", app);

        if self.environment.is_development() {
            let conflicts: Vec<&str> = vars
                .keys()
                .filter(|k| self.locals.contains(k))
                .map(String::as_str)
                .collect();
            if !conflicts.is_empty() {
                return Err(anyhow!("conflicting template variables: {}", conflicts.join(", ")));
            }
        }

        let mut merged = self.locals.as_map().clone();
        merged.extend(vars);
        let path = self.template_path(template);
        let body = self.renderer.render(&path, &merged)?;
        Ok(Response::html(StatusCode::OK, body))
    }
}

impl std::fmt::Debug for ControllerBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerBase")
            .field("controller", &self.controller)
            .field("method", &self.method)
            .field("uri", &self.request.uri)
            .field("locals", &self.locals)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;
    use serde_json::json;

    fn base(request: Request, environment: Environment) -> ControllerBase {
        let renderer = |path: &str, vars: &Map<String, Value>| -> anyhow::Result<String> {
            Ok(format!("{} {}", path, Value::Object(vars.clone())))
        };
        ControllerBase::new(
            Connection::new(Some("10.0.0.9:5123".parse().unwrap()), None),
            Arc::new(request),
            "UserProfile",
            "edit",
            Session::detached(),
            Arc::new(renderer),
            environment,
        )
    }

    #[test]
    fn test_template_path() {
        let base = base(Request::default(), Environment::Testing);
        assert_eq!(base.template_path("edit"), "/user/profile/edit");
        assert_eq!(base.template_path("/shared/layout"), "/shared/layout");
    }

    #[test]
    fn test_render_merges_locals_and_app() {
        let mut base = base(Request::new(Method::Get, "/profile/7?tab=1"), Environment::Production);
        base.locals_mut().set("title", "Edit").unwrap();
        let response = base.render("edit", json!({"id": 7})).unwrap();

        let body = response.text_body().unwrap();
        let (path, vars) = body.split_once(' ').unwrap();
        assert_eq!(path, "/user/profile/edit");
        let vars: Value = serde_json::from_str(vars).unwrap();
        assert_eq!(vars["title"], "Edit");
        assert_eq!(vars["id"], 7);
        assert_eq!(vars["app"]["controller"], "UserProfile");
        assert_eq!(vars["app"]["method"], "edit");
        assert_eq!(vars["app"]["prefix"], "profile");
        assert_eq!(vars["app"]["path"], "/profile/7");
    }

    #[test]
    fn test_render_conflict_only_in_development() {
        let mut dev = base(Request::default(), Environment::Development);
        dev.locals_mut().set("title", "a").unwrap();
        let err = dev.render("x", json!({"title": "b"})).unwrap_err();
        assert!(err.to_string().contains("title"));

        let mut prod = base(Request::default(), Environment::Production);
        prod.locals_mut().set("title", "a").unwrap();
        assert!(prod.render("x", json!({"title": "b"})).is_ok());
    }

    #[test]
    fn test_render_rejects_scalar_vars() {
        let mut base = base(Request::default(), Environment::Testing);
        assert!(base.render("x", json!(3)).is_err());
    }

    #[test]
    fn test_locals_insert_from_literal_key() {
        let mut base = base(Request::default(), Environment::Testing);
        base.locals_mut().insert("title", json!("Items"));
        assert_eq!(base.locals().get_as::<String>("title").as_deref(), Some("Items"));
        assert_eq!(base.locals().len(), 1);
    }

    #[test]
    fn test_remote_ip_precedence() {
        let plain = base(Request::default(), Environment::Testing);
        assert_eq!(plain.remote_ip().as_deref(), Some("10.0.0.9"));

        let proxied = base(
            Request::default()
                .header("X-Forwarded-For", "203.0.113.5")
                .header("X-Real-IP", "198.51.100.1"),
            Environment::Testing,
        );
        assert_eq!(proxied.remote_ip().as_deref(), Some("198.51.100.1"));
    }

    #[test]
    fn test_response_helpers() {
        let base = base(Request::default().header("X-Requested-With", "XMLHttpRequest"), Environment::Testing);
        assert!(base.is_ajax());
        assert_eq!(
            base.send_file("/reports/q3.pdf").get_header("X-Accel-Redirect"),
            Some("/secure/reports/q3.pdf")
        );
        assert_eq!(base.redirect("/login").status, StatusCode::FOUND);
        assert_eq!(base.not_found().status, StatusCode::NOT_FOUND);
        let created = base.json_with_status(&json!({"id": 1}), StatusCode(201)).unwrap();
        assert_eq!(created.status, StatusCode(201));
        assert_eq!(base.prefix(), None);
    }

    #[test]
    fn test_locals() {
        let mut locals = Locals::new();
        locals.set("count", 3).unwrap();
        assert_eq!(locals.get_as::<u32>("count"), Some(3));
        assert!(locals.contains("count"));
        assert_eq!(locals.remove("count"), Some(json!(3)));
        assert!(locals.is_empty());
    }
}
