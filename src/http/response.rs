//! Outbound HTTP response value.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// HTTP status code. Constants cover the codes the dispatch core answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const OK: StatusCode = StatusCode(200);
    pub const FOUND: StatusCode = StatusCode(302);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const METHOD_NOT_ALLOWED: StatusCode = StatusCode(405);
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);
    pub const NOT_IMPLEMENTED: StatusCode = StatusCode(501);
}

impl Default for StatusCode {
    fn default() -> Self {
        StatusCode::OK
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        StatusCode(code)
    }
}

/// An outbound HTTP response.
///
/// Headers keep insertion order and may repeat (`Set-Cookie`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Bytes>,
}

impl Response {
    pub fn new(status: impl Into<StatusCode>) -> Self {
        Self {
            status: status.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    /// Serialize `data` as an `application/json` body.
    pub fn json<T: Serialize + ?Sized>(data: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(data)?;
        Ok(Self::ok().header("Content-Type", "application/json").body(body))
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::ok().header("Content-Type", "text/plain").body(content.into())
    }

    pub fn html(status: impl Into<StatusCode>, content: impl Into<String>) -> Self {
        Self::new(status)
            .header("Content-Type", "text/html; charset=utf-8")
            .body(content.into())
    }

    /// A plain-text response carrying `message`.
    pub fn error(status: impl Into<StatusCode>, message: impl Into<String>) -> Self {
        Self::new(status)
            .header("Content-Type", "text/plain")
            .body(message.into())
    }

    pub fn redirect(location: impl Into<String>, status: impl Into<StatusCode>) -> Self {
        Self::new(status).header("Location", location)
    }

    /// Set a header, replacing any existing values of the same name.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&key));
        self.headers.push((key, value.into()));
        self
    }

    /// Add a header value, keeping existing values of the same name.
    pub fn append_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.push((key.into(), value.into()));
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// First value of a header, case-insensitively.
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.get_all(key).next()
    }

    /// Every value of a header, in order.
    pub fn get_all<'a, 'k>(&'a self, key: &'k str) -> impl Iterator<Item = &'a str> + use<'a, 'k> {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn text_body(&self) -> Option<String> {
        self.body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).to_string())
    }

    pub fn json_body<T: serde::de::DeserializeOwned>(
        &self,
    ) -> Option<Result<T, serde_json::Error>> {
        self.body.as_ref().map(|b| serde_json::from_slice(b))
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_response() {
        let response = Response::json(&serde_json::json!({"ok": true})).unwrap();
        assert_eq!(response.get_header("content-type"), Some("application/json"));
        let body: serde_json::Value = response.json_body().unwrap().unwrap();
        assert_eq!(body, serde_json::json!({"ok": true}));
    }

    #[test]
    fn test_redirect() {
        let response = Response::redirect("/login", StatusCode::FOUND);
        assert_eq!(response.status, StatusCode::FOUND);
        assert_eq!(response.get_header("Location"), Some("/login"));
        assert!(response.body.is_none());
    }

    #[test]
    fn test_header_replaces_and_append_keeps() {
        let mut response = Response::text("x").header("content-type", "text/csv");
        assert_eq!(response.get_all("Content-Type").collect::<Vec<_>>(), vec!["text/csv"]);

        response.append_header("Set-Cookie", "a=1");
        response.append_header("Set-Cookie", "b=2");
        assert_eq!(response.get_all("set-cookie").collect::<Vec<_>>(), vec!["a=1", "b=2"]);
        assert_eq!(response.get_header("Set-Cookie"), Some("a=1"));
    }
}
