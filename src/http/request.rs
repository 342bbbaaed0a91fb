//! Inbound HTTP request value.

use crate::http::method::Method;
use crate::http::multipart;
use crate::http::params::{Files, Params};
use bytes::Bytes;
use serde::Serialize;
use std::collections::HashMap;

/// An inbound request as delivered to the dispatch core.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// HTTP method.
    pub method: Method,
    /// Raw request target, query string included.
    pub uri: String,
    /// HTTP headers, names lower-cased.
    pub headers: HashMap<String, String>,
    /// Request body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Bytes>,
}

impl Request {
    /// Create a new request.
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: HashMap::new(),
            body: None,
        }
    }

    /// Add a header to the request.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(key.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Set the request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set a url-encoded form body and its content type.
    pub fn form(self, encoded: impl Into<String>) -> Self {
        self.header("Content-Type", "application/x-www-form-urlencoded")
            .body(encoded.into())
    }

    /// Get a header value, case-insensitively.
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The path part of the target, still percent-encoded.
    pub fn path(&self) -> &str {
        self.uri.split_once('?').map_or(self.uri.as_str(), |(path, _)| path)
    }

    /// The query string, without the leading `?`.
    pub fn query_string(&self) -> Option<&str> {
        self.uri.split_once('?').map(|(_, query)| query)
    }

    /// Decoded query parameters.
    pub fn query(&self) -> Params {
        self.query_string().map(Params::parse).unwrap_or_default()
    }

    /// Decoded form fields from a url-encoded or multipart body.
    pub fn post(&self) -> Params {
        let Some(body) = &self.body else {
            return Params::new();
        };
        let content_type = self.get_header("content-type").unwrap_or_default();
        if let Some(boundary) = multipart::boundary(content_type) {
            return multipart::parse(body, boundary).0;
        }
        if mime(content_type).eq_ignore_ascii_case("application/x-www-form-urlencoded") {
            return Params::parse(&String::from_utf8_lossy(body));
        }
        Params::new()
    }

    /// Uploaded files from a multipart body.
    pub fn files(&self) -> Files {
        let content_type = self.get_header("content-type").unwrap_or_default();
        match (&self.body, multipart::boundary(content_type)) {
            (Some(body), Some(boundary)) => Files::new(multipart::parse(body, boundary).1),
            _ => Files::default(),
        }
    }

    /// Value of a cookie sent in the `Cookie` header.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.get_header("cookie")?
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.trim_end_matches(';'))
    }

    /// Get the body as text if present.
    pub fn text(&self) -> Option<String> {
        self.body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).to_string())
    }

    /// Parse the body as JSON if present.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Option<Result<T, serde_json::Error>> {
        self.body
            .as_ref()
            .map(|b| serde_json::from_slice(b))
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new(Method::Get, "/")
    }
}

fn mime(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or_default().trim()
}
