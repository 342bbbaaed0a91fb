//! Decoded query and form parameters, and uploaded file metadata.

use bytes::Bytes;
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Decoded `key=value` pairs. A repeated key keeps its last value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, String>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an `application/x-www-form-urlencoded` string.
    pub fn parse(encoded: &str) -> Self {
        let mut params = Params::new();
        for pair in encoded.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = decode_component(key);
            if key.is_empty() {
                continue;
            }
            params.insert(key, decode_component(value));
        }
        params
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Get a value parsed into `T`; `None` when absent or unparseable.
    pub fn get_as<T: FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.parse().ok())
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

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// Form decoding: `+` is a space, then percent-decoding. Invalid UTF-8 is replaced.
fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    String::from_utf8_lossy(&urlencoding::decode_binary(spaced.as_bytes())).into_owned()
}

/// A file part of a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedFile {
    /// Form field name.
    pub field: String,
    /// Client-supplied file name.
    pub filename: String,
    /// Declared content type of the part.
    pub content_type: Option<String>,
    /// Size in bytes.
    pub size: usize,
    /// Raw contents.
    #[serde(skip)]
    pub data: Bytes,
}

/// Uploaded files in the order they appeared in the body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Files(Vec<UploadedFile>);

impl Files {
    pub fn new(files: Vec<UploadedFile>) -> Self {
        Self(files)
    }

    /// First file uploaded under `field`.
    pub fn get(&self, field: &str) -> Option<&UploadedFile> {
        self.0.iter().find(|f| f.field == field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UploadedFile> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_form() {
        let params = Params::parse("name=J%C3%BCrgen+Smith&age=42&flag&=skipped");
        assert_eq!(params.get("name"), Some("Jürgen Smith"));
        assert_eq!(params.get_as::<u32>("age"), Some(42));
        assert_eq!(params.get("flag"), Some(""));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_repeated_key_keeps_last() {
        let params = Params::parse("limit=10&limit=20");
        assert_eq!(params.get("limit"), Some("20"));
    }

    #[test]
    fn test_files_lookup() {
        let files = Files::new(vec![UploadedFile {
            field: "avatar".into(),
            filename: "me.png".into(),
            content_type: Some("image/png".into()),
            size: 3,
            data: Bytes::from_static(b"png"),
        }]);
        assert_eq!(files.get("avatar").map(|f| f.size), Some(3));
        assert!(files.get("other").is_none());
    }
}
