//! Minimal `multipart/form-data` body splitting.

use crate::http::params::{Params, UploadedFile};
use bytes::Bytes;

/// Extract the `boundary` parameter of a multipart content type.
pub(crate) fn boundary(content_type: &str) -> Option<&str> {
    let mut parts = content_type.split(';');
    let mime = parts.next()?.trim();
    if !mime.eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }
    parts
        .filter_map(|p| p.trim().split_once('='))
        .find(|(k, _)| k.eq_ignore_ascii_case("boundary"))
        .map(|(_, v)| v.trim_matches('"'))
        .filter(|v| !v.is_empty())
}

/// Split a multipart body into text fields and file parts.
///
/// Malformed trailing data is ignored; whatever parts parsed cleanly are kept.
pub(crate) fn parse(body: &Bytes, boundary: &str) -> (Params, Vec<UploadedFile>) {
    let mut fields = Params::new();
    let mut files = Vec::new();

    let delimiter = format!("--{}", boundary);
    let next_delimiter = format!("\r\n--{}", boundary);

    let Some(mut pos) = find(body, delimiter.as_bytes(), 0) else {
        return (fields, files);
    };

    loop {
        pos += delimiter.len();
        if body[pos..].starts_with(b"--") {
            break;
        }
        if body[pos..].starts_with(b"\r\n") {
            pos += 2;
        }

        let Some(header_end) = find(body, b"\r\n\r\n", pos) else {
            break;
        };
        let headers = String::from_utf8_lossy(&body[pos..header_end]);
        let content_start = header_end + 4;
        let Some(content_end) = find(body, next_delimiter.as_bytes(), content_start) else {
            break;
        };

        let part = Part::from_headers(&headers);
        if let Some(name) = part.name {
            let data = body.slice(content_start..content_end);
            match part.filename {
                Some(filename) => files.push(UploadedFile {
                    field: name,
                    filename,
                    content_type: part.content_type,
                    size: data.len(),
                    data,
                }),
                None => fields.insert(name, String::from_utf8_lossy(&data).into_owned()),
            }
        }

        // Step over the CRLF so `pos` sits on the next delimiter.
        pos = content_end + 2;
    }

    (fields, files)
}

#[derive(Default)]
struct Part {
    name: Option<String>,
    filename: Option<String>,
    content_type: Option<String>,
}

impl Part {
    fn from_headers(headers: &str) -> Self {
        let mut part = Part::default();
        for line in headers.split("\r\n") {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim();
            if key.eq_ignore_ascii_case("content-disposition") {
                for attr in value.split(';').skip(1) {
                    if let Some((k, v)) = attr.trim().split_once('=') {
                        let v = v.trim().trim_matches('"').to_string();
                        match k.trim() {
                            "name" => part.name = Some(v),
                            "filename" => part.filename = Some(v),
                            _ => {}
                        }
                    }
                }
            } else if key.eq_ignore_ascii_case("content-type") {
                part.content_type = Some(value.trim().to_string());
            }
        }
        part
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}
