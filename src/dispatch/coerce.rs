//! Turning handler return values into responses.

use crate::error::DispatchError;
use crate::handler::Reply;
use crate::http::Response;
use serde_json::Value;

/// Normalize a handler's return value.
///
/// Responses pass through untouched. Structured values become a JSON
/// response; a value that serializes to a bare scalar has no response
/// meaning and is rejected as [`DispatchError::Misuse`].
pub fn coerce(reply: Reply) -> Result<Response, DispatchError> {
    match reply {
        Reply::Response(response) => Ok(response),
        Reply::Value(value) => json_response(value, "serde_json::Value"),
        Reply::Object(object) => {
            let value = object.to_json_value()?;
            json_response(value, object.type_name())
        }
    }
}

fn json_response(value: Value, type_name: &str) -> Result<Response, DispatchError> {
    match value {
        Value::Object(_) | Value::Array(_) => Ok(Response::json(&value)?),
        scalar => Err(DispatchError::Misuse(format!(
            "{} is the scalar {}, return a response or structured data",
            type_name, scalar
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Json;
    use crate::handler::IntoReply;
    use crate::http::StatusCode;
    use serde::Serialize;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_response_passes_through() {
        let original = Response::new(StatusCode(201))
            .header("X-Id", "9")
            .body(vec![0u8, 159, 146, 150]);
        let coerced = coerce(Reply::Response(original.clone())).unwrap();
        assert_eq!(coerced, original);
    }

    #[test]
    fn test_mapping_becomes_json() {
        let response = coerce(Reply::Value(json!({"ok": true}))).unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.get_header("Content-Type"), Some("application/json"));
        let body: serde_json::Map<String, Value> = response.json_body().unwrap().unwrap();
        assert_eq!(Value::Object(body), json!({"ok": true}));
    }

    #[test]
    fn test_list_and_object_become_json() {
        #[derive(Serialize)]
        struct Page {
            items: Vec<u32>,
        }
        let list = coerce(Reply::Value(json!([1, 2]))).unwrap();
        assert_eq!(list.text_body().as_deref(), Some("[1,2]"));

        let page = coerce(Json(Page { items: vec![3] }).into_reply().unwrap()).unwrap();
        assert_eq!(page.text_body().as_deref(), Some(r#"{"items":[3]}"#));

        let empty = coerce(Json(HashMap::<String, u8>::new()).into_reply().unwrap()).unwrap();
        assert_eq!(empty.text_body().as_deref(), Some("{}"));
    }

    #[test]
    fn test_scalars_are_misuse() {
        assert!(matches!(coerce(Reply::Value(json!(42))), Err(DispatchError::Misuse(_))));
        assert!(matches!(coerce(Reply::Value(Value::Null)), Err(DispatchError::Misuse(_))));
        let err = coerce(Json("plain").into_reply().unwrap()).unwrap_err();
        assert!(err.to_string().contains("&str"));
    }

    #[test]
    fn test_serialization_failure() {
        let mut bad = HashMap::new();
        bad.insert((1u8, 2u8), "tuple keys are not strings");
        let err = coerce(Json(bad).into_reply().unwrap()).unwrap_err();
        assert!(matches!(err, DispatchError::Serialization(_)));
    }
}
