//! Handler return values.

use crate::http::Response;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// A serializable object returned by a handler, encoded only at coercion time.
pub trait JsonBody: Send {
    fn to_json_value(&self) -> Result<Value, serde_json::Error>;

    fn type_name(&self) -> &'static str;
}

impl<T: Serialize + Send> JsonBody for T {
    fn to_json_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// What a handler produced, before coercion into a [`Response`].
pub enum Reply {
    /// A finished response, passed through unchanged.
    Response(Response),
    /// Structured data.
    Value(Value),
    /// Any other serializable object.
    Object(Box<dyn JsonBody>),
}

impl Reply {
    /// Wrap a serializable object.
    pub fn json<T: Serialize + Send + 'static>(value: T) -> Self {
        Reply::Object(Box::new(value))
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Response(r) => f.debug_tuple("Response").field(r).finish(),
            Reply::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Reply::Object(o) => f.debug_tuple("Object").field(&o.type_name()).finish(),
        }
    }
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Reply::Response(response)
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Value(value)
    }
}

/// Marks a serializable handler return value.
#[derive(Debug, Clone)]
pub struct Json<T>(pub T);

/// Conversion from a handler's return type.
pub trait IntoReply {
    fn into_reply(self) -> anyhow::Result<Reply>;
}

impl IntoReply for Reply {
    fn into_reply(self) -> anyhow::Result<Reply> {
        Ok(self)
    }
}

impl IntoReply for Response {
    fn into_reply(self) -> anyhow::Result<Reply> {
        Ok(Reply::Response(self))
    }
}

impl IntoReply for Value {
    fn into_reply(self) -> anyhow::Result<Reply> {
        Ok(Reply::Value(self))
    }
}

impl<T: Serialize + Send + 'static> IntoReply for Json<T> {
    fn into_reply(self) -> anyhow::Result<Reply> {
        Ok(Reply::json(self.0))
    }
}

impl<T, E> IntoReply for Result<T, E>
where
    T: IntoReply,
    E: Into<anyhow::Error>,
{
    fn into_reply(self) -> anyhow::Result<Reply> {
        self.map_err(Into::into)?.into_reply()
    }
}

/// Outcome of a pre-route hook.
#[derive(Debug)]
pub enum Flow {
    /// Proceed to the requested method.
    Continue,
    /// Skip the method and answer with this.
    Respond(Reply),
}

impl From<Response> for Flow {
    fn from(response: Response) -> Self {
        Flow::Respond(Reply::Response(response))
    }
}
