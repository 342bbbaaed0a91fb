//! Resolved handler arguments.

use crate::error::InputError;
use crate::http::{Connection, Files, Params, Request};
use crate::session::Session;
use std::borrow::Cow;
use std::sync::Arc;

/// One resolved argument value.
#[derive(Debug, Clone)]
pub enum Arg {
    Connection(Connection),
    Request(Arc<Request>),
    Session(Session),
    Query(Params),
    Post(Params),
    Files(Files),
    /// Path variable or textual default.
    Text(String),
    /// Declared default of "no value".
    Null,
}

/// Arguments for one call, in declaration order.
#[derive(Debug, Default)]
pub struct Args {
    entries: Vec<(Cow<'static, str>, Arg)>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<Cow<'static, str>>, arg: Arg) {
        self.entries.push((name.into(), arg));
    }

    pub fn get(&self, name: &str) -> Option<&Arg> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, a)| a)
    }

    /// Remove the argument bound to `name` and convert it.
    pub fn take<T: FromArg>(&mut self, name: &str) -> Result<T, InputError> {
        match self.entries.iter().position(|(n, _)| n == name) {
            Some(pos) => {
                let (_, arg) = self.entries.remove(pos);
                T::from_arg(name, arg)
            }
            None => T::from_absent(name),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_ref())
    }
}

/// Conversion from a resolved [`Arg`] into a handler parameter type.
pub trait FromArg: Sized {
    fn from_arg(name: &str, arg: Arg) -> Result<Self, InputError>;

    /// Called when nothing was bound under `name`.
    fn from_absent(name: &str) -> Result<Self, InputError> {
        Err(InputError::Missing(name.to_string()))
    }
}

fn mismatch(name: &str, expected: &'static str) -> InputError {
    InputError::Mismatch {
        name: name.to_string(),
        expected,
    }
}

impl FromArg for Arg {
    fn from_arg(_name: &str, arg: Arg) -> Result<Self, InputError> {
        Ok(arg)
    }
}

impl FromArg for Connection {
    fn from_arg(name: &str, arg: Arg) -> Result<Self, InputError> {
        match arg {
            Arg::Connection(c) => Ok(c),
            _ => Err(mismatch(name, "a connection")),
        }
    }
}

impl FromArg for Arc<Request> {
    fn from_arg(name: &str, arg: Arg) -> Result<Self, InputError> {
        match arg {
            Arg::Request(r) => Ok(r),
            _ => Err(mismatch(name, "the request")),
        }
    }
}

impl FromArg for Request {
    fn from_arg(name: &str, arg: Arg) -> Result<Self, InputError> {
        Arc::<Request>::from_arg(name, arg).map(Arc::unwrap_or_clone)
    }
}

impl FromArg for Session {
    fn from_arg(name: &str, arg: Arg) -> Result<Self, InputError> {
        match arg {
            Arg::Session(s) => Ok(s),
            _ => Err(mismatch(name, "the session")),
        }
    }
}

impl FromArg for Params {
    fn from_arg(name: &str, arg: Arg) -> Result<Self, InputError> {
        match arg {
            Arg::Query(p) | Arg::Post(p) => Ok(p),
            _ => Err(mismatch(name, "query or form parameters")),
        }
    }
}

impl FromArg for Files {
    fn from_arg(name: &str, arg: Arg) -> Result<Self, InputError> {
        match arg {
            Arg::Files(f) => Ok(f),
            _ => Err(mismatch(name, "uploaded files")),
        }
    }
}

impl FromArg for String {
    fn from_arg(name: &str, arg: Arg) -> Result<Self, InputError> {
        match arg {
            Arg::Text(s) => Ok(s),
            Arg::Null => Err(InputError::Missing(name.to_string())),
            _ => Err(mismatch(name, "text")),
        }
    }
}

impl<T: FromArg> FromArg for Option<T> {
    fn from_arg(name: &str, arg: Arg) -> Result<Self, InputError> {
        match arg {
            Arg::Null => Ok(None),
            arg => T::from_arg(name, arg).map(Some),
        }
    }

    fn from_absent(_name: &str) -> Result<Self, InputError> {
        Ok(None)
    }
}

macro_rules! from_text {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromArg for $ty {
                fn from_arg(name: &str, arg: Arg) -> Result<Self, InputError> {
                    let text = String::from_arg(name, arg)?;
                    text.parse::<$ty>().map_err(|e| InputError::Invalid {
                        name: name.to_string(),
                        value: text.clone(),
                        reason: e.to_string(),
                    })
                }
            }
        )*
    };
}

from_text!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char);

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Args {
        let mut args = Args::new();
        args.push("id", Arg::Text("42".into()));
        args.push("slug", Arg::Text("blue".into()));
        args.push("filter", Arg::Null);
        args.push("get", Arg::Query(Params::parse("a=1")));
        args
    }

    #[test]
    fn test_take_converts_text() {
        let mut args = args();
        let id: u64 = args.take("id").unwrap();
        let slug: String = args.take("slug").unwrap();
        assert_eq!(id, 42);
        assert_eq!(slug, "blue");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_invalid_number_is_input_error() {
        let mut args = args();
        let err = args.take::<u64>("slug").unwrap_err();
        assert!(matches!(err, InputError::Invalid { value, .. } if value == "blue"));
    }

    #[test]
    fn test_option_handles_null_and_absent() {
        let mut args = args();
        assert_eq!(args.take::<Option<String>>("filter").unwrap(), None);
        assert_eq!(args.take::<Option<u32>>("missing").unwrap(), None);
        assert_eq!(args.take::<Option<u32>>("id").unwrap(), Some(42));
    }

    #[test]
    fn test_absent_required_is_missing() {
        let mut args = args();
        assert_eq!(
            args.take::<String>("user_id").unwrap_err(),
            InputError::Missing("user_id".into())
        );
    }

    #[test]
    fn test_kind_mismatch() {
        let mut first = args();
        let err = first.take::<Session>("get").unwrap_err();
        assert!(matches!(err, InputError::Mismatch { .. }));
        let params: Params = args().take("get").unwrap();
        assert_eq!(params.get("a"), Some("1"));
    }
}
