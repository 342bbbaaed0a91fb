//! Declared handler metadata.
//!
//! A [`HandlerSpec`] lists a handler's parameter names in call order. It is
//! normally generated at compile time by `#[handler]` / `#[routes]`, and can
//! also be built by hand for closures.

use serde::Serialize;
use std::borrow::Cow;

/// Fallback used when a parameter cannot be resolved from the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DefaultValue {
    /// Bind "no value" (an `Option` parameter receives `None`).
    Null,
    /// Bind this text, converted like a path variable would be.
    Text(Cow<'static, str>),
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamDecl {
    pub name: Cow<'static, str>,
    pub default: Option<DefaultValue>,
}

impl ParamDecl {
    /// A parameter that must be resolved from the request.
    pub const fn required(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            default: None,
        }
    }

    /// A parameter that binds `None` when unresolved.
    pub const fn optional(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            default: Some(DefaultValue::Null),
        }
    }

    /// A parameter with a textual default.
    pub const fn with_default(name: &'static str, value: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            default: Some(DefaultValue::Text(Cow::Borrowed(value))),
        }
    }

    pub fn is_optional(&self) -> bool {
        self.default.is_some()
    }
}

/// Stable identity plus declared parameter list of a handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerSpec {
    /// Stable identity, e.g. `crate::items::show` or `crate::Items::show`.
    pub id: Cow<'static, str>,
    /// Parameters in call order.
    pub params: Cow<'static, [ParamDecl]>,
}

impl HandlerSpec {
    /// Create a static handler spec.
    pub const fn new(id: &'static str, params: &'static [ParamDecl]) -> Self {
        Self {
            id: Cow::Borrowed(id),
            params: Cow::Borrowed(params),
        }
    }

    /// Start a spec built at runtime.
    pub fn named(id: impl Into<Cow<'static, str>>) -> Self {
        Self {
            id: id.into(),
            params: Cow::Owned(Vec::new()),
        }
    }

    /// Append a required parameter.
    pub fn param(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.push(name.into(), None);
        self
    }

    /// Append a parameter that binds `None` when unresolved.
    pub fn optional(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.push(name.into(), Some(DefaultValue::Null));
        self
    }

    /// Append a parameter with a textual default.
    pub fn param_or(
        mut self,
        name: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
    ) -> Self {
        self.push(name.into(), Some(DefaultValue::Text(value.into())));
        self
    }

    fn push(&mut self, name: Cow<'static, str>, default: Option<DefaultValue>) {
        self.params.to_mut().push(ParamDecl { name, default });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static LIST_PARAMS: [ParamDecl; 2] =
        [ParamDecl::required("get"), ParamDecl::with_default("page", "1")];
    static LIST: HandlerSpec = HandlerSpec::new("items::list", &LIST_PARAMS);

    #[test]
    fn test_static_spec() {
        assert_eq!(LIST.id, "items::list");
        assert_eq!(LIST.params.len(), 2);
        assert!(!LIST.params[0].is_optional());
        assert_eq!(
            LIST.params[1].default,
            Some(DefaultValue::Text(Cow::Borrowed("1")))
        );
    }

    #[test]
    fn test_runtime_spec_matches_static() {
        let built = HandlerSpec::named("items::list").param("get").param_or("page", "1");
        assert_eq!(built, LIST);
    }

    #[test]
    fn test_static_spec_clones_borrowed() {
        let spec = LIST.clone();
        assert!(matches!(spec.params, Cow::Borrowed(_)));
        assert!(std::ptr::eq(spec.params.as_ref(), &LIST_PARAMS[..]));
    }

    #[test]
    fn test_optional_param() {
        let spec = HandlerSpec::named("x").optional("filter");
        assert_eq!(spec.params[0].default, Some(DefaultValue::Null));
    }
}
