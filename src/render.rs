//! Template rendering capability.
//!
//! The dispatch core never renders on its own; controllers reach the
//! renderer through [`ControllerBase::render`](crate::handler::ControllerBase::render).

use anyhow::anyhow;
use serde_json::{Map, Value};

/// Turns a template path and its variables into a response body.
pub trait Renderer: Send + Sync {
    fn render(&self, template: &str, vars: &Map<String, Value>) -> anyhow::Result<String>;
}

impl<F> Renderer for F
where
    F: Fn(&str, &Map<String, Value>) -> anyhow::Result<String> + Send + Sync,
{
    fn render(&self, template: &str, vars: &Map<String, Value>) -> anyhow::Result<String> {
        self(template, vars)
    }
}

/// Used when the application configures no renderer; every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRenderer;

impl Renderer for NoRenderer {
    fn render(&self, template: &str, _vars: &Map<String, Value>) -> anyhow::Result<String> {
        Err(anyhow!("no renderer configured, cannot render {}", template))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_renderer_fails() {
        let err = NoRenderer.render("/home/index", &Map::new()).unwrap_err();
        assert!(err.to_string().contains("/home/index"));
    }

    #[test]
    fn test_closure_renderer() {
        let renderer = |template: &str, vars: &Map<String, Value>| -> anyhow::Result<String> {
            Ok(format!("{}:{}", template, vars.len()))
        };
        let mut vars = Map::new();
        vars.insert("a".into(), Value::Bool(true));
        assert_eq!(Renderer::render(&renderer, "/t", &vars).unwrap(), "/t:1");
    }
}
