//! Binding plans: where each declared handler parameter comes from.
//!
//! A plan is a pure function of the handler's [`HandlerSpec`], computed on
//! first dispatch and cached by handler id for the worker's lifetime.

use crate::handler::spec::{DefaultValue, HandlerSpec};
use dashmap::DashMap;
use serde::Serialize;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::debug;

/// Where a parameter's value is read from on each call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Source {
    Connection,
    Request,
    Session,
    Query,
    Post,
    Files,
    /// A path variable of the same name, falling back to the declared default.
    PathVariable,
}

impl Source {
    /// Source for a parameter name. The recognized names are fixed.
    pub fn for_name(name: &str) -> Self {
        match name {
            "connection" => Source::Connection,
            "request" => Source::Request,
            "session" => Source::Session,
            "get" => Source::Query,
            "post" => Source::Post,
            "files" => Source::Files,
            _ => Source::PathVariable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Binding {
    pub name: Cow<'static, str>,
    pub source: Source,
    pub optional: bool,
    pub default: Option<DefaultValue>,
}

/// Ordered bindings for one handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingPlan {
    pub handler: String,
    pub bindings: Vec<Binding>,
}

impl BindingPlan {
    pub fn compile(spec: &HandlerSpec) -> Self {
        let bindings = spec
            .params
            .iter()
            .map(|param| Binding {
                name: param.name.clone(),
                source: Source::for_name(&param.name),
                optional: param.is_optional(),
                default: param.default.clone(),
            })
            .collect();
        Self {
            handler: spec.id.to_string(),
            bindings,
        }
    }
}

/// Per-worker cache of binding plans keyed by handler id.
#[derive(Debug, Default)]
pub struct ParameterResolver {
    plans: DashMap<String, Arc<BindingPlan>>,
}

impl ParameterResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plan for `spec`, computing it at most once per handler id.
    pub fn plan_for(&self, spec: &HandlerSpec) -> Arc<BindingPlan> {
        if let Some(plan) = self.plans.get(spec.id.as_ref()) {
            return plan.value().clone();
        }
        self.plans
            .entry(spec.id.to_string())
            .or_insert_with(|| {
                debug!("compiled binding plan for {}", spec.id);
                Arc::new(BindingPlan::compile(spec))
            })
            .value()
            .clone()
    }

    /// Number of cached plans.
    pub fn cached(&self) -> usize {
        self.plans.len()
    }
}
