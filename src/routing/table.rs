//! Route table for mapping incoming requests to handlers.
//!
//! Routes are collected in a [`RouteTable`] at worker start, then frozen into
//! a [`CompiledRouteTable`]: one segment trie per HTTP method, so a lookup
//! walks the path once instead of scanning every route.

use crate::error::RouteError;
use crate::handler::Handler;
use crate::http::{Method, MethodSet};
use crate::routing::pattern::{PathVars, Pattern, Segment};
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, info};

/// A route entry that maps a method set and path pattern to a handler.
#[derive(Debug, Clone)]
pub struct Route {
    methods: MethodSet,
    pattern: Pattern,
    handler: Handler,
}

impl Route {
    pub fn methods(&self) -> MethodSet {
        self.methods
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }
}

/// Mutable route collection, consumed by [`RouteTable::freeze`].
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Create an empty route table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route. Registration order decides ties between overlapping patterns.
    pub fn register(
        &mut self,
        methods: impl Into<MethodSet>,
        pattern: &str,
        handler: impl Into<Handler>,
    ) -> Result<&mut Self, RouteError> {
        let methods = methods.into();
        if methods.is_empty() {
            return Err(RouteError::UnknownMethod(String::new()));
        }
        let pattern = Pattern::parse(pattern)?;
        let handler = handler.into();
        debug!("registered route: {} {} -> {}", methods, pattern, handler.id());
        self.routes.push(Route {
            methods,
            pattern,
            handler,
        });
        Ok(self)
    }

    /// Add a route from a `|`-separated method list, e.g. `"GET|POST"`.
    pub fn route(
        &mut self,
        methods: &str,
        pattern: &str,
        handler: impl Into<Handler>,
    ) -> Result<&mut Self, RouteError> {
        self.register(MethodSet::parse(methods)?, pattern, handler)
    }

    pub fn get(&mut self, pattern: &str, handler: impl Into<Handler>) -> Result<&mut Self, RouteError> {
        self.register(Method::Get, pattern, handler)
    }

    pub fn post(&mut self, pattern: &str, handler: impl Into<Handler>) -> Result<&mut Self, RouteError> {
        self.register(Method::Post, pattern, handler)
    }

    pub fn put(&mut self, pattern: &str, handler: impl Into<Handler>) -> Result<&mut Self, RouteError> {
        self.register(Method::Put, pattern, handler)
    }

    pub fn delete(&mut self, pattern: &str, handler: impl Into<Handler>) -> Result<&mut Self, RouteError> {
        self.register(Method::Delete, pattern, handler)
    }

    pub fn options(&mut self, pattern: &str, handler: impl Into<Handler>) -> Result<&mut Self, RouteError> {
        self.register(Method::Options, pattern, handler)
    }

    pub fn get_or_post(
        &mut self,
        pattern: &str,
        handler: impl Into<Handler>,
    ) -> Result<&mut Self, RouteError> {
        self.register([Method::Get, Method::Post], pattern, handler)
    }

    /// Registered routes, in registration order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Compile the table for dispatch. No routes can be added afterwards.
    pub fn freeze(self) -> CompiledRouteTable {
        let mut by_method: HashMap<Method, Node> = HashMap::new();
        for (index, route) in self.routes.iter().enumerate() {
            for method in route.methods.iter() {
                by_method
                    .entry(method)
                    .or_default()
                    .insert(route.pattern.segments(), index);
            }
        }
        info!("route table compiled with {} routes", self.routes.len());
        CompiledRouteTable {
            routes: self.routes,
            by_method,
        }
    }
}

/// Outcome of matching a method and decoded path.
#[derive(Debug)]
pub enum RouteMatch<'a> {
    NotFound,
    /// The path exists under other methods, listed for an `Allow` header.
    MethodNotAllowed(MethodSet),
    Matched { route: &'a Route, vars: PathVars },
}

/// Immutable, method-indexed route table.
#[derive(Debug)]
pub struct CompiledRouteTable {
    routes: Vec<Route>,
    by_method: HashMap<Method, Node>,
}

impl CompiledRouteTable {
    /// Match a request. `path` must already have its query string stripped and
    /// be percent-decoded; it is not normalized here.
    pub fn match_route(&self, method: Method, path: &str) -> RouteMatch<'_> {
        let Some(segments) = split_path(path) else {
            return RouteMatch::NotFound;
        };

        if let Some(index) = self.by_method.get(&method).and_then(|n| n.find(&segments)) {
            let route = &self.routes[index];
            return RouteMatch::Matched {
                route,
                vars: route.pattern.bind(&segments),
            };
        }

        let allowed: MethodSet = self
            .by_method
            .iter()
            .filter(|(m, node)| **m != method && node.find(&segments).is_some())
            .map(|(m, _)| *m)
            .collect();

        if allowed.is_empty() {
            RouteMatch::NotFound
        } else {
            RouteMatch::MethodNotAllowed(allowed)
        }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn split_path(path: &str) -> Option<Vec<&str>> {
    let rest = path.strip_prefix('/')?;
    if rest.is_empty() {
        return Some(Vec::new());
    }
    Some(rest.split('/').collect())
}

/// Segment trie node. `route` is the index of the earliest route ending here.
#[derive(Debug, Default)]
struct Node {
    literals: HashMap<String, Node>,
    variables: Vec<(Option<Regex>, Node)>,
    route: Option<usize>,
}

impl Node {
    fn insert(&mut self, segments: &[Segment], index: usize) {
        let Some((first, rest)) = segments.split_first() else {
            self.route.get_or_insert(index);
            return;
        };
        let child = match first {
            Segment::Literal(text) => self.literals.entry(text.clone()).or_default(),
            Segment::Variable(var) => {
                let key = var.constraint();
                match self
                    .variables
                    .iter()
                    .position(|(re, _)| re.as_ref().map(Regex::as_str) == key)
                {
                    Some(pos) => &mut self.variables[pos].1,
                    None => {
                        self.variables.push((var.regex().cloned(), Node::default()));
                        let last = self.variables.len() - 1;
                        &mut self.variables[last].1
                    }
                }
            }
        };
        child.insert(rest, index);
    }

    /// Earliest-registered route matching `segments`, exploring literal and
    /// variable branches alike.
    fn find(&self, segments: &[&str]) -> Option<usize> {
        let Some((first, rest)) = segments.split_first() else {
            return self.route;
        };

        let mut best = self.literals.get(*first).and_then(|n| n.find(rest));
        if first.is_empty() {
            return best;
        }
        for (constraint, child) in &self.variables {
            if constraint.as_ref().is_some_and(|re| !re.is_match(first)) {
                continue;
            }
            if let Some(index) = child.find(rest) {
                best = Some(best.map_or(index, |b| b.min(index)));
            }
        }
        best
    }
}
