//! Route pattern parsing and normalization.
//!
//! A pattern is a `/`-separated list of segments, each either literal text or
//! a named variable `{name}`, optionally constrained by a regex `{name:\d+}`.

use crate::error::RouteError;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Collapse runs of `/` and strip a trailing slash (the root stays `/`).
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 1);
    for segment in raw.split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// A named variable segment.
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    constraint: Option<Regex>,
}

impl Variable {
    /// Whether `segment` can be bound to this variable.
    pub fn accepts(&self, segment: &str) -> bool {
        !segment.is_empty() && self.constraint.as_ref().map_or(true, |re| re.is_match(segment))
    }

    /// Source of the anchored constraint regex, if any.
    pub fn constraint(&self) -> Option<&str> {
        self.constraint.as_ref().map(Regex::as_str)
    }

    pub(crate) fn regex(&self) -> Option<&Regex> {
        self.constraint.as_ref()
    }
}

#[derive(Debug, Clone)]
pub enum Segment {
    Literal(String),
    Variable(Variable),
}

/// A parsed, normalized route pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Normalize and parse `raw`.
    pub fn parse(raw: &str) -> Result<Self, RouteError> {
        let source = normalize(raw);
        let mut segments = Vec::new();
        let mut seen = HashSet::new();

        for part in source.split('/').skip(1).filter(|s| !s.is_empty()) {
            let segment = match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Some(inner) => {
                    let variable = parse_variable(&source, inner)?;
                    if !seen.insert(variable.name.clone()) {
                        return Err(RouteError::DuplicateVariable {
                            pattern: source.clone(),
                            name: variable.name,
                        });
                    }
                    Segment::Variable(variable)
                }
                None if part.contains(['{', '}']) => {
                    return Err(RouteError::InvalidPattern {
                        pattern: source.clone(),
                        reason: format!("segment {:?} mixes literal text and a variable", part),
                    });
                }
                None => Segment::Literal(part.to_string()),
            };
            segments.push(segment);
        }

        Ok(Self { source, segments })
    }

    /// The normalized pattern text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Variable names in declaration order.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Variable(v) => Some(v.name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Bind variable values from path segments this pattern already matched.
    pub(crate) fn bind(&self, path_segments: &[&str]) -> PathVars {
        let mut vars = PathVars::default();
        for (segment, value) in self.segments.iter().zip(path_segments) {
            if let Segment::Variable(v) = segment {
                vars.insert(v.name.clone(), (*value).to_string());
            }
        }
        vars
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_variable(pattern: &str, inner: &str) -> Result<Variable, RouteError> {
    let (name, constraint) = match inner.split_once(':') {
        Some((name, re)) => (name.trim(), Some(re.trim())),
        None => (inner.trim(), None),
    };

    let valid_name = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid_name {
        return Err(RouteError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: format!("invalid variable name {:?}", name),
        });
    }

    let constraint = match constraint {
        Some("") | None => None,
        Some(re) => Some(Regex::new(&format!("^(?:{})$", re)).map_err(|e| {
            RouteError::InvalidConstraint {
                name: name.to_string(),
                reason: e.to_string(),
            }
        })?),
    };

    Ok(Variable {
        name: name.to_string(),
        constraint,
    })
}

/// Path variables bound by a match, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PathVars(Vec<(String, String)>);

impl PathVars {
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
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
