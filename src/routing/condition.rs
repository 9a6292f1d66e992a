//! Route conditions.
//!
//! # Responsibilities
//! - Match a request by path prefix, path pattern or method
//! - Combine conditions with AND semantics (flattened)
//! - Derive the sub-request a matched branch sees
//! - Describe and serialize conditions for reflection
//!
//! # Design Decisions
//! - Method matching is case-insensitive, path matching is case-sensitive
//! - Patterns only match when anchored at the start of the path
//! - Identity transforms hand back the caller's request (`Cow::Borrowed`)
//! - An empty `And` always matches

use std::borrow::Cow;
use std::fmt;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::BuildError;
use crate::http::Request;

/// A compiled path pattern plus the source and flags it was built from.
#[derive(Debug, Clone)]
pub struct PathPattern {
    regex: Regex,
    source: String,
    flags: String,
}

impl PathPattern {
    /// Compile `source` with `regex` crate flags (`i`, `m`, `s`, `x`, `U`).
    pub fn new(source: &str, flags: &str) -> Result<Self, BuildError> {
        let mut builder = RegexBuilder::new(source);
        for flag in flags.chars() {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'x' => builder.ignore_whitespace(true),
                'U' => builder.swap_greed(true),
                other => {
                    return Err(BuildError::InvalidPattern {
                        pattern: source.to_string(),
                        reason: format!("unsupported flag `{other}`"),
                    })
                }
            };
        }
        let regex = builder.build().map_err(|e| BuildError::InvalidPattern {
            pattern: source.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            regex,
            source: source.to_string(),
            flags: flags.to_string(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }

    /// Match at position 0 and return the consumed length plus named captures.
    fn match_prefix(&self, path: &str) -> Option<(usize, Vec<(String, String)>)> {
        let captures = self.regex.captures(path)?;
        let whole = captures.get(0)?;
        if whole.start() != 0 {
            return None;
        }

        let params = self
            .regex
            .capture_names()
            .flatten()
            .filter_map(|name| {
                captures
                    .name(name)
                    .map(|m| (name.to_string(), m.as_str().to_string()))
            })
            .collect();
        Some((whole.end(), params))
    }
}

impl PartialEq for PathPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.flags == other.flags
    }
}

impl Eq for PathPattern {}

/// A predicate over a request plus the transform applied when it matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ConditionRepr", into = "ConditionRepr")]
pub enum Condition {
    /// Literal path prefix.
    Path(String),
    /// Regular expression anchored at the start of the path.
    PathPattern(PathPattern),
    /// HTTP method, compared case-insensitively.
    Method(String),
    /// All conditions, applied in order.
    And(Vec<Condition>),
}

impl Condition {
    pub fn path(prefix: impl Into<String>) -> Self {
        Condition::Path(prefix.into())
    }

    pub fn pattern(source: &str, flags: &str) -> Result<Self, BuildError> {
        PathPattern::new(source, flags).map(Condition::PathPattern)
    }

    pub fn method(name: impl AsRef<str>) -> Self {
        Condition::Method(name.as_ref().to_ascii_lowercase())
    }

    /// Returns true if the request satisfies this condition.
    pub fn applies_to(&self, req: &Request) -> bool {
        match self {
            Condition::Path(prefix) => req.path().starts_with(prefix.as_str()),
            Condition::PathPattern(pattern) => pattern.match_prefix(req.path()).is_some(),
            Condition::Method(method) => req.method().eq_ignore_ascii_case(method),
            Condition::And(conditions) => thread(conditions, req).is_some(),
        }
    }

    /// The request a matched branch operates on.
    ///
    /// Only meaningful after `applies_to` returned true. Conditions that do
    /// not transform the request return it borrowed.
    pub fn derive_sub_request<'r>(&self, req: &'r Request) -> Cow<'r, Request> {
        match self {
            Condition::Path(prefix) => match req.path().strip_prefix(prefix.as_str()) {
                Some(_) if prefix.is_empty() => Cow::Borrowed(req),
                Some(rest) if rest.starts_with('/') => Cow::Owned(req.derive(rest, [])),
                Some(rest) => Cow::Owned(req.derive(&format!("/{rest}"), [])),
                None => Cow::Borrowed(req),
            },
            Condition::PathPattern(pattern) => match pattern.match_prefix(req.path()) {
                Some((0, params)) if params.is_empty() => Cow::Borrowed(req),
                Some((consumed, params)) => Cow::Owned(req.derive(&req.path()[consumed..], params)),
                None => Cow::Borrowed(req),
            },
            Condition::Method(_) => Cow::Borrowed(req),
            Condition::And(conditions) => thread(conditions, req).unwrap_or(Cow::Borrowed(req)),
        }
    }

    /// Combine with `other`, flattening nested `And`s into one list.
    pub fn and(self, other: Condition) -> Condition {
        let mut conditions = match self {
            Condition::And(conditions) => conditions,
            single => vec![single],
        };
        match other {
            Condition::And(more) => conditions.extend(more),
            single => conditions.push(single),
        }
        Condition::And(conditions)
    }

    /// Human-oriented summary, e.g. `{"method": "get", "path": "/users"}`.
    pub fn describe(&self) -> Map<String, Value> {
        let mut info = Map::new();
        match self {
            Condition::Path(prefix) => {
                info.insert("path".into(), Value::String(prefix.clone()));
            }
            Condition::PathPattern(pattern) => {
                info.insert("path".into(), Value::String(pattern.source.clone()));
            }
            Condition::Method(method) => {
                info.insert("method".into(), Value::String(method.clone()));
            }
            Condition::And(conditions) => {
                for condition in conditions {
                    info.extend(condition.describe());
                }
            }
        }
        info
    }

    /// Tagged form: `{"type": "path" | "path2" | "method" | "and", ...}`.
    pub fn serialize(&self) -> Value {
        serde_json::to_value(ConditionRepr::from(self.clone())).unwrap_or(Value::Null)
    }
}

/// Thread `req` through each condition. `None` as soon as one fails.
fn thread<'r>(conditions: &[Condition], req: &'r Request) -> Option<Cow<'r, Request>> {
    let mut current = Cow::Borrowed(req);
    for condition in conditions {
        if !condition.applies_to(&current) {
            return None;
        }
        current = match current {
            Cow::Borrowed(r) => condition.derive_sub_request(r),
            Cow::Owned(r) => {
                let derived = match condition.derive_sub_request(&r) {
                    Cow::Owned(next) => Some(next),
                    Cow::Borrowed(_) => None,
                };
                Cow::Owned(derived.unwrap_or(r))
            }
        };
    }
    Some(current)
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Path(prefix) => write!(f, "{prefix}"),
            Condition::PathPattern(pattern) => write!(f, "/{}/{}", pattern.source, pattern.flags),
            Condition::Method(method) => write!(f, "{}", method.to_ascii_uppercase()),
            Condition::And(conditions) => {
                for (i, condition) in conditions.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{condition}")?;
                }
                Ok(())
            }
        }
    }
}

/// Wire representation of a condition.
#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ConditionRepr {
    Path { path: String },
    #[serde(rename = "path2")]
    Pattern {
        regex: String,
        #[serde(default)]
        flags: String,
    },
    Method { method: String },
    And { conditions: Vec<Condition> },
}

impl From<Condition> for ConditionRepr {
    fn from(condition: Condition) -> Self {
        match condition {
            Condition::Path(path) => ConditionRepr::Path { path },
            Condition::PathPattern(pattern) => ConditionRepr::Pattern {
                regex: pattern.source,
                flags: pattern.flags,
            },
            Condition::Method(method) => ConditionRepr::Method { method },
            Condition::And(conditions) => ConditionRepr::And { conditions },
        }
    }
}

impl TryFrom<ConditionRepr> for Condition {
    type Error = BuildError;

    fn try_from(repr: ConditionRepr) -> Result<Self, Self::Error> {
        Ok(match repr {
            ConditionRepr::Path { path } => Condition::Path(path),
            ConditionRepr::Pattern { regex, flags } => Condition::pattern(&regex, &flags)?,
            ConditionRepr::Method { method } => Condition::method(method),
            ConditionRepr::And { conditions } => Condition::And(conditions),
        })
    }
}
