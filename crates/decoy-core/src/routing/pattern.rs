//! Route pattern compilation and matching
//!
//! A pattern is a `/`-separated list of segments. Each segment is one of:
//! - a literal (`users`), matched exactly and case-sensitively
//! - a parameter (`{id}`), matching any non-empty segment
//! - an optional trailing parameter (`{id?}`)
//! - a trailing catch-all (`{*rest}`), matching the remainder of the path

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::error::RouteError;

/// Reasons a pattern fails to compile
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("pattern must start with '/'")]
    MissingLeadingSlash,

    #[error("segment '{0}' has unbalanced braces")]
    UnbalancedBraces(String),

    #[error("parameter name '{0}' is invalid")]
    InvalidParamName(String),

    #[error("parameter '{0}' appears more than once")]
    DuplicateParam(String),

    #[error("'{0}' must be the last segment")]
    NotLastSegment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    OptionalParam(String),
    CatchAll(String),
}

impl Segment {
    /// Per-segment precedence; higher is more specific
    fn rank(&self) -> u8 {
        match self {
            Segment::Literal(_) => 4,
            Segment::Param(_) => 3,
            Segment::OptionalParam(_) => 2,
            Segment::CatchAll(_) => 1,
        }
    }
}

/// Rank appended after the last segment so an exact-length pattern
/// outranks one that continues with optional or catch-all segments.
const END_RANK: u8 = 5;

/// Compiled route pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compile a pattern string
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let rest = pattern
            .strip_prefix('/')
            .ok_or(PatternError::MissingLeadingSlash)?;

        let raw_segments: Vec<&str> = rest.split('/').collect();
        let last = raw_segments.len() - 1;
        let mut segments = Vec::with_capacity(raw_segments.len());
        let mut seen = Vec::new();

        for (idx, raw) in raw_segments.iter().enumerate() {
            let segment = Self::compile_segment(raw)?;

            match &segment {
                Segment::OptionalParam(_) | Segment::CatchAll(_) if idx != last => {
                    return Err(PatternError::NotLastSegment(raw.to_string()));
                }
                _ => {}
            }

            if let Segment::Param(name) | Segment::OptionalParam(name) | Segment::CatchAll(name) =
                &segment
            {
                if seen.contains(name) {
                    return Err(PatternError::DuplicateParam(name.clone()));
                }
                seen.push(name.clone());
            }

            segments.push(segment);
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    fn compile_segment(raw: &str) -> Result<Segment, PatternError> {
        let Some(inner) = raw.strip_prefix('{') else {
            if raw.contains(['{', '}']) {
                return Err(PatternError::UnbalancedBraces(raw.to_string()));
            }
            return Ok(Segment::Literal(raw.to_string()));
        };

        let inner = inner
            .strip_suffix('}')
            .ok_or_else(|| PatternError::UnbalancedBraces(raw.to_string()))?;

        let param_name = |name: &str| {
            if is_valid_param_name(name) {
                Ok(name.to_string())
            } else {
                Err(PatternError::InvalidParamName(name.to_string()))
            }
        };

        if let Some(name) = inner.strip_prefix('*') {
            Ok(Segment::CatchAll(param_name(name)?))
        } else if let Some(name) = inner.strip_suffix('?') {
            Ok(Segment::OptionalParam(param_name(name)?))
        } else {
            Ok(Segment::Param(param_name(inner)?))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Precedence key; greater keys are more specific.
    ///
    /// Earlier segments dominate later ones, so `/a/{*rest}` outranks
    /// `/{x}/b` for a request to `/a/b`.
    pub fn specificity(&self) -> Vec<u8> {
        let mut key: Vec<u8> = self.segments.iter().map(Segment::rank).collect();
        key.push(END_RANK);
        key
    }

    /// Match a request path, returning captured parameters on success
    pub fn matches(&self, path: &RequestPath) -> Option<HashMap<String, String>> {
        let mut params = HashMap::new();
        let parts = &path.segments;

        for (idx, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(lit) => {
                    if parts.get(idx).map(|p| p.raw.as_str()) != Some(lit.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let part = parts.get(idx)?;
                    if part.raw.is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), part.decoded.clone());
                }
                Segment::OptionalParam(name) => {
                    // Must consume the final segment or nothing at all
                    match parts.len().checked_sub(idx) {
                        Some(0) => {}
                        Some(1) => {
                            if !parts[idx].raw.is_empty() {
                                params.insert(name.clone(), parts[idx].decoded.clone());
                            }
                        }
                        _ => return None,
                    }
                    return Some(params);
                }
                Segment::CatchAll(name) => {
                    let rest: Vec<&str> = parts
                        .iter()
                        .skip(idx)
                        .map(|p| p.decoded.as_str())
                        .collect();
                    params.insert(name.clone(), rest.join("/"));
                    return Some(params);
                }
            }
        }

        if parts.len() == self.segments.len() {
            Some(params)
        } else {
            None
        }
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn is_valid_param_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone)]
struct PathPart {
    raw: String,
    decoded: String,
}

/// A request path split into segments, checked once per lookup
#[derive(Debug, Clone)]
pub struct RequestPath {
    segments: Vec<PathPart>,
}

impl RequestPath {
    pub fn parse(path: &str) -> Result<Self, RouteError> {
        let rest = path
            .strip_prefix('/')
            .ok_or_else(|| RouteError::InvalidPath(path.to_string()))?;

        let segments = rest
            .split('/')
            .map(|raw| {
                if !has_valid_escapes(raw) {
                    return Err(RouteError::InvalidEncoding(raw.to_string()));
                }
                let decoded = urlencoding::decode(raw)
                    .map_err(|_| RouteError::InvalidEncoding(raw.to_string()))?
                    .into_owned();
                Ok(PathPart {
                    raw: raw.to_string(),
                    decoded,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { segments })
    }
}

/// Every `%` must introduce two hex digits
fn has_valid_escapes(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
                && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit);
            if !valid {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}
