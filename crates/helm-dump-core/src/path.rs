//! Field path expressions.
//!
//! A [`FieldPath`] addresses one location inside a manifest. It is parsed
//! from the JSONPath-like form accepted on the command line
//! (`.spec.replicas`, `{.spec.replicas}`, `$.metadata.annotations['a/b']`,
//! `.spec.containers[0].image`) and rendered in a canonical form
//! (`$.spec.replicas`) that the syntax-tree visitor compares by string
//! equality.

use std::fmt;

use crate::error::{ExtractError, Result};

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Mapping key.
    Field(String),
    /// Sequence index. Negative values count from the end.
    Index(i64),
}

/// A parsed, root-relative path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    /// The document root (`$`).
    pub fn root() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns a new path with `segment` appended.
    pub fn child(&self, segment: Segment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }

    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub fn pop(&mut self) -> Option<Segment> {
        self.segments.pop()
    }

    /// Canonical rendering, e.g. `$.spec.containers[0]['app.kubernetes.io/name']`.
    pub fn canonical(&self) -> String {
        let mut out = String::from("$");
        for segment in &self.segments {
            match segment {
                Segment::Field(name) if is_plain_field(name) => {
                    out.push('.');
                    out.push_str(name);
                }
                Segment::Field(name) => {
                    out.push_str("['");
                    for c in name.chars() {
                        if c == '\'' || c == '\\' {
                            out.push('\\');
                        }
                        out.push(c);
                    }
                    out.push_str("']");
                }
                Segment::Index(i) => {
                    out.push('[');
                    out.push_str(&i.to_string());
                    out.push(']');
                }
            }
        }
        out
    }

    /// Parse a path expression.
    ///
    /// Wildcards, recursive descent, slices and filters are rejected: a
    /// path must address exactly one location.
    pub fn parse(expr: &str) -> Result<Self> {
        let trimmed = expr.trim();
        let inner = match trimmed.strip_prefix('{') {
            Some(rest) => rest
                .strip_suffix('}')
                .ok_or_else(|| ExtractError::path(expr, "unterminated '{'"))?
                .trim(),
            None => trimmed,
        };
        let inner = inner.strip_prefix('$').unwrap_or(inner);

        let chars: Vec<char> = inner.chars().collect();
        let mut segments = Vec::new();
        let mut i = 0;

        // A lone "." addresses the root.
        if chars.len() == 1 && chars[0] == '.' {
            return Ok(Self::root());
        }

        while i < chars.len() {
            match chars[i] {
                '.' => {
                    i += 1;
                    if i < chars.len() && chars[i] == '.' {
                        return Err(ExtractError::path(expr, "recursive descent is not supported"));
                    }
                    let start = i;
                    while i < chars.len() && !matches!(chars[i], '.' | '[' | ']') {
                        if chars[i].is_whitespace() || matches!(chars[i], '\'' | '"') {
                            return Err(ExtractError::path(
                                expr,
                                format!("unexpected character {:?} in field name", chars[i]),
                            ));
                        }
                        i += 1;
                    }
                    let name: String = chars[start..i].iter().collect();
                    if name.is_empty() {
                        return Err(ExtractError::path(expr, "empty field name"));
                    }
                    if name == "*" {
                        return Err(ExtractError::path(expr, "wildcards are not supported"));
                    }
                    segments.push(Segment::Field(name));
                }
                '[' => {
                    i += 1;
                    let (segment, next) = parse_bracket(expr, &chars, i)?;
                    segments.push(segment);
                    i = next;
                }
                c => {
                    return Err(ExtractError::path(
                        expr,
                        format!("expected '.' or '[' but found {:?}", c),
                    ));
                }
            }
        }

        Ok(Self { segments })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Parse the inside of `[...]`, starting just after the `[`.
/// Returns the segment and the index just after the closing `]`.
fn parse_bracket(expr: &str, chars: &[char], mut i: usize) -> Result<(Segment, usize)> {
    match chars.get(i) {
        Some(&quote) if quote == '\'' || quote == '"' => {
            i += 1;
            let mut name = String::new();
            loop {
                match chars.get(i) {
                    None => return Err(ExtractError::path(expr, "unterminated quoted field")),
                    Some('\\') => {
                        let escaped = chars
                            .get(i + 1)
                            .ok_or_else(|| ExtractError::path(expr, "dangling escape"))?;
                        name.push(*escaped);
                        i += 2;
                    }
                    Some(&c) if c == quote => {
                        i += 1;
                        break;
                    }
                    Some(&c) => {
                        name.push(c);
                        i += 1;
                    }
                }
            }
            if chars.get(i) != Some(&']') {
                return Err(ExtractError::path(expr, "expected ']' after quoted field"));
            }
            Ok((Segment::Field(name), i + 1))
        }
        _ => {
            let start = i;
            while i < chars.len() && chars[i] != ']' {
                i += 1;
            }
            if i >= chars.len() {
                return Err(ExtractError::path(expr, "unterminated '['"));
            }
            let body: String = chars[start..i].iter().collect();
            let body = body.trim();
            if body == "*" || body.contains(':') || body.starts_with('?') || body.contains(',') {
                return Err(ExtractError::path(
                    expr,
                    format!("unsupported selector [{}]", body),
                ));
            }
            let index = body
                .parse::<i64>()
                .map_err(|_| ExtractError::path(expr, format!("invalid index [{}]", body)))?;
            Ok((Segment::Index(index), i + 1))
        }
    }
}

fn is_plain_field(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
