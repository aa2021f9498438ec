//! YAML path addressing
//!
//! A path selects zero or more nodes of a manifest document:
//!
//! - `spec.replicas`: mapping keys separated by dots
//! - `metadata.annotations.'app.kubernetes.io/name'`: quoted keys may contain dots
//! - `spec.containers[0].image`: sequence indexes
//! - `spec.containers.(name == app).image`: every sequence element matching a filter
//! - `(kind == Deployment).spec.replicas`: a filter on a mapping gates the whole node
//!
//! Filter conditions compare the scalar found at a dotted sub-path with a
//! literal and may be combined with `&&`.

use serde_yaml::Value;
use std::fmt;
use std::str::FromStr;

use crate::document::is_expression;
use crate::error::{EngineError, Result};

/// One step of a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
    Filter(Vec<Condition>),
}

/// `sub.path == literal`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub path: Vec<String>,
    pub value: String,
}

impl Condition {
    fn matches(&self, node: &Value) -> bool {
        let mut current = node;
        for key in &self.path {
            match current.get(key.as_str()) {
                Some(child) => current = child,
                None => return false,
            }
        }
        scalar_text(current).is_some_and(|text| text == self.value)
    }
}

/// A parsed YAML path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YamlPath {
    raw: String,
    segments: Vec<Segment>,
}

impl YamlPath {
    pub fn parse(path: &str) -> Result<Self> {
        let segments = parse_segments(path).map_err(|message| EngineError::InvalidPath {
            path: path.to_string(),
            message,
        })?;

        Ok(Self {
            raw: path.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// First value selected by the path
    pub fn read(&self, document: &Value) -> Option<Value> {
        let mut found = None;
        visit(document, &self.segments, &mut |node| {
            if found.is_none() {
                found = Some(node.clone());
            }
        });
        found
    }

    /// Replace every selected node with `replacement`
    ///
    /// Only existing nodes are replaced. Returns the first value replaced,
    /// ignoring nulls and expressions injected by an earlier rewrite.
    pub fn read_and_set(&self, document: &mut Value, replacement: &Value) -> Option<Value> {
        let mut found = None;
        visit_mut(document, &self.segments, false, &mut |node| {
            if found.is_none() && !node.is_null() && !is_expression(node) {
                found = Some(node.clone());
            }
            *node = replacement.clone();
        });
        found
    }

    /// Set every selected node to `replacement`
    ///
    /// Unlike [`YamlPath::read_and_set`], a missing final key is created when
    /// its parent mapping exists. Returns the number of nodes written.
    pub fn set(&self, document: &mut Value, replacement: &Value) -> usize {
        let mut written = 0;
        visit_mut(document, &self.segments, true, &mut |node| {
            *node = replacement.clone();
            written += 1;
        });
        written
    }
}

impl FromStr for YamlPath {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for YamlPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn visit<F: FnMut(&Value)>(node: &Value, segments: &[Segment], f: &mut F) {
    let Some((segment, rest)) = segments.split_first() else {
        f(node);
        return;
    };

    match (segment, node) {
        (Segment::Key(key), Value::Mapping(map)) => {
            if let Some(child) = map.get(key.as_str()) {
                visit(child, rest, f);
            }
        }
        (Segment::Index(index), Value::Sequence(seq)) => {
            if let Some(child) = seq.get(*index) {
                visit(child, rest, f);
            }
        }
        (Segment::Filter(conditions), Value::Sequence(seq)) => {
            for child in seq.iter().filter(|c| matches_all(conditions, c)) {
                visit(child, rest, f);
            }
        }
        (Segment::Filter(conditions), Value::Mapping(_)) => {
            if matches_all(conditions, node) {
                visit(node, rest, f);
            }
        }
        _ => {}
    }
}

fn visit_mut<F: FnMut(&mut Value)>(node: &mut Value, segments: &[Segment], create: bool, f: &mut F) {
    let Some((segment, rest)) = segments.split_first() else {
        f(node);
        return;
    };

    match segment {
        Segment::Key(key) => {
            let Value::Mapping(map) = node else {
                return;
            };
            if let Some(child) = map.get_mut(key.as_str()) {
                visit_mut(child, rest, create, f);
            } else if create && rest.is_empty() {
                let key = Value::String(key.clone());
                map.insert(key.clone(), Value::Null);
                if let Some(child) = map.get_mut(&key) {
                    f(child);
                }
            }
        }
        Segment::Index(index) => {
            if let Value::Sequence(seq) = node
                && let Some(child) = seq.get_mut(*index)
            {
                visit_mut(child, rest, create, f);
            }
        }
        Segment::Filter(conditions) => {
            if let Value::Sequence(seq) = node {
                for child in seq.iter_mut() {
                    if matches_all(conditions, child) {
                        visit_mut(child, rest, create, f);
                    }
                }
            } else if node.is_mapping() && matches_all(conditions, node) {
                visit_mut(node, rest, create, f);
            }
        }
    }
}

fn matches_all(conditions: &[Condition], node: &Value) -> bool {
    conditions.iter().all(|c| c.matches(node))
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some("null".to_string()),
        _ => None,
    }
}

fn parse_segments(path: &str) -> std::result::Result<Vec<Segment>, String> {
    if path.trim().is_empty() {
        return Err("path is empty".to_string());
    }

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '.' => flush_key(&mut current, &mut segments),
            '\'' | '"' => {
                flush_key(&mut current, &mut segments);
                let key = read_quoted(&mut chars, ch)?;
                segments.push(Segment::Key(key));
            }
            '[' => {
                flush_key(&mut current, &mut segments);
                let mut content = String::new();
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == ']' {
                        closed = true;
                        break;
                    }
                    content.push(next);
                }
                if !closed {
                    return Err("unterminated '['".to_string());
                }

                let content = content.trim();
                if let Ok(index) = content.parse::<usize>() {
                    segments.push(Segment::Index(index));
                } else if content.len() >= 2
                    && (content.starts_with('\'') || content.starts_with('"'))
                    && content.ends_with(&content[..1])
                {
                    segments.push(Segment::Key(content[1..content.len() - 1].to_string()));
                } else {
                    return Err(format!("invalid index '[{}]'", content));
                }
            }
            '(' => {
                flush_key(&mut current, &mut segments);
                let mut content = String::new();
                let mut depth = 1;
                let mut quote = None;
                for next in chars.by_ref() {
                    match (next, quote) {
                        ('\'' | '"', None) => quote = Some(next),
                        (q, Some(open)) if q == open => quote = None,
                        ('(', None) => depth += 1,
                        (')', None) => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    content.push(next);
                }
                if depth != 0 {
                    return Err("unterminated '('".to_string());
                }
                segments.push(Segment::Filter(parse_conditions(&content)?));
            }
            _ => current.push(ch),
        }
    }
    flush_key(&mut current, &mut segments);

    if segments.is_empty() {
        return Err("path selects nothing".to_string());
    }
    Ok(segments)
}

fn flush_key(current: &mut String, segments: &mut Vec<Segment>) {
    let key = current.trim();
    if !key.is_empty() {
        segments.push(Segment::Key(key.to_string()));
    }
    current.clear();
}

fn read_quoted(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    quote: char,
) -> std::result::Result<String, String> {
    let mut key = String::new();
    for ch in chars.by_ref() {
        if ch == quote {
            return Ok(key);
        }
        key.push(ch);
    }
    Err(format!("unterminated quote {}", quote))
}

fn parse_conditions(content: &str) -> std::result::Result<Vec<Condition>, String> {
    content
        .split("&&")
        .map(|clause| {
            let (lhs, rhs) = clause
                .split_once("==")
                .ok_or_else(|| format!("filter '{}' is not of the form 'key == value'", clause.trim()))?;

            let path: Vec<String> = lhs
                .trim()
                .split('.')
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect();
            if path.is_empty() {
                return Err(format!("filter '{}' has no key", clause.trim()));
            }

            Ok(Condition {
                path,
                value: unquote(rhs.trim()).to_string(),
            })
        })
        .collect()
}

fn unquote(text: &str) -> &str {
    for quote in ['\'', '"'] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return &text[1..text.len() - 1];
        }
    }
    text
}
