//! Pub/sub topic patterns.
//!
//! Patterns are written with `{name}` placeholders, e.g. `api/telemetry/{id}`,
//! and compile to MQTT-style filters (`api/telemetry/+`). Matching binds named
//! segments, positional `+` wildcards and a trailing `#` remainder.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicError {
    #[error("empty topic pattern")]
    Empty,

    #[error("'#' must be the last level of pattern '{0}'")]
    MisplacedHash(String),

    #[error("malformed placeholder in pattern '{0}'")]
    BadPlaceholder(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Level {
    Literal(String),
    Named(String),
    Wildcard,
    Rest,
}

/// A compiled topic pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPattern {
    source: String,
    levels: Vec<Level>,
}

/// Values extracted from a matching topic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicParams {
    pub named: HashMap<String, String>,
    pub wildcards: Vec<String>,
    pub hash_path: Option<String>,
}

impl TopicParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }
}

impl TopicPattern {
    pub fn compile(pattern: &str) -> Result<Self, TopicError> {
        if pattern.is_empty() {
            return Err(TopicError::Empty);
        }
        let parts: Vec<&str> = pattern.split('/').collect();
        let mut levels = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            let level = if *part == "#" {
                if i + 1 != parts.len() {
                    return Err(TopicError::MisplacedHash(pattern.to_string()));
                }
                Level::Rest
            } else if *part == "+" {
                Level::Wildcard
            } else if let Some(inner) = part.strip_prefix('{') {
                let name = inner
                    .strip_suffix('}')
                    .filter(|n| !n.is_empty() && !n.contains(['{', '}']))
                    .ok_or_else(|| TopicError::BadPlaceholder(pattern.to_string()))?;
                Level::Named(name.to_string())
            } else if part.contains(['{', '}', '+', '#']) {
                return Err(TopicError::BadPlaceholder(pattern.to_string()));
            } else {
                Level::Literal(part.to_string())
            };
            levels.push(level);
        }
        Ok(Self {
            source: pattern.to_string(),
            levels,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// The MQTT subscription filter for this pattern.
    pub fn filter(&self) -> String {
        self.levels
            .iter()
            .map(|level| match level {
                Level::Literal(s) => s.as_str(),
                Level::Named(_) | Level::Wildcard => "+",
                Level::Rest => "#",
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Substitute named placeholders to build a concrete topic.
    pub fn render(&self, values: &[(&str, &str)]) -> Option<String> {
        let mut out = Vec::with_capacity(self.levels.len());
        for level in &self.levels {
            match level {
                Level::Literal(s) => out.push(s.as_str()),
                Level::Named(name) => {
                    let (_, value) = values.iter().find(|(k, _)| k == name)?;
                    out.push(value);
                }
                Level::Wildcard | Level::Rest => return None,
            }
        }
        Some(out.join("/"))
    }

    /// Match a concrete topic, binding its parameters.
    pub fn matches(&self, topic: &str) -> Option<TopicParams> {
        // Wildcards never match system topics at the first level.
        if topic.starts_with('$')
            && !matches!(self.levels.first(), Some(Level::Literal(_)))
        {
            return None;
        }

        let parts: Vec<&str> = topic.split('/').collect();
        let mut params = TopicParams::default();

        for (i, level) in self.levels.iter().enumerate() {
            match (level, parts.get(i)) {
                (Level::Rest, _) => {
                    let rest = parts.get(i..).map(|r| r.join("/")).unwrap_or_default();
                    params.hash_path = Some(rest);
                    return Some(params);
                }
                (_, None) => return None,
                (Level::Literal(s), Some(part)) if s == part => {}
                (Level::Literal(_), Some(_)) => return None,
                (Level::Named(name), Some(part)) => {
                    params.named.insert(name.clone(), part.to_string());
                }
                (Level::Wildcard, Some(part)) => params.wildcards.push(part.to_string()),
            }
        }

        if parts.len() == self.levels.len() {
            Some(params)
        } else {
            None
        }
    }
}
