//! Route matching for `direct` and `topic` exchanges.
//!
//! Patterns are compiled once, when a subscription group is created, and the
//! compiled form is evaluated against every published route.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::core::error::RouterError;

/// How a queue interprets subscribed patterns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeType {
    /// The pattern is a regular expression that must match the whole route.
    #[default]
    Direct,
    /// Dot-separated segments with `*` (one segment) and `#` (zero or more
    /// segments) wildcards.
    Topic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Star,
    Hash,
}

#[derive(Debug, Clone)]
enum Compiled {
    Direct(Regex),
    Topic {
        segments: Vec<Segment>,
        case_insensitive: bool,
    },
}

/// A subscribed pattern compiled for one exchange type.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    source: String,
    compiled: Compiled,
}

impl RoutePattern {
    pub fn compile(
        pattern: &str,
        exchange: ExchangeType,
        case_insensitive: bool,
    ) -> Result<Self, RouterError> {
        let compiled = match exchange {
            ExchangeType::Direct => RegexBuilder::new(&format!("^(?:{pattern})$"))
                .case_insensitive(case_insensitive)
                .build()
                .map(Compiled::Direct)
                .map_err(|e| RouterError::invalid_pattern(pattern, e))?,
            ExchangeType::Topic => {
                let segments = pattern
                    .split('.')
                    .map(|segment| match segment {
                        "*" => Segment::Star,
                        "#" => Segment::Hash,
                        literal if case_insensitive => Segment::Literal(literal.to_lowercase()),
                        literal => Segment::Literal(literal.to_owned()),
                    })
                    .collect();
                Compiled::Topic {
                    segments,
                    case_insensitive,
                }
            }
        };

        Ok(Self {
            source: pattern.to_owned(),
            compiled,
        })
    }

    /// The pattern as it was subscribed.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, route: &str) -> bool {
        match &self.compiled {
            Compiled::Direct(regex) => regex.is_match(route),
            Compiled::Topic {
                segments,
                case_insensitive,
            } => {
                if *case_insensitive {
                    let lowered = route.to_lowercase();
                    match_segments(segments, &lowered.split('.').collect::<Vec<_>>())
                } else {
                    match_segments(segments, &route.split('.').collect::<Vec<_>>())
                }
            }
        }
    }
}

/// Evaluates a topic pattern against route segments.
///
/// `row[j]` holds whether the pattern suffix starting at the current segment
/// matches `route[j..]`; rows are filled from the last pattern segment back.
fn match_segments(pattern: &[Segment], route: &[&str]) -> bool {
    let n = route.len();
    let mut next = vec![false; n + 1];
    next[n] = true;

    for segment in pattern.iter().rev() {
        let mut row = vec![false; n + 1];
        for j in (0..=n).rev() {
            row[j] = match segment {
                Segment::Hash => next[j] || (j < n && row[j + 1]),
                Segment::Star => j < n && !route[j].is_empty() && next[j + 1],
                Segment::Literal(literal) => j < n && route[j] == literal.as_str() && next[j + 1],
            };
        }
        next = row;
    }

    next[0]
}

/// Whether `published` is delivered to a subscription on `pattern`.
///
/// Invalid direct-exchange patterns match nothing.
pub fn matches(
    published: &str,
    pattern: &str,
    exchange: ExchangeType,
    case_insensitive: bool,
) -> bool {
    RoutePattern::compile(pattern, exchange, case_insensitive)
        .map(|compiled| compiled.is_match(published))
        .unwrap_or(false)
}
