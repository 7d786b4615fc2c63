//! Response Coercion
//!
//! Language models are asked for JSON but routinely wrap it in markdown
//! fences or prose. This module turns whatever came back into a value of the
//! operation's schema, trying in order:
//!
//! 1. the whole text as JSON,
//! 2. the body of the first fenced code block,
//! 3. balanced top-level `{...}` / `[...]` substrings found by scanning,
//! 4. a synthetic fallback whose content is marked with [`PLACEHOLDER_MARKER`].
//!
//! Coercion never fails. Falling back is logged at `warn`.

use sdk::types::{Decomposition, Pathway, Simulation, PLACEHOLDER_MARKER};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Upper bound on balanced substrings tried by the scanner
const MAX_SCAN_CANDIDATES: usize = 8;

/// Which strategy produced the value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Strict,
    Fenced,
    Scanned,
    Fallback,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Strict => "strict",
            Outcome::Fenced => "fenced",
            Outcome::Scanned => "scanned",
            Outcome::Fallback => "fallback",
        };
        f.write_str(s)
    }
}

/// A coerced value and how it was obtained
#[derive(Debug, Clone, PartialEq)]
pub struct Coerced<T> {
    pub value: T,
    pub outcome: Outcome,
}

impl<T> Coerced<T> {
    pub fn is_fallback(&self) -> bool {
        self.outcome == Outcome::Fallback
    }
}

/// A structured result a model can be asked to produce
pub trait Schema: DeserializeOwned + Serialize + Sized {
    /// Name used in logs
    const KIND: &'static str;

    /// Schema-valid value with placeholder content
    fn fallback(hint: &str) -> Self;

    /// Enforce value invariants (clamping, trimming)
    fn normalize(&mut self);

    /// Whether a normalized value satisfies the schema's invariants
    fn is_usable(&self) -> bool;

    /// Convert a parsed JSON value into the schema
    fn from_value(value: Value) -> Option<Self> {
        serde_json::from_value(value).ok()
    }
}

impl Schema for Decomposition {
    const KIND: &'static str = "decomposition";

    fn fallback(hint: &str) -> Self {
        let subject = hint.trim();
        Decomposition {
            invention: subject.to_string(),
            summary: format!(
                "{} The analysis of {} could not be generated. Try again shortly.",
                PLACEHOLDER_MARKER, subject
            ),
            core_principles: vec![format!("{} Underlying principles unavailable", PLACEHOLDER_MARKER)],
            components: vec![sdk::types::Component {
                name: format!("{} Core mechanism", PLACEHOLDER_MARKER),
                function: "Unknown".to_string(),
                underlying_technology: "Unknown".to_string(),
            }],
            prerequisites: vec![sdk::types::Prerequisite {
                name: format!("{} Prerequisites unavailable", PLACEHOLDER_MARKER),
                category: "Unknown".to_string(),
                earliest_plausible_era: "Unknown".to_string(),
                rationale: "The model response could not be parsed".to_string(),
            }],
            materials: Vec::new(),
        }
    }

    fn normalize(&mut self) {
        Decomposition::normalize(self)
    }

    fn is_usable(&self) -> bool {
        Decomposition::is_usable(self)
    }
}

impl Schema for Simulation {
    const KIND: &'static str = "simulation";

    fn fallback(hint: &str) -> Self {
        Simulation {
            pathways: vec![Pathway {
                title: format!("{} Pathway unavailable", PLACEHOLDER_MARKER),
                summary: format!(
                    "{} No pathway could be simulated for {}. Try again shortly.",
                    PLACEHOLDER_MARKER,
                    hint.trim()
                ),
                feasibility_score: 0.0,
                technical_steps: vec![format!(
                    "{} Re-run the simulation to generate technical steps",
                    PLACEHOLDER_MARKER
                )],
                key_obstacles: Vec::new(),
                societal_impact: String::new(),
                timeline: Vec::new(),
            }],
        }
    }

    fn normalize(&mut self) {
        Simulation::normalize(self)
    }

    fn is_usable(&self) -> bool {
        Simulation::is_usable(self)
    }

    /// A bare array is read as the pathway list
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Array(items) => serde_json::from_value(Value::Array(items))
                .ok()
                .map(|pathways| Simulation { pathways }),
            other => serde_json::from_value(other).ok(),
        }
    }
}

/// Finds JSON candidates inside model output
pub trait JsonExtractor: Send + Sync {
    /// Candidate texts in preference order, each tagged with its strategy
    fn candidates<'a>(&self, raw: &'a str) -> Vec<(Outcome, &'a str)>;
}

/// Default extractor: whole text, first fenced block, then a bracket scan
#[derive(Debug, Default, Clone, Copy)]
pub struct TextScan;

impl JsonExtractor for TextScan {
    fn candidates<'a>(&self, raw: &'a str) -> Vec<(Outcome, &'a str)> {
        let trimmed = raw.trim();
        let mut candidates = vec![(Outcome::Strict, trimmed)];

        if let Some(body) = extract_fenced(trimmed) {
            candidates.push((Outcome::Fenced, body.trim()));
        }

        candidates.extend(
            scan_balanced(trimmed)
                .into_iter()
                .map(|candidate| (Outcome::Scanned, candidate)),
        );

        candidates
    }
}

/// Coerce model output into `T` with the default extractor
pub fn coerce<T: Schema>(raw: &str, hint: &str) -> Coerced<T> {
    coerce_with(&TextScan, raw, hint)
}

/// Coerce model output into `T` with a specific extractor
pub fn coerce_with<T: Schema>(extractor: &dyn JsonExtractor, raw: &str, hint: &str) -> Coerced<T> {
    for (outcome, candidate) in extractor.candidates(raw) {
        if candidate.is_empty() {
            continue;
        }
        let Ok(value) = serde_json::from_str::<Value>(candidate) else {
            continue;
        };
        let Some(mut parsed) = T::from_value(value) else {
            continue;
        };
        parsed.normalize();
        if parsed.is_usable() {
            tracing::debug!(kind = T::KIND, %outcome, "Coerced model output");
            return Coerced {
                value: parsed,
                outcome,
            };
        }
        tracing::debug!(kind = T::KIND, %outcome, "Parsed value failed schema invariants");
    }

    tracing::warn!(
        kind = T::KIND,
        raw_chars = raw.chars().count(),
        "Model output could not be coerced; using placeholder"
    );
    Coerced {
        value: T::fallback(hint),
        outcome: Outcome::Fallback,
    }
}

/// Coerce free-form narrative text.
///
/// Strips code fences and wrapping quotes. Empty output becomes a placeholder.
pub fn coerce_text(raw: &str, hint: &str) -> Coerced<String> {
    let trimmed = raw.trim();
    let (outcome, body) = match extract_fenced(trimmed) {
        Some(body) if trimmed.starts_with("```") => (Outcome::Fenced, body.trim()),
        _ => (Outcome::Strict, trimmed),
    };

    let body = strip_wrapping_quotes(body).trim();
    if body.is_empty() {
        tracing::warn!(kind = "narrative", "Empty narrative; using placeholder");
        return Coerced {
            value: format!(
                "{} The story of {} could not be told this time.",
                PLACEHOLDER_MARKER,
                hint.trim()
            ),
            outcome: Outcome::Fallback,
        };
    }

    Coerced {
        value: body.to_string(),
        outcome,
    }
}

fn strip_wrapping_quotes(s: &str) -> &str {
    for (open, close) in [('"', '"'), ('\u{201c}', '\u{201d}')] {
        if s.len() > 1 && s.starts_with(open) && s.ends_with(close) {
            let inner = &s[open.len_utf8()..s.len() - close.len_utf8()];
            if !inner.contains(open) && !inner.contains(close) {
                return inner;
            }
        }
    }
    s
}

/// Body of the first fenced code block, skipping the language tag line
fn extract_fenced(content: &str) -> Option<&str> {
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];

    let body_start_rel = after_opening.find('\n')? + 1;
    let body_start = fence_start + 3 + body_start_rel;

    let closing = content[body_start..].find("```")?;
    let body_end = body_start + closing;

    if body_start >= body_end {
        return None;
    }

    Some(&content[body_start..body_end])
}

/// Non-overlapping balanced `{...}` / `[...]` substrings, in order
fn scan_balanced(content: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut offset = 0;

    while found.len() < MAX_SCAN_CANDIDATES {
        let Some(start) = content[offset..].find(['{', '[']) else {
            break;
        };
        let start = offset + start;
        match extract_balanced(&content[start..]) {
            Some(candidate) => {
                found.push(candidate);
                offset = start + candidate.len();
            }
            None => {
                // Unclosed opener: try the next one inside it
                let width = content[start..].chars().next().map_or(1, char::len_utf8);
                offset = start + width;
            }
        }
    }

    found
}

/// Balanced JSON value starting at position 0 of `s`.
///
/// Tracks nesting of both bracket kinds while ignoring brackets inside string
/// literals.
fn extract_balanced(s: &str) -> Option<&str> {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' | '[' if !in_string => stack.push(ch),
            '}' | ']' if !in_string => {
                let expected = if ch == '}' { '{' } else { '[' };
                if stack.pop() != Some(expected) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
        if i == 0 && stack.is_empty() {
            return None;
        }
    }
    None
}
