//! Inline spans within headings and paragraphs
//!
//! Three passes run in a fixed order: code spans, then bold, then italic.
//! Each pass only scans the plain-text spans left over by the passes before
//! it, so the inside of a code span is never read as emphasis. Spans do not
//! nest.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// A run of text inside a heading or paragraph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum Inline {
    Text(String),
    Code(String),
    Strong(String),
    Emphasis(String),
}

impl Inline {
    /// The span's text without any delimiters
    #[allow(dead_code)] // Used in tests
    pub fn as_str(&self) -> &str {
        match self {
            Inline::Text(s) | Inline::Code(s) | Inline::Strong(s) | Inline::Emphasis(s) => s,
        }
    }
}

static CODE: OnceLock<Regex> = OnceLock::new();
static STRONG: OnceLock<Regex> = OnceLock::new();
static EMPHASIS: OnceLock<Regex> = OnceLock::new();

/// Split a line into inline spans
pub fn parse(line: &str) -> Vec<Inline> {
    let code = CODE.get_or_init(|| Regex::new(r"`([^`]+)`").expect("valid code span pattern"));
    let strong =
        STRONG.get_or_init(|| Regex::new(r"\*\*([^*]+)\*\*").expect("valid bold pattern"));
    let emphasis =
        EMPHASIS.get_or_init(|| Regex::new(r"\*([^*]+)\*").expect("valid italic pattern"));

    let spans = vec![Inline::Text(line.to_string())];
    let spans = apply_pass(spans, code, Inline::Code);
    let spans = apply_pass(spans, strong, Inline::Strong);
    apply_pass(spans, emphasis, Inline::Emphasis)
}

fn apply_pass(spans: Vec<Inline>, pattern: &Regex, wrap: fn(String) -> Inline) -> Vec<Inline> {
    let mut out = Vec::with_capacity(spans.len());
    for span in spans {
        match span {
            Inline::Text(text) => split_text(&text, pattern, wrap, &mut out),
            other => out.push(other),
        }
    }
    out
}

fn split_text(text: &str, pattern: &Regex, wrap: fn(String) -> Inline, out: &mut Vec<Inline>) {
    let mut last_end = 0;
    for caps in pattern.captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last_end {
            out.push(Inline::Text(text[last_end..whole.start()].to_string()));
        }
        out.push(wrap(inner.as_str().to_string()));
        last_end = whole.end();
    }
    if last_end < text.len() {
        out.push(Inline::Text(text[last_end..].to_string()));
    }
}
