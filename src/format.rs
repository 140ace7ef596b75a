//! Response formatting
//!
//! Turns raw model output into an ordered sequence of [`FormattedSegment`]s:
//! fenced code blocks, headings, paragraphs with inline spans, and line
//! breaks. Formatting is total: every input string, including empty or
//! malformed ones, yields a segment sequence. Nothing in this module emits
//! markup; see [`render`] for the presentation side.

mod inline;
pub mod render;

#[cfg(test)]
mod proptests;

pub use inline::Inline;
pub use render::render_html;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Language recorded for fences that carry no tag
pub const DEFAULT_LANGUAGE: &str = "text";

/// One structural piece of a formatted response, in source order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FormattedSegment {
    Paragraph {
        content: Vec<Inline>,
    },
    Heading {
        /// 1 through 6, the number of leading hashes
        level: u8,
        content: Vec<Inline>,
    },
    CodeBlock {
        language: String,
        source: String,
        /// Unique within one `format` call; targets the copy affordance
        block_id: String,
    },
    LineBreak,
}

impl FormattedSegment {
    pub fn is_code_block(&self) -> bool {
        matches!(self, FormattedSegment::CodeBlock { .. })
    }
}

static FENCE: OnceLock<Regex> = OnceLock::new();
static HEADING: OnceLock<Regex> = OnceLock::new();

fn fence_pattern() -> &'static Regex {
    // A tag counts only when it ends the fence line; ```ls``` is code "ls"
    FENCE.get_or_init(|| {
        Regex::new(r"```(?:(\w+)[ \t]*\n)?\n?([\s\S]*?)```").expect("valid fence pattern")
    })
}

fn heading_pattern() -> &'static Regex {
    HEADING.get_or_init(|| Regex::new(r"^(#{1,6})\s+(.*)$").expect("valid heading pattern"))
}

/// Format raw model text into segments.
///
/// An opening fence without a closing one is not a code block: the fence
/// line and everything after it go through line classification as plain
/// text.
pub fn format(raw: &str) -> Vec<FormattedSegment> {
    let text = raw.replace("\r\n", "\n");
    let mut segments = Vec::new();
    let mut last_end = 0;
    let mut block_count = 0usize;

    for caps in fence_pattern().captures_iter(&text) {
        let Some(whole) = caps.get(0) else { continue };

        let before = &text[last_end..whole.start()];
        let before = before.strip_suffix('\n').unwrap_or(before);
        let before = if last_end > 0 {
            before.strip_prefix('\n').unwrap_or(before)
        } else {
            before
        };
        push_lines(&mut segments, before);

        let language = caps
            .get(1)
            .map_or(DEFAULT_LANGUAGE, |m| m.as_str())
            .to_string();
        let source = caps.get(2).map_or("", |m| m.as_str()).trim().to_string();

        segments.push(FormattedSegment::CodeBlock {
            language,
            source,
            block_id: format!("code-{block_count}"),
        });
        block_count += 1;
        last_end = whole.end();
    }

    let rest = &text[last_end..];
    let rest = if last_end > 0 {
        rest.strip_prefix('\n').unwrap_or(rest)
    } else {
        rest
    };
    push_lines(&mut segments, rest);

    segments
}

/// Classify each line of a fence-free chunk
fn push_lines(segments: &mut Vec<FormattedSegment>, chunk: &str) {
    if chunk.is_empty() {
        return;
    }
    segments.extend(chunk.split('\n').map(classify_line));
}

fn classify_line(line: &str) -> FormattedSegment {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return FormattedSegment::LineBreak;
    }

    if let Some(caps) = heading_pattern().captures(trimmed) {
        let hashes = caps.get(1).map_or(0, |m| m.len());
        let title = caps.get(2).map_or("", |m| m.as_str());
        // #{1,6} bounds the count, so the cast cannot truncate
        #[allow(clippy::cast_possible_truncation)]
        let level = hashes as u8;
        return FormattedSegment::Heading {
            level,
            content: inline::parse(title),
        };
    }

    FormattedSegment::Paragraph {
        content: inline::parse(trimmed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Inline {
        Inline::Text(s.to_string())
    }

    #[test]
    fn test_fenced_block_with_language() {
        let segments = format("```js\ncode\n```");
        assert_eq!(
            segments,
            vec![FormattedSegment::CodeBlock {
                language: "js".to_string(),
                source: "code".to_string(),
                block_id: "code-0".to_string(),
            }]
        );
    }

    #[test]
    fn test_fence_without_language_defaults_to_text() {
        let segments = format("```\n  let x = 1;  \n```");
        match &segments[..] {
            [FormattedSegment::CodeBlock { language, source, .. }] => {
                assert_eq!(language, DEFAULT_LANGUAGE);
                assert_eq!(source, "let x = 1;");
            }
            other => panic!("Expected a single code block, got {other:?}"),
        }
    }

    #[test]
    fn test_heading_levels() {
        assert_eq!(
            format("### Title"),
            vec![FormattedSegment::Heading {
                level: 3,
                content: vec![text("Title")],
            }]
        );
        assert_eq!(
            format("###### Deep"),
            vec![FormattedSegment::Heading {
                level: 6,
                content: vec![text("Deep")],
            }]
        );
    }

    #[test]
    fn test_seven_hashes_is_a_paragraph() {
        assert_eq!(
            format("####### Too deep"),
            vec![FormattedSegment::Paragraph {
                content: vec![text("####### Too deep")],
            }]
        );
    }

    #[test]
    fn test_hash_without_space_is_a_paragraph() {
        assert_eq!(
            format("#hashtag"),
            vec![FormattedSegment::Paragraph {
                content: vec![text("#hashtag")],
            }]
        );
    }

    #[test]
    fn test_blank_lines_become_line_breaks() {
        let segments = format("first\n\n   \nsecond");
        assert_eq!(
            segments,
            vec![
                FormattedSegment::Paragraph {
                    content: vec![text("first")]
                },
                FormattedSegment::LineBreak,
                FormattedSegment::LineBreak,
                FormattedSegment::Paragraph {
                    content: vec![text("second")]
                },
            ]
        );
    }

    #[test]
    fn test_crlf_is_normalized() {
        assert_eq!(format("a\r\nb"), format("a\nb"));
    }

    #[test]
    fn test_empty_input_yields_no_segments() {
        assert!(format("").is_empty());
    }

    #[test]
    fn test_code_block_between_paragraphs_keeps_order() {
        let segments = format("Intro\n```python\nprint(1)\n```\nOutro");
        assert_eq!(segments.len(), 3);
        assert_eq!(
            segments[0],
            FormattedSegment::Paragraph {
                content: vec![text("Intro")]
            }
        );
        assert!(segments[1].is_code_block());
        assert_eq!(
            segments[2],
            FormattedSegment::Paragraph {
                content: vec![text("Outro")]
            }
        );
    }

    #[test]
    fn test_block_ids_are_unique_within_a_call() {
        let segments = format("```a\n1\n```\n```b\n2\n```\n```\n3\n```");
        let ids: Vec<&str> = segments
            .iter()
            .filter_map(|s| match s {
                FormattedSegment::CodeBlock { block_id, .. } => Some(block_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec!["code-0", "code-1", "code-2"]);
    }

    #[test]
    fn test_unterminated_fence_falls_back_to_lines() {
        let segments = format("```rust\nfn main() {}\n## Still a heading");
        assert_eq!(
            segments,
            vec![
                FormattedSegment::Paragraph {
                    content: vec![text("```rust")]
                },
                FormattedSegment::Paragraph {
                    content: vec![text("fn main() {}")]
                },
                FormattedSegment::Heading {
                    level: 2,
                    content: vec![text("Still a heading")]
                },
            ]
        );
    }

    #[test]
    fn test_single_line_fence_keeps_its_content() {
        let segments = format("Run ```ls``` to list");
        assert_eq!(
            segments,
            vec![
                FormattedSegment::Paragraph {
                    content: vec![text("Run")]
                },
                FormattedSegment::CodeBlock {
                    language: DEFAULT_LANGUAGE.to_string(),
                    source: "ls".to_string(),
                    block_id: "code-0".to_string(),
                },
                FormattedSegment::Paragraph {
                    content: vec![text("to list")]
                },
            ]
        );
        assert!(render_html(&segments).contains("<code>ls</code>"));
    }

    #[test]
    fn test_tag_followed_by_code_on_same_line_is_source() {
        match &format("```js console.log(1)```")[..] {
            [FormattedSegment::CodeBlock { language, source, .. }] => {
                assert_eq!(language, DEFAULT_LANGUAGE);
                assert_eq!(source, "js console.log(1)");
            }
            other => panic!("Expected a single code block, got {other:?}"),
        }
    }

    #[test]
    fn test_heading_text_gets_inline_spans() {
        assert_eq!(
            format("## Using `cargo`"),
            vec![FormattedSegment::Heading {
                level: 2,
                content: vec![text("Using "), Inline::Code("cargo".to_string())],
            }]
        );
    }

    #[test]
    fn test_segment_json_shape() {
        let json = serde_json::to_value(FormattedSegment::LineBreak).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "line_break" }));

        let json = serde_json::to_value(&format("```sh\nls\n```")[0]).unwrap();
        assert_eq!(json["type"], "code_block");
        assert_eq!(json["language"], "sh");
        assert_eq!(json["block_id"], "code-0");
    }
}
