//! Segment to HTML rendering
//!
//! The only place formatted responses become markup. All text taken from
//! the model is escaped, so the output is safe to inject as-is. Stored turns
//! are re-rendered through here, so the tag mapping must stay stable.

use super::{FormattedSegment, Inline};
use std::fmt::Write;

/// Opening tag of inline code; its presence disables progressive reveal
pub const INLINE_CODE_OPEN: &str = "<code>";

/// Render segments to one HTML string, in order
pub fn render_html(segments: &[FormattedSegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        render_segment(segment, &mut out);
    }
    out
}

fn render_segment(segment: &FormattedSegment, out: &mut String) {
    match segment {
        FormattedSegment::Paragraph { content } => {
            out.push_str("<p>");
            render_inlines(content, out);
            out.push_str("</p>");
        }
        FormattedSegment::Heading { level, content } => {
            let _ = write!(out, "<h{level}>");
            render_inlines(content, out);
            let _ = write!(out, "</h{level}>");
        }
        FormattedSegment::CodeBlock {
            language,
            source,
            block_id,
        } => {
            let _ = write!(
                out,
                r#"<pre id="{}" data-language="{}"><code>{}</code></pre>"#,
                escape(block_id),
                escape(language),
                escape(source)
            );
        }
        FormattedSegment::LineBreak => out.push_str("<br/>"),
    }
}

fn render_inlines(spans: &[Inline], out: &mut String) {
    for span in spans {
        match span {
            Inline::Text(text) => out.push_str(&escape(text)),
            Inline::Code(text) => {
                out.push_str(INLINE_CODE_OPEN);
                out.push_str(&escape(text));
                out.push_str("</code>");
            }
            Inline::Strong(text) => {
                out.push_str("<strong>");
                out.push_str(&escape(text));
                out.push_str("</strong>");
            }
            Inline::Emphasis(text) => {
                out.push_str("<em>");
                out.push_str(&escape(text));
                out.push_str("</em>");
            }
        }
    }
}

/// Escape text for HTML element content and quoted attributes
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
