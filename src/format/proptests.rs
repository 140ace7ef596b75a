//! Property-based tests for the formatter
//!
//! - Formatting is total and never panics
//! - Structural bounds hold (heading levels, unique block ids)
//! - Stripping the rendered markup recovers the text content, including
//!   fenced code written on one line

use super::*;
use proptest::prelude::*;
use std::collections::HashSet;

// ============================================================================
// Helpers
// ============================================================================

/// Drop tags and decode entities, leaving the visible text
fn strip_markup(html: &str) -> String {
    let mut text = String::new();
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn alphanumeric(s: &str) -> String {
    s.chars().filter(|c| c.is_alphanumeric()).collect()
}

// ============================================================================
// Strategies
// ============================================================================

/// A line of prose with optional heading hashes and inline delimiters,
/// but no backticks (fences carry language tags outside the text content)
fn arb_markdown_line() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9 .,!?<>&'\"]{0,40}",
        ("#{1,6}", "[a-zA-Z0-9 ]{1,20}").prop_map(|(h, t)| format!("{h} {t}")),
        "[a-z ]{0,10}\\*\\*[a-z]{1,8}\\*\\*[a-z ]{0,10}",
        "[a-z ]{0,10}\\*[a-z]{1,8}\\*[a-z ]{0,10}",
        Just(String::new()),
    ]
}

fn arb_document() -> impl Strategy<Value = String> {
    proptest::collection::vec(arb_markdown_line(), 0..12).prop_map(|lines| lines.join("\n"))
}

/// A document piece paired with its visible text. Tags on multi-line
/// fences are presentation only, so they are left out of the visible text.
fn arb_piece() -> impl Strategy<Value = (String, String)> {
    let body = "[a-zA-Z0-9][a-zA-Z0-9 ]{0,20}";
    prop_oneof![
        arb_markdown_line().prop_map(|line| (line.clone(), line)),
        body.prop_map(|b| (format!("```{b}```"), b)),
        ("[a-z]{1,8}", body, "[a-z]{1,8}").prop_map(|(before, b, after)| (
            format!("{before} ```{b}``` {after}"),
            format!("{before}{b}{after}")
        )),
        ("[a-z]{1,8}", body).prop_map(|(lang, b)| (format!("```{lang}\n{b}\n```"), b)),
        body.prop_map(|b| (format!("```\n{b}\n```"), b)),
    ]
}

fn arb_document_with_fences() -> impl Strategy<Value = (String, String)> {
    proptest::collection::vec(arb_piece(), 0..8).prop_map(|pieces| {
        let doc = pieces.iter().map(|(d, _)| d.as_str()).collect::<Vec<_>>().join("\n");
        let visible = pieces.into_iter().map(|(_, v)| v).collect::<String>();
        (doc, visible)
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_format_is_total(input in any::<String>()) {
        let segments = format(&input);
        let _ = render_html(&segments);
    }

    #[test]
    fn prop_format_is_total_on_delimiter_soup(input in "[`*#\\n\\r a-z]{0,200}") {
        let segments = format(&input);
        for segment in &segments {
            if let FormattedSegment::Heading { level, .. } = segment {
                prop_assert!((1..=6).contains(level));
            }
        }
        let ids: Vec<_> = segments
            .iter()
            .filter_map(|s| match s {
                FormattedSegment::CodeBlock { block_id, .. } => Some(block_id.clone()),
                _ => None,
            })
            .collect();
        let unique: HashSet<_> = ids.iter().collect();
        prop_assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn prop_plain_lines_round_trip(lines in proptest::collection::vec("[a-zA-Z0-9 .,!?<>&'\"]{0,40}", 0..10)) {
        let input = lines.join("\r\n");
        let recovered = strip_markup(&render_html(&format(&input)));
        let expected: String = lines.iter().map(|l| l.trim()).collect();
        prop_assert_eq!(recovered, expected);
    }

    #[test]
    fn prop_text_content_survives_formatting(doc in arb_document()) {
        let recovered = strip_markup(&render_html(&format(&doc)));
        prop_assert_eq!(alphanumeric(&recovered), alphanumeric(&doc));
    }

    #[test]
    fn prop_fence_content_survives_formatting((doc, visible) in arb_document_with_fences()) {
        let recovered = strip_markup(&render_html(&format(&doc)));
        prop_assert_eq!(alphanumeric(&recovered), alphanumeric(&visible));
    }

    #[test]
    fn prop_fenced_block_is_one_code_segment(
        lang in "[a-z]{1,8}",
        body in "[a-zA-Z0-9 =;(){}]{1,60}",
    ) {
        let input = format!("```{lang}\n{body}\n```");
        let segments = format(&input);
        prop_assert_eq!(segments.len(), 1);
        match &segments[0] {
            FormattedSegment::CodeBlock { language, source, .. } => {
                prop_assert_eq!(language, &lang);
                prop_assert_eq!(source.as_str(), body.trim());
            }
            other => prop_assert!(false, "expected code block, got {:?}", other),
        }
    }

    #[test]
    fn prop_segment_order_follows_source(
        before in "[a-z]{1,10}",
        body in "[a-z]{1,10}",
        after in "[a-z]{1,10}",
    ) {
        let segments = format(&format!("{before}\n```\n{body}\n```\n{after}"));
        prop_assert_eq!(segments.len(), 3);
        prop_assert_eq!(
            &segments[0],
            &FormattedSegment::Paragraph { content: vec![Inline::Text(before)] }
        );
        prop_assert!(segments[1].is_code_block());
        prop_assert_eq!(
            &segments[2],
            &FormattedSegment::Paragraph { content: vec![Inline::Text(after)] }
        );
    }
}
