//! Readable-Text Extraction
//!
//! Turns fetched HTML into plain text. The extractor is a replaceable
//! collaborator behind a trait; the default drops non-content markup and
//! strips tags. Also hosts the whitespace-normalization helpers shared by
//! fetch and the summarizer.

use regex::Regex;

/// Output of a readability pass.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub title: Option<String>,
    pub text: String,
}

/// Extracts readable text from an HTML document.
pub trait ReadabilityExtractor: Send + Sync {
    fn extract(&self, html: &str) -> Extraction;
}

/// Default extractor: drops `head`/`script`/`style`/comments, breaks on
/// block-level close tags, strips the remaining markup, and decodes the
/// common entities.
pub struct TagStripExtractor {
    title: Regex,
    drop_blocks: Regex,
    block_breaks: Regex,
    tags: Regex,
}

impl TagStripExtractor {
    pub fn new() -> Self {
        Self {
            title: Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title regex"),
            drop_blocks: Regex::new(
                r"(?is)<script[^>]*>.*?</script>|<style[^>]*>.*?</style>|<head[^>]*>.*?</head>|<noscript[^>]*>.*?</noscript>|<svg[^>]*>.*?</svg>|<template[^>]*>.*?</template>|<!--.*?-->",
            )
            .expect("drop regex"),
            block_breaks: Regex::new(r"(?i)</(p|div|li|h[1-6]|tr|section|article|blockquote)>|<br\s*/?>")
                .expect("break regex"),
            tags: Regex::new(r"(?s)<[^>]+>").expect("tag regex"),
        }
    }
}

impl Default for TagStripExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadabilityExtractor for TagStripExtractor {
    fn extract(&self, html: &str) -> Extraction {
        let title = self
            .title
            .captures(html)
            .and_then(|c| c.get(1))
            .map(|m| collapse_spaces(&decode_entities(m.as_str())))
            .filter(|t| !t.is_empty());

        let body = self.drop_blocks.replace_all(html, " ");
        let body = self.block_breaks.replace_all(&body, "\n");
        let body = self.tags.replace_all(&body, " ");
        let text = normalize_whitespace(&decode_entities(&body));

        Extraction { title, text }
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

/// Collapse every whitespace run to a single space and trim.
pub fn collapse_spaces(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            in_space = true;
        } else {
            if in_space && !out.is_empty() {
                out.push(' ');
            }
            in_space = false;
            out.push(ch);
        }
    }
    out
}

/// Normalize line endings, collapse tab/space runs to one space, and cap
/// blank-line runs at one empty line.
pub fn normalize_whitespace(text: &str) -> String {
    let unified = text.replace("\r\n", "\n");

    let mut lines: Vec<String> = Vec::new();
    for line in unified.split('\n') {
        let mut collapsed = String::with_capacity(line.len());
        let mut in_space = false;
        for ch in line.chars() {
            if ch == ' ' || ch == '\t' {
                in_space = true;
            } else {
                if in_space && !collapsed.is_empty() {
                    collapsed.push(' ');
                }
                in_space = false;
                collapsed.push(ch);
            }
        }
        lines.push(collapsed);
    }

    let mut out = String::with_capacity(unified.len());
    let mut blank_run = 0usize;
    for line in &lines {
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line);
    }
    out.trim().to_string()
}

/// Truncate to at most `max_chars` characters on a char boundary.
/// Returns the (possibly shortened) text and whether truncation happened.
pub fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    if text.chars().count() <= max_chars {
        return (text.to_string(), false);
    }
    (text.chars().take(max_chars).collect(), true)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_title_and_body_text() {
        let html = "<html><head><title>My Page</title><style>p{}</style></head>\
<body><p>First paragraph.</p><p>Second &amp; last.</p>\
<script>alert(1)</script></body></html>";
        let extraction = TagStripExtractor::new().extract(html);
        assert_eq!(extraction.title.as_deref(), Some("My Page"));
        assert!(extraction.text.contains("First paragraph."));
        assert!(extraction.text.contains("Second & last."));
        assert!(!extraction.text.contains("alert"));
    }

    #[test]
    fn block_ends_become_line_breaks() {
        let html = "<body><h1>Heading</h1><p>Body</p></body>";
        let extraction = TagStripExtractor::new().extract(html);
        assert_eq!(extraction.text, "Heading\nBody");
    }

    #[test]
    fn collapse_spaces_flattens_everything() {
        assert_eq!(collapse_spaces("  a\t\tb \n c  "), "a b c");
    }

    #[test]
    fn normalize_keeps_paragraph_breaks() {
        let input = "line one\r\n\r\n\r\n\r\nline\t\ttwo   indeed";
        assert_eq!(normalize_whitespace(input), "line one\n\nline two indeed");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let (text, truncated) = truncate_chars("héllo wörld", 5);
        assert!(truncated);
        assert_eq!(text, "héllo");

        let (text, truncated) = truncate_chars("short", 10);
        assert!(!truncated);
        assert_eq!(text, "short");
    }
}
