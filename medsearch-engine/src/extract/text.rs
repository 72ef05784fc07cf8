//! Text clean-up shared by every extraction pass.

use scraper::{ElementRef, Html};

/// Longest snippet kept, in characters, including the ellipsis.
pub const SNIPPET_MAX_CHARS: usize = 300;

const ELLIPSIS: &str = "...";

/// Collapse every run of whitespace (newlines included) into one space.
pub fn normalize_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut pending_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            pending_space = !result.is_empty();
        } else {
            if pending_space {
                result.push(' ');
                pending_space = false;
            }
            result.push(ch);
        }
    }
    result
}

/// Normalize whitespace and cut to [`SNIPPET_MAX_CHARS`] characters.
///
/// Long text keeps its first 297 characters followed by `...`.
pub fn snippet(text: &str) -> String {
    let normalized = normalize_whitespace(text);
    if normalized.chars().count() <= SNIPPET_MAX_CHARS {
        return normalized;
    }
    let keep = SNIPPET_MAX_CHARS - ELLIPSIS.len();
    let mut truncated: String = normalized.chars().take(keep).collect();
    truncated.truncate(truncated.trim_end().len());
    truncated.push_str(ELLIPSIS);
    truncated
}

/// Elements whose boundaries separate words; inline markup does not.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol",
    "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// All text under `element`, whitespace-normalized.
///
/// Text nodes are concatenated as-is; a space is inserted only at
/// block-element boundaries, so `Meth<b>otrexate</b>.` stays one word.
pub fn element_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(element, &mut raw);
    normalize_whitespace(&raw)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_element) = ElementRef::wrap(child) {
            let block = BLOCK_TAGS.contains(&child_element.value().name());
            if block {
                out.push(' ');
            }
            collect_text(child_element, out);
            if block {
                out.push(' ');
            }
        }
    }
}

/// Text content of an HTML fragment, for API fields that carry markup.
pub fn strip_markup(fragment: &str) -> String {
    if !fragment.contains('<') {
        return normalize_whitespace(fragment);
    }
    let parsed = Html::parse_fragment(fragment);
    element_text(parsed.root_element())
}
