//! Visible-text extraction from HTML documents.
//!
//! Produces plain text in document order, one trimmed text block per line,
//! with non-visible subtrees (scripts, styles, head) left out.

use scraper::{Html, Selector};

/// Element names whose text content is never visible on the page.
const NON_VISIBLE: [&str; 5] = ["script", "style", "noscript", "template", "head"];

/// Extract the visible text of an HTML document.
///
/// Text nodes are trimmed and joined with newlines, preserving reading
/// order. Returns an empty string for documents with no visible text.
pub fn extract_text(html: &str) -> String {
    let doc = Html::parse_document(html);

    let body_sel = Selector::parse("body").unwrap();
    let root = match doc.select(&body_sel).next() {
        Some(body) => body,
        None => doc.root_element(),
    };

    let mut blocks: Vec<String> = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|el| NON_VISIBLE.contains(&el.name()))
        });
        if hidden {
            continue;
        }

        let trimmed = text.trim();
        if !trimmed.is_empty() {
            blocks.push(trimmed.to_string());
        }
    }

    blocks.join("\n")
}
