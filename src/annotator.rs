//! Message annotation
//!
//! Turns a detection result into the replacement message body plus the
//! inline button list. All user-supplied text that lands in the HTML body
//! is escaped; unescaped input would let anyone injecting `<b>`-style
//! markup through a chat message.

use crate::detector::Detection;
use crate::registry::{LinkRegistry, DEFAULT_LABEL};

/// Rendered replacement for an annotated message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// HTML body for the edited message
    pub body: String,
    /// (label, url) pairs in detection order
    pub buttons: Vec<(String, String)>,
}

/// Escape the HTML control characters Telegram parses in HTML mode
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Build the annotated body and button list for a detection.
///
/// Deterministic: same detection and registry state always produce the
/// same output, so re-running the pipeline over an already-edited message
/// is harmless.
pub fn render(detection: &Detection, registry: &LinkRegistry) -> Annotation {
    let mut body = format!("<b>{}</b>\n\n", escape_html(&detection.title));
    if let Some(code) = &detection.code {
        body.push_str(&format!("<b>Code:</b> {}\n\n", escape_html(code)));
    }
    body.push_str("<b>Links below:</b>");

    let buttons = detection
        .matched_urls
        .iter()
        .map(|url| {
            let label = registry
                .get(url)
                .map(|entry| entry.button_label().to_string())
                .unwrap_or_else(|| DEFAULT_LABEL.to_string());
            (label, url.clone())
        })
        .collect();

    Annotation { body, buttons }
}
