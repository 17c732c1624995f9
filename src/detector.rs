//! Referral link detection
//!
//! Scans free-form message text for registered URLs and pulls out an
//! optional referral code. Matching is literal substring containment
//! against the registry keys; the match list keeps registry iteration
//! order so downstream button ordering is deterministic.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::registry::LinkRegistry;

/// Title used when the message has no content to take a first line from
pub const FALLBACK_TITLE: &str = "Referral Links";

/// `code`, optionally followed by colons/whitespace, then the code run.
/// Case-insensitive; the code alphabet is letters, digits, `@`, `_`, `-`.
static CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)code[:\s]*([A-Za-z0-9@_-]+)").expect("valid code regex"));

/// Result of scanning one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    /// Registered URLs found in the text, in registry order
    pub matched_urls: Vec<String>,
    /// First referral code in the text, if any
    pub code: Option<String>,
    /// First line of the text
    pub title: String,
}

/// Scan `text` against the registry. Returns `None` when there is nothing
/// to annotate: empty text, empty registry, or no registered URL present.
pub fn detect(text: &str, registry: &LinkRegistry) -> Option<Detection> {
    if text.is_empty() || registry.is_empty() {
        return None;
    }

    let matched_urls = registry.find_in(text);
    if matched_urls.is_empty() {
        return None;
    }

    let code = CODE_RE
        .captures(text)
        .map(|caps| caps[1].to_string());

    // An empty first line counts as no title and takes the fallback too,
    // so the annotation header is never blank.
    let title = text
        .lines()
        .next()
        .filter(|line| !line.is_empty())
        .unwrap_or(FALLBACK_TITLE)
        .to_string();

    Some(Detection {
        matched_urls,
        code,
        title,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(urls: &[(&str, &str)]) -> LinkRegistry {
        let mut r = LinkRegistry::new();
        for (url, label) in urls {
            r.add(url, label).unwrap();
        }
        r
    }

    #[test]
    fn test_detects_url_and_code() {
        let r = registry_with(&[("https://x.com", "X")]);
        let d = detect("Join now! code: ABC123 https://x.com", &r).unwrap();
        assert_eq!(d.matched_urls, vec!["https://x.com".to_string()]);
        assert_eq!(d.code.as_deref(), Some("ABC123"));
        assert_eq!(d.title, "Join now! code: ABC123 https://x.com");
    }

    #[test]
    fn test_no_registered_url_is_no_match() {
        let r = registry_with(&[("https://x.com", "X")]);
        assert!(detect("nothing to see here", &r).is_none());
    }

    #[test]
    fn test_empty_text_and_empty_registry() {
        let r = registry_with(&[("https://x.com", "X")]);
        assert!(detect("", &r).is_none());
        assert!(detect("https://x.com", &LinkRegistry::new()).is_none());
    }

    #[test]
    fn test_code_variants() {
        let r = registry_with(&[("https://x.com", "X")]);
        // colon, whitespace, neither, mixed case
        for text in [
            "https://x.com code:REF-9",
            "https://x.com code REF-9",
            "https://x.com codeREF-9",
            "https://x.com CODE: REF-9",
        ] {
            let d = detect(text, &r).unwrap();
            assert_eq!(d.code.as_deref(), Some("REF-9"), "text: {text}");
        }
    }

    #[test]
    fn test_code_alphabet_boundary() {
        let r = registry_with(&[("https://x.com", "X")]);
        let d = detect("use code: my_ref@site-1! at https://x.com", &r).unwrap();
        // '!' terminates the run
        assert_eq!(d.code.as_deref(), Some("my_ref@site-1"));
    }

    #[test]
    fn test_first_code_wins() {
        let r = registry_with(&[("https://x.com", "X")]);
        let d = detect("code: FIRST then code: SECOND https://x.com", &r).unwrap();
        assert_eq!(d.code.as_deref(), Some("FIRST"));
    }

    #[test]
    fn test_no_code_is_none() {
        let r = registry_with(&[("https://x.com", "X")]);
        let d = detect("plain promo https://x.com", &r).unwrap();
        assert_eq!(d.code, None);
    }

    #[test]
    fn test_multiline_title_is_first_line() {
        let r = registry_with(&[("https://x.com", "X")]);
        let d = detect("Big promo!\nhttps://x.com\nmore text", &r).unwrap();
        assert_eq!(d.title, "Big promo!");
    }

    #[test]
    fn test_empty_first_line_takes_fallback_title() {
        let r = registry_with(&[("https://x.com", "X")]);
        let d = detect("\nhttps://x.com", &r).unwrap();
        assert_eq!(d.title, FALLBACK_TITLE);
    }

    #[test]
    fn test_matches_in_registry_order_not_text_order() {
        let r = registry_with(&[("https://a.com", "A"), ("https://b.com", "B")]);
        let d = detect("see https://b.com before https://a.com", &r).unwrap();
        assert_eq!(
            d.matched_urls,
            vec!["https://a.com".to_string(), "https://b.com".to_string()]
        );
    }
}
