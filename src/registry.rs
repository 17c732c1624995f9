//! Referral link registry
//!
//! In-memory table of tracked URL -> label entries. Insertion order is
//! preserved so that listing output and button ordering are deterministic.
//! All mutation goes through the typed operations here; persistence is the
//! store's job (see `store.rs`).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default button label when an entry has no usable label
pub const DEFAULT_LABEL: &str = "Sign Up Now";

/// Registry errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Invalid URL: must start with http:// or https://")]
    InvalidUrl,
    #[error("URL not found in database")]
    NotFound,
}

/// A single tracked referral link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEntry {
    pub url: String,
    pub label: String,
}

impl LinkEntry {
    /// Button label for this entry, falling back to the default
    pub fn button_label(&self) -> &str {
        if self.label.is_empty() {
            DEFAULT_LABEL
        } else {
            &self.label
        }
    }
}

/// Check that a URL carries an accepted scheme prefix
pub fn is_valid_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Insertion-ordered mapping of tracked URLs to their entries
#[derive(Debug, Clone, Default)]
pub struct LinkRegistry {
    entries: IndexMap<String, LinkEntry>,
}

impl LinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from (url, label) pairs, preserving order.
    /// Invalid URLs are skipped; used by the store's fail-soft load.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut registry = Self::new();
        for (url, label) in pairs {
            let _ = registry.add(&url, &label);
        }
        registry
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add or overwrite an entry. Overwriting keeps the original insertion
    /// position and only updates the label (last-write-wins).
    pub fn add(&mut self, url: &str, label: &str) -> Result<(), RegistryError> {
        if !is_valid_url(url) {
            return Err(RegistryError::InvalidUrl);
        }
        self.entries.insert(
            url.to_string(),
            LinkEntry {
                url: url.to_string(),
                label: label.to_string(),
            },
        );
        Ok(())
    }

    pub fn remove(&mut self, url: &str) -> Result<LinkEntry, RegistryError> {
        // shift_remove keeps the remaining entries in insertion order
        self.entries
            .shift_remove(url)
            .ok_or(RegistryError::NotFound)
    }

    /// Update the button label of an existing entry
    pub fn relabel(&mut self, url: &str, label: &str) -> Result<(), RegistryError> {
        match self.entries.get_mut(url) {
            Some(entry) => {
                entry.label = label.to_string();
                Ok(())
            }
            None => Err(RegistryError::NotFound),
        }
    }

    pub fn get(&self, url: &str) -> Option<&LinkEntry> {
        self.entries.get(url)
    }

    /// All entries in insertion order
    pub fn list(&self) -> impl Iterator<Item = &LinkEntry> {
        self.entries.values()
    }

    /// Every registered URL that occurs as a literal substring of `text`,
    /// in registry iteration order. No normalization: scheme case, trailing
    /// slashes and query strings are all significant. Keys are unique, so
    /// the result is dedup-by-construction.
    pub fn find_in(&self, text: &str) -> Vec<String> {
        self.entries
            .keys()
            .filter(|url| text.contains(url.as_str()))
            .cloned()
            .collect()
    }

    /// (url, label) view for serialization
    pub fn iter_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(url, entry)| (url.as_str(), entry.label.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LinkRegistry {
        let mut r = LinkRegistry::new();
        r.add("https://x.com/ref1", "X").unwrap();
        r.add("https://y.com/ref2", "Y").unwrap();
        r.add("http://z.com", "Z").unwrap();
        r
    }

    #[test]
    fn test_add_then_get() {
        let mut r = LinkRegistry::new();
        r.add("https://example.com/ref", "Example").unwrap();
        let entry = r.get("https://example.com/ref").unwrap();
        assert_eq!(entry.url, "https://example.com/ref");
        assert_eq!(entry.label, "Example");
    }

    #[test]
    fn test_add_rejects_bad_scheme() {
        let mut r = LinkRegistry::new();
        assert_eq!(r.add("ftp://example.com", "Bad"), Err(RegistryError::InvalidUrl));
        assert_eq!(r.add("example.com", "Bad"), Err(RegistryError::InvalidUrl));
        assert!(r.is_empty());
    }

    #[test]
    fn test_add_overwrites_label_keeps_position() {
        let mut r = sample();
        r.add("https://x.com/ref1", "New X").unwrap();
        assert_eq!(r.len(), 3);
        let urls: Vec<&str> = r.list().map(|e| e.url.as_str()).collect();
        assert_eq!(urls, vec!["https://x.com/ref1", "https://y.com/ref2", "http://z.com"]);
        assert_eq!(r.get("https://x.com/ref1").unwrap().label, "New X");
    }

    #[test]
    fn test_remove_missing_is_not_found() {
        let mut r = sample();
        assert_eq!(r.remove("https://nope.com").unwrap_err(), RegistryError::NotFound);
        assert_eq!(r.len(), 3);
    }

    #[test]
    fn test_remove_preserves_order_of_rest() {
        let mut r = sample();
        r.remove("https://y.com/ref2").unwrap();
        let urls: Vec<&str> = r.list().map(|e| e.url.as_str()).collect();
        assert_eq!(urls, vec!["https://x.com/ref1", "http://z.com"]);
    }

    #[test]
    fn test_relabel() {
        let mut r = sample();
        r.relabel("http://z.com", "Zed").unwrap();
        assert_eq!(r.get("http://z.com").unwrap().label, "Zed");
        assert_eq!(
            r.relabel("https://missing.com", "M").unwrap_err(),
            RegistryError::NotFound
        );
    }

    #[test]
    fn test_find_in_registry_order() {
        let r = sample();
        // text mentions y before x; result stays in registry order
        let text = "check https://y.com/ref2 and https://x.com/ref1 today";
        assert_eq!(
            r.find_in(text),
            vec!["https://x.com/ref1".to_string(), "https://y.com/ref2".to_string()]
        );
    }

    #[test]
    fn test_find_in_no_normalization() {
        let r = sample();
        // different query string is a different URL
        assert!(r.find_in("https://x.com/ref1?utm=1").len() == 1); // substring still hits
        assert!(r.find_in("https://X.com/ref1").is_empty()); // case matters
    }

    #[test]
    fn test_button_label_fallback() {
        let entry = LinkEntry {
            url: "https://a.com".into(),
            label: String::new(),
        };
        assert_eq!(entry.button_label(), DEFAULT_LABEL);
    }
}
