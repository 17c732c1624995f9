//! Durable storage for the link registry
//!
//! The on-disk format is a JSON object keyed by URL, each value holding at
//! least a `label` field, pretty-printed with non-ASCII preserved:
//!
//! ```json
//! {
//!   "https://example.com/ref": {
//!     "label": "Sign Up"
//!   }
//! }
//! ```
//!
//! Loading fails soft: a missing or corrupt file yields an empty registry
//! so the bot always starts. Saving replaces the file atomically via a
//! temp-file-then-rename so a crash mid-write never leaves a truncated
//! file behind.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::registry::LinkRegistry;

/// Store errors. Both variants are advisory to callers: a failed save is
/// logged and the in-memory registry stands.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Per-URL record as persisted on disk
#[derive(Debug, Serialize, Deserialize)]
struct StoredLink {
    label: String,
}

/// File-backed registry store
#[derive(Debug, Clone)]
pub struct LinkStore {
    path: PathBuf,
}

impl LinkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the registry from disk. Any read or parse failure is logged
    /// and produces an empty registry instead of an error.
    pub fn load(&self) -> LinkRegistry {
        if !self.path.exists() {
            tracing::info!(
                "Links file {:?} not found, starting with empty database",
                self.path
            );
            return LinkRegistry::new();
        }
        match self.try_load() {
            Ok(registry) => {
                tracing::info!("Loaded {} links from {:?}", registry.len(), self.path);
                registry
            }
            Err(e) => {
                tracing::error!("Error loading links from {:?}: {}", self.path, e);
                LinkRegistry::new()
            }
        }
    }

    fn try_load(&self) -> Result<LinkRegistry, StoreError> {
        let data = std::fs::read_to_string(&self.path)?;
        let stored: IndexMap<String, StoredLink> = serde_json::from_str(&data)?;
        Ok(LinkRegistry::from_pairs(
            stored.into_iter().map(|(url, link)| (url, link.label)),
        ))
    }

    /// Serialize the full registry and atomically replace the target file.
    pub fn save(&self, registry: &LinkRegistry) -> Result<(), StoreError> {
        let stored: IndexMap<&str, StoredLink> = registry
            .iter_pairs()
            .map(|(url, label)| {
                (
                    url,
                    StoredLink {
                        label: label.to_string(),
                    },
                )
            })
            .collect();
        let json = serde_json::to_string_pretty(&stored)?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json.as_bytes())?;
        std::fs::rename(&tmp, &self.path)?;

        tracing::info!("Saved {} links to {:?}", registry.len(), self.path);
        Ok(())
    }
}
