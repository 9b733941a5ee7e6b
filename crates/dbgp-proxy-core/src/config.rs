//! Proxy configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::gate::DEFAULT_EVENT_CAPACITY;

/// Children per page assumed when the engine does not say (DBGp `max_children`).
pub const DEFAULT_PAGE_SIZE: u32 = 32;

/// Longest string description before truncation.
pub const DEFAULT_MAX_STRING_LENGTH: usize = 512;

/// Settings for a cache session. Every field has a default, so an empty
/// JSON object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    /// Page size used for child references when a property omits `pagesize`.
    pub default_page_size: u32,
    /// String values longer than this are truncated in descriptions.
    pub max_string_length: usize,
    /// Buffered gate events per subscriber. Clamped to
    /// [`MAX_EVENT_CAPACITY`](crate::gate::MAX_EVENT_CAPACITY) when the
    /// gate is created.
    pub event_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_string_length: DEFAULT_MAX_STRING_LENGTH,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl CacheConfig {
    /// Parse a JSON configuration.
    ///
    /// # Errors
    /// Returns error if the JSON is invalid or has wrongly typed fields.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load a JSON configuration file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json).map_err(std::io::Error::other)
    }

    /// Override the default page size. Zero is clamped to one.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.default_page_size = page_size.max(1);
        self
    }
}
