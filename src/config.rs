//! Context configuration
//!
//! Loaded once when a [`Context`](crate::Context) is created, either built in
//! code or read from a TOML file:
//!
//! ```toml
//! max_resident_pages = 256
//! verify_checksums = true
//! ```

use crate::error::{LotooError, Result};
use crate::header::{EOCD_SIZE, MAX_COMMENT_LEN};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;

/// Default number of trailing bytes scanned for the end of central directory
pub const DEFAULT_EOCD_SEARCH_LIMIT: usize = EOCD_SIZE + MAX_COMMENT_LEN;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Cap on resident pages per pack (`None` keeps every faulted page)
    pub max_resident_pages: Option<usize>,

    /// Verify each quiz payload's CRC-32 when it is read
    pub verify_checksums: bool,

    /// Trailing bytes scanned when locating the pack directory
    pub eocd_search_limit: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        ContextConfig {
            max_resident_pages: None,
            verify_checksums: true,
            eocd_search_limit: DEFAULT_EOCD_SEARCH_LIMIT,
        }
    }
}

impl ContextConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ContextConfig =
            toml::from_str(text).map_err(|e| LotooError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| LotooError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_resident_pages == Some(0) {
            return Err(LotooError::Config(
                "max_resident_pages must be at least 1".to_string(),
            ));
        }
        if self.eocd_search_limit < EOCD_SIZE {
            return Err(LotooError::Config(format!(
                "eocd_search_limit must be at least {} bytes",
                EOCD_SIZE
            )));
        }
        Ok(())
    }

    pub(crate) fn resident_page_cap(&self) -> Option<NonZeroUsize> {
        self.max_resident_pages.and_then(NonZeroUsize::new)
    }
}
