//! TOML configuration.
//!
//! ```text
//! [rewrite]
//! engine = "katex"
//! delimiters = "brackets"
//! max_input_bytes = 1048576
//! max_depth = 256
//!
//! [metadata.title]
//! command = "title"
//! classes = ["doc-title", "title", "mathpix-title"]
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::math::RewriteConfig;
use crate::metadata::MetadataRules;

/// Configuration for every component. Missing keys take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rewrite: RewriteConfig,
    pub metadata: MetadataRules,
}

impl Config {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        Ok(toml::from_str(input).map_err(|e| ConfigError::Toml(e.to_string()))?)
    }
}
