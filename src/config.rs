//! Application configuration.
//!
//! The configuration is loaded from a JSON file, either the path given with
//! `--config <path>` or `$XDG_CONFIG_HOME/xkb-switch/config.json`.  The
//! top-level schema is split into sections so new keys can be added without
//! breaking existing files.
//!
//! # Example
//!
//! ```json
//! {
//!   "parser": {
//!     "nonsymbols": ["group", "inet", "pc", "ctrl", "ctr", "compose"],
//!     "separators": "plus"
//!   },
//!   "session": {
//!     "source": "symbols",
//!     "display": ":1"
//!   }
//! }
//! ```

use crate::layout::NonSymbolSet;
use crate::parser::{Separators, SymbolParser};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration.
///
/// Every field is optional; a minimal `{}` file is valid and all sections
/// fall back to their compiled-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// How symbol-atom strings are tokenised and filtered.
    #[serde(default)]
    pub parser: ParserConfig,

    /// Which display to open and which string to read layouts from.
    #[serde(default)]
    pub session: SessionConfig,
}

/// Settings for the symbol-atom parser.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Words that never name a layout.  Replaces the standard list.
    pub nonsymbols: NonSymbolSet,
    /// Token separators.
    pub separators: Separators,
}

impl ParserConfig {
    pub fn build(&self) -> SymbolParser {
        SymbolParser::new(self.nonsymbols.clone(), self.separators)
    }
}

/// Where the layout list is read from.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LayoutSource {
    /// The comma-separated layout and variant lists of the rules-names
    /// property.
    #[default]
    Rules,
    /// The `+`-joined symbols name of the keyboard description.
    Symbols,
}

/// Session settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub source: LayoutSource,
    /// X display name; `None` uses `$DISPLAY`.
    pub display: Option<String>,
}

impl Config {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ConfigError(format!("failed to parse {}: {}", path.display(), e)))?;
        Ok(config)
    }
}

/// Error from loading or parsing a configuration file.
#[derive(Debug, thiserror::Error)]
#[error("config error: {0}")]
pub struct ConfigError(String);
