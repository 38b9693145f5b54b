// Search configuration.
//
// All tunable search parameters live in `CantorConfig`, optionally loaded
// from a JSON file (`--config`). Every field has a default, and a file may
// name only the fields it wants to change:
//
//   { "counterpoint": { "retry_budget": 20 } }
//
// Command-line flags override whatever the file (or the defaults) say; that
// merge happens in main.rs.
//
// See also: `harmony.rs` for `HarmonyConfig`, `counterpoint.rs` for
// `CounterpointConfig`.

use crate::counterpoint::CounterpointConfig;
use crate::error::ConfigError;
use crate::harmony::HarmonyConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CantorConfig {
    pub harmony: HarmonyConfig,
    pub counterpoint: CounterpointConfig,
}

impl CantorConfig {
    /// Parse a JSON document. `origin` names the source in errors.
    pub fn from_json(json: &str, origin: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|source| ConfigError::Json {
            path: origin.to_string(),
            source,
        })
    }

    /// Load a config file from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let origin = path.display().to_string();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: origin.clone(),
            source,
        })?;
        Self::from_json(&data, &origin)
    }
}
