// Tunables for the sizes engine

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Settings read once at startup. Keys use the camelCase names pages already put
/// in their global config object; anything missing falls back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AutoSizesConfig {
    /// Class that opts an element in
    pub target_element_class: String,

    /// Class added after the first successful write. `None` or empty disables it.
    pub processed_element_class: Option<String>,

    /// Attribute receiving the computed `<n>px` value, e.g. `sizes` or `data-sizes`
    pub sizes_attr: String,

    /// Widths below this make the resolver look at ancestors instead
    pub min_size: f32,

    /// Run the first pass as soon as the driver is installed
    #[serde(rename = "init")]
    pub auto_init: bool,

    /// Quiet period in milliseconds before a resize burst triggers a pass
    pub resize_debounce: u64,
}

impl Default for AutoSizesConfig {
    fn default() -> Self {
        Self {
            target_element_class: "autosizes".to_string(),
            processed_element_class: Some("autosized".to_string()),
            sizes_attr: "sizes".to_string(),
            min_size: 40.0,
            auto_init: true,
            resize_debounce: 99,
        }
    }
}

impl AutoSizesConfig {
    /// Merge a flat JSON object over the defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_json(&content)?;
        tracing::debug!("loaded autosizes config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_element_class.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "targetElementClass",
                reason: "must not be empty".to_string(),
            });
        }
        if self.target_element_class.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid {
                key: "targetElementClass",
                reason: format!("`{}` is not a single class name", self.target_element_class),
            });
        }
        if self.sizes_attr.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "sizesAttr",
                reason: "must not be empty".to_string(),
            });
        }
        if !self.min_size.is_finite() || self.min_size < 0.0 {
            return Err(ConfigError::Invalid {
                key: "minSize",
                reason: format!("expected a non-negative number, got {}", self.min_size),
            });
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce)
    }

    pub fn processed_class(&self) -> Option<&str> {
        self.processed_element_class
            .as_deref()
            .filter(|class| !class.is_empty())
    }

    /// The unprefixed attribute written alongside a prefixed `sizes_attr`
    /// (`data-sizes` also writes `sizes`). `None` when `sizes_attr` is already bare.
    pub fn dual_write_attr(&self) -> Option<&str> {
        let (_, bare) = self.sizes_attr.rsplit_once('-')?;
        (!bare.is_empty() && bare != self.sizes_attr).then_some(bare)
    }
}
