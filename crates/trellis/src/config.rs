//! View-model configuration.
//!
//! A [`ViewModelConfig`] can be read from TOML or JSON. Every field has a
//! default, so an empty document (or a missing section) is valid:
//!
//! ```
//! use trellis::config::ViewModelConfig;
//!
//! let config = ViewModelConfig::from_toml_str(r#"
//! [tree]
//! relationship_type = "Part BOM"
//!
//! [filters]
//! columns = 2
//! "#).unwrap();
//!
//! assert_eq!(config.tree.relationship_type.as_deref(), Some("Part BOM"));
//! assert_eq!(config.filters.columns, 2);
//! assert_eq!(config.filters.row_height, 60);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use trellis_core::logging::targets;
use trellis_core::signal;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewModelConfig {
    pub tree: TreeConfig,
    pub filters: FilterLayout,
    pub notifications: NotificationConfig,
}

/// Settings for trees built with [`crate::RelationshipTree::from_config`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Relationship type the tree expands.
    pub relationship_type: Option<String>,
}

/// Layout of the search filter dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterLayout {
    pub columns: u32,
    pub row_height: u32,
    pub toolbar_height: u32,
    pub width: u32,
}

impl Default for FilterLayout {
    fn default() -> Self {
        Self {
            columns: 3,
            row_height: 60,
            toolbar_height: 50,
            width: 600,
        }
    }
}

impl FilterLayout {
    /// Dialog height for `fields` filter fields: one row per started group of
    /// `columns` fields, plus the toolbar.
    pub fn height(&self, fields: usize) -> u32 {
        let columns = self.columns.max(1) as usize;
        let rows = u32::try_from(fields.div_ceil(columns)).unwrap_or(u32::MAX);
        rows.saturating_mul(self.row_height)
            .saturating_add(self.toolbar_height)
    }
}

/// Change-notification settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// How deeply one signal may be emitted re-entrantly.
    pub max_reentrant_depth: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            max_reentrant_depth: signal::DEFAULT_MAX_REENTRANT_DEPTH,
        }
    }
}

impl ViewModelConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load from a `.toml` or `.json` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let config = match extension.as_deref() {
            Some("toml") => Self::from_toml_str(&std::fs::read_to_string(path)?)?,
            Some("json") => Self::from_json_str(&std::fs::read_to_string(path)?)?,
            _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        };
        tracing::debug!(target: targets::CORE, path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Install the process-wide settings this configuration carries.
    pub fn apply(&self) {
        signal::set_max_reentrant_depth(self.notifications.max_reentrant_depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ViewModelConfig::default();
        assert_eq!(config.tree.relationship_type, None);
        assert_eq!(config.filters, FilterLayout::default());
        assert_eq!(config.notifications.max_reentrant_depth, 8);
    }

    #[test]
    fn test_empty_documents() {
        assert_eq!(ViewModelConfig::from_toml_str("").unwrap(), ViewModelConfig::default());
        assert_eq!(ViewModelConfig::from_json_str("{}").unwrap(), ViewModelConfig::default());
    }

    #[test]
    fn test_json_partial_section() {
        let config = ViewModelConfig::from_json_str(r#"{"filters": {"width": 800}}"#).unwrap();
        assert_eq!(config.filters.width, 800);
        assert_eq!(config.filters.columns, 3);
    }

    #[test]
    fn test_filter_height() {
        let layout = FilterLayout::default();
        assert_eq!(layout.height(0), 50);
        assert_eq!(layout.height(1), 110);
        assert_eq!(layout.height(3), 110);
        assert_eq!(layout.height(4), 170);
        assert_eq!(layout.height(7), 230);
    }

    #[test]
    fn test_zero_columns_behaves_as_one() {
        let layout = FilterLayout {
            columns: 0,
            ..FilterLayout::default()
        };
        assert_eq!(layout.height(2), 170);
    }

    #[test]
    fn test_invalid_toml() {
        let err = ViewModelConfig::from_toml_str("[tree").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_load_rejects_unknown_extension() {
        let err = ViewModelConfig::load("settings.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }
}
