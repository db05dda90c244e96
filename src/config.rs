//! Engine configuration persistence
//!
//! Stores user preferences in `~/.config/xmlgrid/config.yaml`

use std::path::Path;

use serde::{Deserialize, Serialize};

/// How the sync engine tells its own writes apart from external edits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EchoDetection {
    /// Trust the host's write correlation; untagged notifications are external
    Sequence,
    /// Use write correlation when present, otherwise treat notifications
    /// arriving shortly after a write as echoes
    #[default]
    GraceWindow,
}

/// Shape of the grid synthesized for documents with no tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderConfig {
    /// Table name prefix; the first free `Sheet1`, `Sheet2`... is used
    #[serde(default = "default_sheet_base")]
    pub sheet_base: String,
    #[serde(default = "default_placeholder_size")]
    pub rows: usize,
    #[serde(default = "default_placeholder_size")]
    pub cols: usize,
    /// Column name prefix (`col1`..`colN`)
    #[serde(default = "default_column_base")]
    pub column_base: String,
    /// Document element created when the document has none
    #[serde(default = "default_root_element")]
    pub root_element: String,
}

fn default_sheet_base() -> String {
    "Sheet".to_string()
}

fn default_placeholder_size() -> usize {
    5
}

fn default_column_base() -> String {
    "col".to_string()
}

fn default_root_element() -> String {
    "Root".to_string()
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        Self {
            sheet_base: default_sheet_base(),
            rows: default_placeholder_size(),
            cols: default_placeholder_size(),
            column_base: default_column_base(),
            root_element: default_root_element(),
        }
    }
}

/// Engine configuration that persists across sessions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub echo_detection: EchoDetection,
    /// Grace window in milliseconds for [`EchoDetection::GraceWindow`]
    #[serde(default = "default_echo_grace_ms")]
    pub echo_grace_ms: u64,
    /// Base name for inserted columns (`NewColumn1`, `NewColumn2`...)
    #[serde(default = "default_new_column_base")]
    pub new_column_base: String,
    #[serde(default)]
    pub placeholder: PlaceholderConfig,
    /// Indentation unit used when serializing
    #[serde(default = "default_indent")]
    pub indent: String,
}

fn default_echo_grace_ms() -> u64 {
    2000
}

fn default_new_column_base() -> String {
    "NewColumn".to_string()
}

fn default_indent() -> String {
    "  ".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            echo_detection: EchoDetection::default(),
            echo_grace_ms: default_echo_grace_ms(),
            new_column_base: default_new_column_base(),
            placeholder: PlaceholderConfig::default(),
            indent: default_indent(),
        }
    }
}

/// Configuration failures surfaced by [`EngineConfig::save`]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No config directory available")]
    NoConfigDir,
    #[error("Failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

impl EngineConfig {
    /// Load config from disk, or return defaults if not found
    pub fn load() -> Self {
        let Some(path) = crate::config_paths::config_file() else {
            tracing::debug!("No config directory available, using defaults");
            return Self::default();
        };
        Self::load_from(&path)
    }

    /// Load config from an explicit path, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!(
                "Config file not found at {}, using defaults",
                path.display()
            );
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse config at {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save config to disk
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = crate::config_paths::config_file().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content).map_err(io_err)?;

        tracing::info!("Saved config to {}", path.display());
        Ok(())
    }
}
