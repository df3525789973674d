//! Editor configuration.
//!
//! ## Learning: Serde for Serialization
//!
//! Serde is Rust's standard for serialization/deserialization.
//! The `#[derive(Serialize, Deserialize)]` macro generates
//! code to convert structs to/from JSON, TOML, etc.
//!
//! `#[serde(default)]` uses Default::default() for missing fields,
//! making configs backward-compatible.
//!
//! ## Example
//!
//! ```toml
//! [generation]
//! context_chars = 1500
//!
//! [ai]
//! model = "gpt-4o-mini"
//! api_key_env = "OPENAI_API_KEY"
//!
//! [keyboard.bindings]
//! "ctrl+j" = "ai.continue"
//! ```

use inkling_ai::AiConfig;
use inkling_buffer::BufferConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Main configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Generation lifecycle settings
    pub generation: GenerationConfig,

    /// AI service settings
    pub ai: AiConfig,

    /// Keyboard settings
    pub keyboard: KeyboardConfig,

    /// Document engine settings
    pub buffer: BufferSettings,
}

impl Config {
    /// Loads config from the default location.
    ///
    /// A missing or unreadable file yields the defaults.
    pub fn load() -> Self {
        match Self::load_from_default_path() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Using default config: {}", e);
                Self::default()
            }
        }
    }

    /// Loads config from a file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Loads from the default config path.
    fn load_from_default_path() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Returns the default config file path.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("inkling").join("config.toml"))
    }

    /// Saves the config to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(Self::default_path()?)
    }

    /// Saves the config to a file, creating parent directories.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Generation lifecycle settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Maximum characters of context sent before the cursor
    pub context_chars: usize,

    /// Text placed between the document and a suggestion
    pub separator: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            context_chars: 2000,
            separator: " ".to_string(),
        }
    }
}

/// Keyboard configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyboardConfig {
    /// Custom key bindings, e.g. `"ctrl+j" = "ai.continue"`, applied in
    /// key-string order
    pub bindings: BTreeMap<String, String>,
}

/// Document engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferSettings {
    /// Undo history limit
    pub undo_limit: usize,

    /// How many past transactions stay mappable
    pub step_log_limit: usize,
}

impl Default for BufferSettings {
    fn default() -> Self {
        let defaults = BufferConfig::default();
        Self {
            undo_limit: defaults.max_history,
            step_log_limit: defaults.step_log_limit,
        }
    }
}

impl BufferSettings {
    /// Returns the engine configuration.
    pub fn to_buffer_config(&self) -> BufferConfig {
        BufferConfig {
            max_history: self.undo_limit,
            step_log_limit: self.step_log_limit,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config directory not found")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.generation.context_chars, 2000);
        assert_eq!(config.generation.separator, " ");
        assert_eq!(config.buffer.undo_limit, 1000);
        assert!(config.keyboard.bindings.is_empty());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [generation]
            separator = ""

            [keyboard.bindings]
            "ctrl+j" = "ai.continue"
            "#,
        )
        .unwrap();

        assert_eq!(config.generation.separator, "");
        assert_eq!(config.generation.context_chars, 2000);
        assert_eq!(
            config.keyboard.bindings.get("ctrl+j").map(String::as_str),
            Some("ai.continue")
        );
        assert_eq!(config.ai, AiConfig::default());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.buffer.step_log_limit = 64;
        config.ai.use_substitute = true;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.buffer.step_log_limit, 64);
        assert!(loaded.ai.use_substitute);
    }

    #[test]
    fn test_invalid_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[generation\ncontext_chars = ").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Parse(_))
        ));
    }
}
