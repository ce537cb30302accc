//! Configuration management for schema forms
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (forms.toml)
//! - Environment variables (SCHEMA_FORMS__*)
//!
//! ## Example config file (forms.toml):
//! ```toml
//! [options]
//! init_togglers_off = false
//! array_item_title = "Item"
//! alternative_title_prefix = "Option"
//!
//! [references]
//! allow_external = false
//!
//! [logging]
//! filter = "schema_forms=info"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration for schema forms
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormConfig {
    /// Options applied while building the model
    #[serde(default)]
    pub options: FormOptions,

    /// Reference resolution settings
    #[serde(default)]
    pub references: ReferenceConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Options applied while building the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormOptions {
    /// Optional fields start disabled
    #[serde(default)]
    pub init_togglers_off: bool,

    /// Label of list-like collection entries
    #[serde(default = "default_array_item_title")]
    pub array_item_title: String,

    /// Label prefix of alternatives without a title
    #[serde(default = "default_alternative_title_prefix")]
    pub alternative_title_prefix: String,
}

/// Reference resolution settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceConfig {
    /// Leave references outside the document in place instead of failing
    #[serde(default)]
    pub allow_external: bool,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_filter")]
    pub filter: String,
}

// Default value functions
fn default_array_item_title() -> String {
    "Item".to_string()
}

fn default_alternative_title_prefix() -> String {
    "Option".to_string()
}

fn default_filter() -> String {
    "warn".to_string()
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            init_togglers_off: false,
            array_item_title: default_array_item_title(),
            alternative_title_prefix: default_alternative_title_prefix(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: default_filter() }
    }
}

impl FormConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, with `config_path` taking precedence over the defaults
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load from default locations
        let config_locations = ["forms.toml", ".forms.toml", "config/forms.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "schema-forms", "schema-forms") {
            let xdg_config = config_dir.config_dir().join("forms.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        // Load from environment variables (SCHEMA_FORMS__*)
        builder = builder.add_source(
            Environment::with_prefix("SCHEMA_FORMS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}
