#![forbid(unsafe_code)]

//! Engine configuration.
//!
//! Every section and field has a default, so an empty document is a valid
//! configuration.
//!
//! ```toml
//! [validation]
//! allow_unknown_attributes = false
//!
//! [activation]
//! wrap = true
//!
//! [logging]
//! filter = "tether_runtime=debug,info"
//! json = false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tether_controls::{ActivationPolicy, CompositeControl};
use tether_expr::ValidationOptions;
use tether_runtime::BindingProviderRegistry;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[cfg(feature = "toml-config")]
    #[error("invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unsupported configuration format '{0}'")]
    UnsupportedFormat(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Accept attributes no specification declares, for every binding type.
    pub allow_unknown_attributes: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivationConfig {
    /// Continue from the first control after the last one.
    pub wrap: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence when set.
    pub filter: String,
    /// Emit JSON lines (requires the `tracing-json` feature).
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub validation: ValidationConfig,
    pub activation: ActivationConfig,
    pub logging: LoggingConfig,
}

impl EngineConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    #[cfg(feature = "toml-config")]
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a `.json` or (with `toml-config`) `.toml` file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match extension.as_str() {
            "json" => Self::from_json_str(&text),
            #[cfg(feature = "toml-config")]
            "toml" => Self::from_toml_str(&text),
            _ => Err(ConfigError::UnsupportedFormat(extension)),
        }
    }

    #[must_use]
    pub fn validation_options(&self) -> ValidationOptions {
        ValidationOptions {
            allow_unknown_attributes: self.validation.allow_unknown_attributes,
        }
    }

    #[must_use]
    pub fn activation_policy(&self) -> ActivationPolicy {
        ActivationPolicy {
            wrap: self.activation.wrap,
        }
    }

    /// An empty provider registry using this configuration's validation options.
    #[must_use]
    pub fn registry(&self) -> BindingProviderRegistry {
        BindingProviderRegistry::new().with_validation_options(self.validation_options())
    }

    /// An empty composite using this configuration's activation policy.
    #[must_use]
    pub fn composite(&self, name: impl Into<String>) -> CompositeControl {
        CompositeControl::new(name).with_policy(self.activation_policy())
    }
}
