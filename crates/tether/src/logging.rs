#![forbid(unsafe_code)]

//! Global `tracing` subscriber setup.
//!
//! Libraries in this workspace only emit events; applications call [`init`]
//! once at startup. `RUST_LOG`, when set, replaces the configured filter.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;

use crate::config::LoggingConfig;

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid log filter '{filter}': {source}")]
    InvalidFilter {
        filter: String,
        #[source]
        source: ParseError,
    },
}

/// Build the filter: `RUST_LOG` first, then the configured directives.
pub fn filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.filter).map_err(|source| LoggingError::InvalidFilter {
        filter: config.filter.clone(),
        source,
    })
}

/// Install the global subscriber.
///
/// Returns `Ok(false)` if a global subscriber was already installed.
pub fn init(config: &LoggingConfig) -> Result<bool, LoggingError> {
    let filter = filter(config)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    #[cfg(feature = "tracing-json")]
    let installed = if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    #[cfg(not(feature = "tracing-json"))]
    let installed = {
        let installed = builder.try_init().is_ok();
        if installed && config.json {
            tracing::warn!("JSON log output requested without the tracing-json feature; using text");
        }
        installed
    };

    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_filter_is_reported() {
        // Only meaningful when RUST_LOG does not override the configured filter.
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = LoggingConfig {
            filter: "tether=verbose".to_owned(),
            json: false,
        };
        let err = filter(&config).unwrap_err();
        assert!(err.to_string().starts_with("invalid log filter 'tether=verbose'"));
    }

    #[test]
    fn second_init_is_harmless() {
        let config = LoggingConfig::default();
        let _ = init(&config).unwrap();
        assert!(!init(&config).unwrap());
    }
}
