//! Layered configuration: serialized defaults, optional TOML file, environment.
//!
//! Environment variables use the `HENTEPLAN_` prefix and a double underscore
//! between nesting levels, e.g. `HENTEPLAN_HTTP__TIMEOUT_SECS=30`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Prefix of environment variables read by [`ConfigLoader`].
pub const ENV_PREFIX: &str = "HENTEPLAN_";
/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "henteplan.toml";

/// Errors raised while loading configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// A source could not be read or did not match the expected shape.
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    /// Values were read but are unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// The HTTP client could not be constructed from the settings.
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Settings for outbound HTTP calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// `User-Agent` sent to every upstream.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            user_agent: "henteplan/0.1".to_owned(),
        }
    }
}

impl HttpConfig {
    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Build the client shared by every provider.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Client`] when the TLS backend cannot be initialised.
    pub fn build_client(&self) -> Result<Client, ConfigError> {
        Ok(Client::builder()
            .user_agent(&self.user_agent)
            .timeout(self.timeout())
            .build()?)
    }
}

/// Logging settings consumed by the binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `HENTEPLAN_LOG` is unset.
    pub level: String,
    /// Write logs to this file instead of stderr.
    pub file: Option<PathBuf>,
    /// Emit JSON lines instead of human readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            file: None,
            json: false,
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HenteplanConfig {
    /// Outbound HTTP settings.
    #[serde(default)]
    pub http: HttpConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Builder that merges configuration sources in priority order.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Loader that looks for [`DEFAULT_CONFIG_FILE`] in the working directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the given TOML file instead of the default one.
    #[must_use]
    pub fn with_config_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sources merged in order: defaults, TOML file (if present), environment.
    #[must_use]
    pub fn figment(&self) -> Figment {
        let path = self
            .config_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let mut figment = Figment::new().merge(Serialized::defaults(HenteplanConfig::default()));
        if path.exists() {
            debug!(path = %path.display(), "loading configuration file");
            figment = figment.merge(Toml::file(&path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a source is unreadable or a value is invalid.
    pub fn load(&self) -> Result<HenteplanConfig, ConfigError> {
        extract(&self.figment())
    }
}

/// Extract and validate a configuration from an already assembled figment.
///
/// # Errors
///
/// Returns [`ConfigError`] when extraction fails or a value is invalid.
pub fn extract(figment: &Figment) -> Result<HenteplanConfig, ConfigError> {
    let config: HenteplanConfig = figment.extract().map_err(Box::new)?;
    if config.http.timeout_secs == 0 {
        return Err(ConfigError::Invalid("http.timeout_secs must be positive".to_owned()));
    }
    if config.http.user_agent.trim().is_empty() {
        return Err(ConfigError::Invalid("http.user_agent must not be empty".to_owned()));
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_defaults(toml: &str) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(HenteplanConfig::default()))
            .merge(Toml::string(toml))
    }

    #[test]
    fn defaults_apply_without_sources() {
        let config = extract(&with_defaults("")).expect("defaults are valid");
        assert_eq!(config.http.timeout(), Duration::from_secs(15), "default timeout");
        assert_eq!(config.http.user_agent, "henteplan/0.1", "default agent");
        assert_eq!(config.logging.level, "info", "default level");
        assert!(config.logging.file.is_none(), "stderr by default");
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = extract(&with_defaults(
            "[http]\ntimeout_secs = 30\n[logging]\nlevel = \"debug\"\njson = true\n",
        ))
        .expect("valid overrides");
        assert_eq!(config.http.timeout_secs, 30, "timeout overridden");
        assert_eq!(config.http.user_agent, "henteplan/0.1", "agent kept");
        assert_eq!(config.logging.level, "debug", "level overridden");
        assert!(config.logging.json, "json enabled");
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = extract(&with_defaults("[http]\ntimeout_secs = 0\n")).expect_err("zero timeout");
        assert!(matches!(err, ConfigError::Invalid(_)), "validation error");
    }

    #[test]
    fn wrong_type_is_a_load_error() {
        let err = extract(&with_defaults("[http]\ntimeout_secs = \"soon\"\n")).expect_err("bad type");
        assert!(matches!(err, ConfigError::Load(_)), "extraction error");
    }

    #[test]
    fn client_builds_from_defaults() {
        assert!(HttpConfig::default().build_client().is_ok(), "client builds");
    }
}
