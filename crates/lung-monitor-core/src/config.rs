//! Client configuration.
//!
//! Sources, lowest priority first: built-in defaults, an optional
//! `lung-monitor.toml` (or an explicit file), then `LUNG_MONITOR__*`
//! environment variables (`LUNG_MONITOR__REFRESH__VITALS_SECS=5`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::gateway::AssetResolver;
use crate::sync::Refresh;

pub const DEFAULT_API_BASE: &str = "http://localhost:5001/";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Poll intervals in seconds. Zero means manual refresh only.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RefreshConfig {
    pub roster_secs: u64,
    pub stats_secs: u64,
    pub vitals_secs: u64,
    pub reports_secs: u64,
    pub recent_vitals_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            roster_secs: 0,
            stats_secs: 30,
            vitals_secs: 3,
            reports_secs: 0,
            recent_vitals_secs: 10,
        }
    }
}

fn refresh_from_secs(secs: u64) -> Refresh {
    if secs == 0 {
        Refresh::Manual
    } else {
        Refresh::Every(Duration::from_secs(secs))
    }
}

/// Resolved refresh policy for each query family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefreshPolicy {
    pub roster: Refresh,
    pub stats: Refresh,
    pub vitals: Refresh,
    pub reports: Refresh,
    pub recent_vitals: Refresh,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        RefreshConfig::default().policy()
    }
}

impl RefreshConfig {
    pub fn policy(&self) -> RefreshPolicy {
        RefreshPolicy {
            roster: refresh_from_secs(self.roster_secs),
            stats: refresh_from_secs(self.stats_secs),
            vitals: refresh_from_secs(self.vitals_secs),
            reports: refresh_from_secs(self.reports_secs),
            recent_vitals: refresh_from_secs(self.recent_vitals_secs),
        }
    }
}

/// Top-level client configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Origin serving `/api/*`
    pub api_base: Url,
    /// Origin for uploaded images and heat maps; defaults to `{api_base}/static/`
    pub asset_base: Option<Url>,
    /// Extra origins whose images may be embedded in synthesized reports
    pub cors_origins: Vec<String>,
    pub request_timeout_secs: u64,
    /// Delay before the single automatic retry of a failed read
    pub retry_delay_ms: u64,
    pub refresh: RefreshConfig,
    /// Where synthesized reports are written
    pub report_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: Url::parse(DEFAULT_API_BASE).expect("default API base is a valid URL"),
            asset_base: None,
            cors_origins: Vec::new(),
            request_timeout_secs: 30,
            retry_delay_ms: 1_000,
            refresh: RefreshConfig::default(),
            report_dir: PathBuf::from("."),
        }
    }
}

impl ClientConfig {
    /// Load from defaults, an optional file and the environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        builder = match file {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder.add_source(config::File::with_name("lung-monitor").required(false)),
        };

        builder = builder.add_source(
            config::Environment::with_prefix("LUNG_MONITOR")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("cors_origins")
                .try_parsing(true),
        );

        let config: ClientConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, url) in [("api_base", Some(&self.api_base)), ("asset_base", self.asset_base.as_ref())] {
            if let Some(url) = url {
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(ConfigError::Invalid(format!(
                        "{} must use http or https, got: {}",
                        name,
                        url.scheme()
                    )));
                }
            }
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("request_timeout_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Asset origin, falling back to the API's static directory.
    pub fn asset_base(&self) -> Url {
        match &self.asset_base {
            Some(url) => url.clone(),
            None => AssetResolver::with_trailing_slash(&self.api_base)
                .join("static/")
                .unwrap_or_else(|_| self.api_base.clone()),
        }
    }

    pub fn asset_resolver(&self) -> AssetResolver {
        AssetResolver::new(self.api_base.clone(), self.asset_base())
    }

    pub fn refresh_policy(&self) -> RefreshPolicy {
        self.refresh.policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.api_base.as_str(), "http://localhost:5001/");
        assert_eq!(config.asset_base().as_str(), "http://localhost:5001/static/");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_refresh_policy() {
        let policy = RefreshPolicy::default();
        assert_eq!(policy.roster, Refresh::Manual);
        assert_eq!(policy.stats, Refresh::Every(Duration::from_secs(30)));
        assert_eq!(policy.vitals, Refresh::Every(Duration::from_secs(3)));
        assert_eq!(policy.reports, Refresh::Manual);
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let config = ClientConfig {
            api_base: Url::parse("ftp://example.org/").unwrap(),
            ..ClientConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        std::fs::write(
            &path,
            "api_base = \"https://ward.example.org/\"\n[refresh]\nvitals_secs = 5\n",
        )
        .unwrap();

        let config = ClientConfig::load(Some(&path)).unwrap();
        assert_eq!(config.api_base.as_str(), "https://ward.example.org/");
        assert_eq!(config.refresh.vitals_secs, 5);
        assert_eq!(config.refresh.stats_secs, 30);
    }
}
