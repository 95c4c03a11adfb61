use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const RACE_DEADLINE: Duration = Duration::from_secs(15);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(14);
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(5);
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(8);
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_3) AppleWebKit/537.36 (KHTML, like Gecko) Version/16.4 Safari/537.36";

/// Timeouts and defaults shared by every fetch made through one fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Outer bound on a whole race, independent of `request_timeout`.
    pub race_deadline: Duration,
    pub request_timeout: Duration,
    pub dial_timeout: Duration,
    pub probe_timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            race_deadline: RACE_DEADLINE,
            request_timeout: REQUEST_TIMEOUT,
            dial_timeout: DIAL_TIMEOUT,
            probe_timeout: PROBE_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl FetchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_race_deadline(mut self, deadline: Duration) -> Self {
        self.race_deadline = deadline;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub fetch: FetchSettings,
}

#[derive(Debug, Default, Deserialize)]
pub struct FetchSettings {
    pub race_deadline_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub dial_timeout_ms: Option<u64>,
    pub probe_timeout_ms: Option<u64>,
    pub user_agent: Option<String>,
    pub proxy: Option<String>,
}

impl Settings {
    /// Loads `config.toml` from the working directory, or defaults if it is absent.
    pub fn new() -> Result<Self> {
        let config_data = fs::read_to_string("config.toml").unwrap_or_default();
        Self::parse(&config_data)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_data = fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        Self::parse(&config_data)
    }

    pub fn parse(config_data: &str) -> Result<Self> {
        if config_data.trim().is_empty() {
            return Ok(Settings::default());
        }
        let settings: Settings = toml::from_str(config_data).context("invalid settings")?;
        Ok(settings)
    }

    pub fn fetch_config(&self) -> FetchConfig {
        let fetch = &self.fetch;
        let mut config = FetchConfig::default();
        if let Some(ms) = fetch.race_deadline_ms {
            config.race_deadline = Duration::from_millis(ms);
        }
        if let Some(ms) = fetch.request_timeout_ms {
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = fetch.dial_timeout_ms {
            config.dial_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = fetch.probe_timeout_ms {
            config.probe_timeout = Duration::from_millis(ms);
        }
        if let Some(ua) = &fetch.user_agent {
            config.user_agent = ua.clone();
        }
        config
    }

    pub fn proxy(&self) -> Option<&str> {
        self.fetch.proxy.as_deref().filter(|p| !p.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_settings_fall_back_to_defaults() {
        let settings = Settings::parse("").unwrap();
        let config = settings.fetch_config();
        assert_eq!(config.race_deadline, RACE_DEADLINE);
        assert_eq!(config.request_timeout, REQUEST_TIMEOUT);
        assert_eq!(config.dial_timeout, DIAL_TIMEOUT);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert!(settings.proxy().is_none());
    }

    #[test]
    fn partial_settings_override_only_given_fields() {
        let settings = Settings::parse(
            r#"
            [fetch]
            race_deadline_ms = 2000
            dial_timeout_ms = 300
            proxy = "http://127.0.0.1:7890"
            "#,
        )
        .unwrap();
        let config = settings.fetch_config();
        assert_eq!(config.race_deadline, Duration::from_secs(2));
        assert_eq!(config.dial_timeout, Duration::from_millis(300));
        assert_eq!(config.request_timeout, REQUEST_TIMEOUT);
        assert_eq!(settings.proxy(), Some("http://127.0.0.1:7890"));
    }

    #[test]
    fn empty_proxy_means_none() {
        let settings = Settings::parse("[fetch]\nproxy = \"\"\n").unwrap();
        assert!(settings.proxy().is_none());
    }

    #[test]
    fn malformed_settings_are_rejected() {
        assert!(Settings::parse("[fetch]\nrace_deadline_ms = \"soon\"").is_err());
    }

    #[test]
    fn builder_overrides() {
        let config = FetchConfig::new()
            .with_race_deadline(Duration::from_millis(500))
            .with_user_agent("racefetch-test");
        assert_eq!(config.race_deadline, Duration::from_millis(500));
        assert_eq!(config.user_agent, "racefetch-test");
    }
}
