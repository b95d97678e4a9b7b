//! Defines all configuration structures for the pomodoro server.
//!
//! These structs are deserialized with `serde` from an optional TOML file
//! layered under `POMODORO__*` environment variables, using the `config`
//! crate. Every field has a default, so an empty environment yields a
//! working setup.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// Environment variable naming an alternative config file.
pub const CONFIG_PATH_VAR: &str = "POMODORO_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "pomodoro";

/// The top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PomodoroConfig {
    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub notifier: NotifierConfig,
}

/// Default phase lengths used when a command does not name its own.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_focus_secs")]
    pub focus_secs: u64,

    #[serde(default = "default_break_secs")]
    pub break_secs: u64,
}

/// Where the slash-command listener binds.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

/// Outbound notifications posted to a command's `response_url`.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    /// When false, sessions started over HTTP get no outbound observer.
    #[serde(default = "default_notifier_enabled")]
    pub enabled: bool,

    /// Per-request timeout for outbound posts.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl PomodoroConfig {
    /// Loads `pomodoro.toml` (or the file named by `POMODORO_CONFIG`) if it
    /// exists, then applies `POMODORO__SECTION__KEY` environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
        Config::builder()
            .add_source(File::with_name(&path).required(false))
            .add_source(
                Environment::with_prefix("POMODORO")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

impl SessionConfig {
    pub fn focus_duration(&self) -> Duration {
        Duration::from_secs(self.focus_secs)
    }

    pub fn break_duration(&self) -> Duration {
        Duration::from_secs(self.break_secs)
    }
}

impl NotifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// --- Default value functions for serde ---

fn default_focus_secs() -> u64 {
    25 * 60
}

fn default_break_secs() -> u64 {
    5 * 60
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_notifier_enabled() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            focus_secs: default_focus_secs(),
            break_secs: default_break_secs(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            enabled: default_notifier_enabled(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn defaults_are_a_classic_pomodoro() {
        let config = PomodoroConfig::default();
        assert_eq!(config.session.focus_duration(), Duration::from_secs(1500));
        assert_eq!(config.session.break_duration(), Duration::from_secs(300));
        assert_eq!(config.server.bind_addr, "127.0.0.1:8080");
        assert!(config.notifier.enabled);
        assert_eq!(config.notifier.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let toml = r#"
            [session]
            focus_secs = 50

            [notifier]
            enabled = false
        "#;
        let config: PomodoroConfig = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.session.focus_secs, 50);
        assert_eq!(config.session.break_secs, 300);
        assert!(!config.notifier.enabled);
        assert_eq!(config.notifier.timeout_secs, 10);
        assert_eq!(config.server.bind_addr, "127.0.0.1:8080");
    }
}
