//! Environment-driven engine configuration.
//!
//! # Responsibility
//! - Collect log level/target and locale settings in one place.
//! - Build the [`LoggingConfig`] and [`Translator`] the engine runs with.
//!
//! # Invariants
//! - Missing variables fall back to defaults; blank values count as missing.
//! - Values are validated here so later setup cannot fail on them.

use crate::contract::{Catalog, Translator, DEFAULT_LOCALE};
use crate::logging::{default_log_level, LoggingConfig};
use std::sync::Arc;
use thiserror::Error;

pub const ENV_LOG_LEVEL: &str = "INTERFLOW_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "INTERFLOW_LOG_DIR";
pub const ENV_LOCALE: &str = "INTERFLOW_LOCALE";
pub const ENV_DEFAULT_LOCALE: &str = "INTERFLOW_DEFAULT_LOCALE";

const KNOWN_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "warning", "error"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has unsupported log level `{value}`")]
    LogLevel { var: &'static str, value: String },
    #[error("{var} must be an absolute path, got `{value}`")]
    LogDir { var: &'static str, value: String },
    #[error("{var} has invalid locale `{value}`")]
    Locale { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub log_level: String,
    pub log_dir: Option<String>,
    pub default_locale: String,
    pub active_locale: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_string(),
            log_dir: None,
            default_locale: DEFAULT_LOCALE.to_string(),
            active_locale: DEFAULT_LOCALE.to_string(),
        }
    }
}

impl CoreConfig {
    /// Reads `INTERFLOW_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`CoreConfig::from_env`] with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(level) = read(ENV_LOG_LEVEL) {
            if !KNOWN_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
                return Err(ConfigError::LogLevel {
                    var: ENV_LOG_LEVEL,
                    value: level,
                });
            }
            config.log_level = level.to_ascii_lowercase();
        }
        if let Some(dir) = read(ENV_LOG_DIR) {
            if !std::path::Path::new(&dir).is_absolute() {
                return Err(ConfigError::LogDir {
                    var: ENV_LOG_DIR,
                    value: dir,
                });
            }
            config.log_dir = Some(dir);
        }
        if let Some(locale) = read(ENV_DEFAULT_LOCALE) {
            config.default_locale = validate_locale(ENV_DEFAULT_LOCALE, locale)?;
            config.active_locale = config.default_locale.clone();
        }
        if let Some(locale) = read(ENV_LOCALE) {
            config.active_locale = validate_locale(ENV_LOCALE, locale)?;
        }
        Ok(config)
    }

    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level.clone(),
            log_dir: self.log_dir.clone(),
        }
    }

    /// Builtin catalog bound to the configured locales.
    pub fn translator(&self) -> Translator {
        self.translator_with(Catalog::builtin())
    }

    /// Caller-supplied catalog bound to the configured locales.
    pub fn translator_with(&self, catalog: Catalog) -> Translator {
        let catalog = catalog.with_default_locale(self.default_locale.clone());
        Translator::new(Arc::new(catalog), self.active_locale.clone())
    }
}

fn validate_locale(var: &'static str, value: String) -> Result<String, ConfigError> {
    let valid = value
        .split('-')
        .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric()));
    if valid {
        Ok(value)
    } else {
        Err(ConfigError::Locale { var, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = CoreConfig::from_lookup(lookup(&[])).expect("defaults are valid");
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.translator().locale(), "en");
    }

    #[test]
    fn reads_locale_and_level_overrides() {
        let config = CoreConfig::from_lookup(lookup(&[
            (ENV_LOG_LEVEL, "WARN"),
            (ENV_LOCALE, "pt-BR"),
            (ENV_LOG_DIR, "  "),
        ]))
        .expect("overrides are valid");
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_dir, None);
        assert_eq!(config.active_locale, "pt-BR");
        assert_eq!(config.default_locale, "en");
        assert_eq!(
            config.translator().translate("key?", &[]).text,
            "está faltando"
        );
    }

    #[test]
    fn rejects_relative_log_dir_and_bad_locale() {
        assert!(matches!(
            CoreConfig::from_lookup(lookup(&[(ENV_LOG_DIR, "logs")])),
            Err(ConfigError::LogDir { .. })
        ));
        assert!(matches!(
            CoreConfig::from_lookup(lookup(&[(ENV_LOCALE, "en_US!")])),
            Err(ConfigError::Locale { .. })
        ));
    }
}
