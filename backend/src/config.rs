use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::utils::duration::deserialize_duration_secs;
use crate::utils::error::{EngineError, EngineResult};

/// The engine's own configuration (§6b), loaded once at startup via
/// `Config::load()` → `apply_env_overrides()` → `validate()`, the same
/// pipeline the teacher's web-server config follows.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: String,
    pub language: String,
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub range: u64,
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub min_duration: u64,
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub max_duration: u64,
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub sql_timeout: u64,
    pub sar_dir: Option<String>,
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub scrape_interval: u64,
    pub scrape_times: usize,
    pub output: String,
    pub metric_paths: Vec<String>,
    pub default_module_path: String,
    pub evaluate_model_path: String,
    pub nodes_config_path: Option<String>,
    pub network_io_discard: Vec<String>,
    pub skip_gen_word_report: bool,
    pub skip_gen_html_report: bool,
    pub max_concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            language: "zh-CN".to_string(),
            range: 24 * 60 * 60,
            min_duration: 60,
            max_duration: 7 * 24 * 60 * 60,
            sql_timeout: 30,
            sar_dir: None,
            scrape_interval: 5,
            scrape_times: 3,
            output: "output".to_string(),
            metric_paths: vec!["conf/metrics.toml".to_string()],
            default_module_path: "conf/modules.toml".to_string(),
            evaluate_model_path: "conf/evaluate_model.toml".to_string(),
            nodes_config_path: None,
            network_io_discard: vec!["^lo$".to_string()],
            skip_gen_word_report: false,
            skip_gen_html_report: false,
            max_concurrency: 8,
        }
    }
}

impl Config {
    /// Loading order: config file (if found) → environment overrides →
    /// validation. A missing config file falls back to defaults rather than
    /// failing, matching the teacher's `Config::load()`.
    pub fn load() -> EngineResult<Self> {
        Self::load_from(None)
    }

    /// Same pipeline as `load`, but `explicit_path` (the CLI's `--config`
    /// flag) takes priority over file discovery when set.
    pub fn load_from(explicit_path: Option<&str>) -> EngineResult<Self> {
        let mut config = if let Some(path) = explicit_path {
            Self::from_toml(path)?
        } else if let Some(path) = Self::find_config_file() {
            Self::from_toml(&path)?
        } else {
            tracing::warn!("configuration file not found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Supported overrides (§6b): `YHC_LOG_LEVEL`, `YHC_LANGUAGE`,
    /// `YHC_SQL_TIMEOUT`, `YHC_OUTPUT`.
    fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("YHC_LOG_LEVEL") {
            tracing::info!(level = %level, "overriding log_level from env");
            self.log_level = level;
        }
        if let Ok(language) = std::env::var("YHC_LANGUAGE") {
            tracing::info!(language = %language, "overriding language from env");
            self.language = language;
        }
        if let Ok(timeout) = std::env::var("YHC_SQL_TIMEOUT") {
            match crate::utils::duration::parse_duration_to_secs(&timeout) {
                Ok(secs) => {
                    tracing::info!(sql_timeout = secs, "overriding sql_timeout from env");
                    self.sql_timeout = secs;
                }
                Err(e) => tracing::warn!(value = %timeout, error = %e, "invalid YHC_SQL_TIMEOUT, ignoring"),
            }
        }
        if let Ok(output) = std::env::var("YHC_OUTPUT") {
            tracing::info!(output = %output, "overriding output from env");
            self.output = output;
        }
    }

    fn validate(&self) -> EngineResult<()> {
        if self.sql_timeout == 0 {
            return Err(EngineError::config_invalid("sql_timeout must be > 0"));
        }
        if self.min_duration > self.max_duration {
            return Err(EngineError::config_invalid("min_duration must not exceed max_duration"));
        }
        if self.metric_paths.is_empty() {
            return Err(EngineError::config_invalid("metric_paths must not be empty"));
        }
        if self.max_concurrency == 0 {
            return Err(EngineError::config_invalid("max_concurrency must be > 0"));
        }
        Ok(())
    }

    fn find_config_file() -> Option<String> {
        let candidates = ["conf/config.toml", "config.toml", "./conf/config.toml", "./config.toml"];
        candidates.into_iter().find(|p| Path::new(p).exists()).map(str::to_string)
    }

    fn from_toml(path: &str) -> EngineResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| EngineError::config_invalid(format!("cannot read config file {path}: {e}")))?;
        toml::from_str(&text)
            .map_err(|e| EngineError::config_invalid(format!("cannot parse config file {path}: {e}")))
    }
}

/// Resolves the yasdb home/data directories: explicit CLI flags first, then
/// `YASDB_HOME`/`YASDB_DATA`, matching §6's credentials/env contract.
pub fn resolve_yasdb_dirs(home: Option<String>, data: Option<String>) -> (Option<String>, Option<String>) {
    (home.or_else(|| std::env::var("YASDB_HOME").ok()), data.or_else(|| std::env::var("YASDB_DATA").ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes_validation() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_sql_timeout_is_invalid() {
        let mut config = Config::default();
        config.sql_timeout = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn min_duration_above_max_duration_is_invalid() {
        let mut config = Config::default();
        config.min_duration = config.max_duration + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn yasdb_dirs_fall_back_to_env_when_flags_absent() {
        std::env::set_var("YASDB_HOME", "/opt/yasdb");
        let (home, _data) = resolve_yasdb_dirs(None, None);
        assert_eq!(home.as_deref(), Some("/opt/yasdb"));
        std::env::remove_var("YASDB_HOME");
    }
}
