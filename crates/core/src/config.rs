use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reconcile::RetryPolicy;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub reconcile: ReconcileConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ReconcileConfig {
    /// Cool-down after a settled refetch, per (studio, promise) key.
    pub cooldown_secs: u64,
    pub poll_interval_secs: u64,
    pub max_poll_attempts: u32,
}

impl ReconcileConfig {
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cooldown_secs as i64)
    }

    pub fn poll_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_poll_attempts, Duration::from_secs(self.poll_interval_secs))
    }
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub cooldown_secs: Option<u64>,
    pub poll_interval_secs: Option<u64>,
    pub max_poll_attempts: Option<u32>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            reconcile: ReconcileConfig {
                cooldown_secs: 5,
                poll_interval_secs: 3,
                max_poll_attempts: 10,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("cierre.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(reconcile) = patch.reconcile {
            if let Some(cooldown_secs) = reconcile.cooldown_secs {
                self.reconcile.cooldown_secs = cooldown_secs;
            }
            if let Some(poll_interval_secs) = reconcile.poll_interval_secs {
                self.reconcile.poll_interval_secs = poll_interval_secs;
            }
            if let Some(max_poll_attempts) = reconcile.max_poll_attempts {
                self.reconcile.max_poll_attempts = max_poll_attempts;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CIERRE_RECONCILE_COOLDOWN_SECS") {
            self.reconcile.cooldown_secs = parse_u64("CIERRE_RECONCILE_COOLDOWN_SECS", &value)?;
        }
        if let Some(value) = read_env("CIERRE_RECONCILE_POLL_INTERVAL_SECS") {
            self.reconcile.poll_interval_secs =
                parse_u64("CIERRE_RECONCILE_POLL_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("CIERRE_RECONCILE_MAX_POLL_ATTEMPTS") {
            self.reconcile.max_poll_attempts =
                parse_u32("CIERRE_RECONCILE_MAX_POLL_ATTEMPTS", &value)?;
        }

        let log_level = read_env("CIERRE_LOGGING_LEVEL").or_else(|| read_env("CIERRE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CIERRE_LOGGING_FORMAT").or_else(|| read_env("CIERRE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(cooldown_secs) = overrides.cooldown_secs {
            self.reconcile.cooldown_secs = cooldown_secs;
        }
        if let Some(poll_interval_secs) = overrides.poll_interval_secs {
            self.reconcile.poll_interval_secs = poll_interval_secs;
        }
        if let Some(max_poll_attempts) = overrides.max_poll_attempts {
            self.reconcile.max_poll_attempts = max_poll_attempts;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_reconcile(&self.reconcile)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("cierre.toml"), PathBuf::from("config/cierre.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    toml::from_str::<ConfigPatch>(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn validate_reconcile(reconcile: &ReconcileConfig) -> Result<(), ConfigError> {
    if reconcile.cooldown_secs == 0 || reconcile.cooldown_secs > 300 {
        return Err(ConfigError::Validation(
            "reconcile.cooldown_secs must be in range 1..=300".to_string(),
        ));
    }

    if reconcile.poll_interval_secs == 0 || reconcile.poll_interval_secs > 60 {
        return Err(ConfigError::Validation(
            "reconcile.poll_interval_secs must be in range 1..=60".to_string(),
        ));
    }

    if reconcile.max_poll_attempts == 0 {
        return Err(ConfigError::Validation(
            "reconcile.max_poll_attempts must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    reconcile: Option<ReconcilePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ReconcilePatch {
    cooldown_secs: Option<u64>,
    poll_interval_secs: Option<u64>,
    max_poll_attempts: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_match_the_documented_timings() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;
        ensure(config.reconcile.cooldown_secs == 5, "default cooldown should be 5 seconds")?;
        ensure(config.reconcile.poll_interval_secs == 3, "default poll interval should be 3")?;
        ensure(config.reconcile.max_poll_attempts == 10, "default attempts should be 10")?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CIERRE_LOG_LEVEL", "warn");
        env::set_var("CIERRE_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "log level should come from the env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should come from the env var",
            )?;
            Ok(())
        })();

        clear_vars(&["CIERRE_LOG_LEVEL", "CIERRE_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CIERRE_RECONCILE_POLL_INTERVAL_SECS", "7");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("cierre.toml");
            fs::write(
                &path,
                r#"
[reconcile]
cooldown_secs = 9
poll_interval_secs = 4

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    cooldown_secs: Some(12),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.reconcile.cooldown_secs == 12, "override cooldown should win")?;
            ensure(
                config.reconcile.poll_interval_secs == 7,
                "env poll interval should win over the file",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            Ok(())
        })();

        clear_vars(&["CIERRE_RECONCILE_POLL_INTERVAL_SECS"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CIERRE_RECONCILE_COOLDOWN_SECS", "0");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("cooldown_secs")
            );
            ensure(has_message, "validation failure should mention cooldown_secs")
        })();

        clear_vars(&["CIERRE_RECONCILE_COOLDOWN_SECS"]);
        result
    }

    #[test]
    fn invalid_env_number_is_reported_with_its_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CIERRE_RECONCILE_MAX_POLL_ATTEMPTS", "many");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected parse failure but config load succeeded".to_string()),
                Err(error) => error,
            };
            let has_key = matches!(
                error,
                ConfigError::InvalidEnvOverride { ref key, .. }
                    if key == "CIERRE_RECONCILE_MAX_POLL_ATTEMPTS"
            );
            ensure(has_key, "error should name the offending variable")
        })();

        clear_vars(&["CIERRE_RECONCILE_MAX_POLL_ATTEMPTS"]);
        result
    }
}
