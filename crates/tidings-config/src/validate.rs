//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Upper bound for `bus.worker_threads`.
pub const MAX_WORKER_THREADS: usize = 256;

/// Accepted values for `logging.level`.
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Accepted values for `logging.format`.
pub const LOG_FORMATS: &[&str] = &["pretty", "compact", "json", "full"];

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_bus(config)?;
    validate_logging(config)?;
    Ok(())
}

fn validate_bus(config: &Config) -> ConfigResult<()> {
    let bus = &config.bus;

    if bus.default_channel.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "bus.default_channel".to_owned(),
            message: "default channel must not be empty".to_owned(),
        });
    }

    if bus.worker_threads == 0 || bus.worker_threads > MAX_WORKER_THREADS {
        return Err(ConfigError::ValidationError {
            field: "bus.worker_threads".to_owned(),
            message: format!(
                "worker_threads is {}; must be between 1 and {MAX_WORKER_THREADS}",
                bus.worker_threads
            ),
        });
    }

    if bus.worker_thread_name.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "bus.worker_thread_name".to_owned(),
            message: "worker thread name must not be empty".to_owned(),
        });
    }

    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
        return Err(ConfigError::ValidationError {
            field: "logging.level".to_owned(),
            message: format!(
                "unsupported log level '{}'; expected one of: {}",
                config.logging.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if !LOG_FORMATS.contains(&config.logging.format.as_str()) {
        return Err(ConfigError::ValidationError {
            field: "logging.format".to_owned(),
            message: format!(
                "unsupported log format '{}'; expected one of: {}",
                config.logging.format,
                LOG_FORMATS.join(", ")
            ),
        });
    }

    if let Some(bad) = config
        .logging
        .directives
        .iter()
        .find(|directive| directive.trim().is_empty())
    {
        return Err(ConfigError::ValidationError {
            field: "logging.directives".to_owned(),
            message: format!("empty tracing directive {bad:?}"),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: ConfigError) -> String {
        match err {
            ConfigError::ValidationError { field, .. } => field,
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_empty_default_channel() {
        let mut config = Config::default();
        config.bus.default_channel = "  ".to_owned();
        assert_eq!(field_of(validate(&config).unwrap_err()), "bus.default_channel");
    }

    #[test]
    fn test_worker_threads_bounds() {
        let mut config = Config::default();
        config.bus.worker_threads = 0;
        assert_eq!(field_of(validate(&config).unwrap_err()), "bus.worker_threads");

        config.bus.worker_threads = MAX_WORKER_THREADS.saturating_add(1);
        assert!(validate(&config).is_err());

        config.bus.worker_threads = MAX_WORKER_THREADS;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_empty_thread_name() {
        let mut config = Config::default();
        config.bus.worker_thread_name = String::new();
        assert_eq!(
            field_of(validate(&config).unwrap_err()),
            "bus.worker_thread_name"
        );
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_owned();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("verbose"));
    }

    #[test]
    fn test_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_owned();
        assert_eq!(field_of(validate(&config).unwrap_err()), "logging.format");
    }

    #[test]
    fn test_empty_directive() {
        let mut config = Config::default();
        config.logging.directives = vec!["tidings_events=debug".to_owned(), String::new()];
        assert_eq!(field_of(validate(&config).unwrap_err()), "logging.directives");
    }
}
