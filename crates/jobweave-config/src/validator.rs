//! Configuration validation.

use std::collections::HashSet;

use jobweave_scheduling::ScheduleError;

use crate::error::ConfigError;
use crate::schema::Config;

const LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// The first error as a [`ConfigError`], if any.
    pub fn into_error(self) -> Option<ConfigError> {
        self.errors.into_iter().next().map(|e| ConfigError::InvalidValue {
            field: e.path,
            message: e.message,
        })
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        Self::validate_logging(config, &mut result);
        Self::validate_scheduling(config, &mut result);
        Self::validate_timers(config, &mut result);

        Ok(result)
    }

    fn validate_logging(config: &Config, result: &mut ValidationResult) {
        let level = config.logging.level.trim();
        if level.is_empty() {
            result.add_error(ValidationError::new("logging.level", "Level cannot be empty"));
        } else if !level.contains('=') && !LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
            result.add_warning(ValidationWarning::new(
                "logging.level",
                format!("Unknown level '{}', valid values: {:?}", level, LEVELS),
            ));
        }

        if config.logging.file_prefix.is_empty() {
            result.add_error(ValidationError::new(
                "logging.file_prefix",
                "file_prefix cannot be empty",
            ));
        }
    }

    fn validate_scheduling(config: &Config, result: &mut ValidationResult) {
        let scheduling = &config.scheduling;
        if scheduling.executor_threads == 0 {
            result.add_error(ValidationError::new(
                "scheduling.executor_threads",
                "executor_threads must be greater than 0",
            ));
        }

        if scheduling.lock_timeout_ms > 0 && scheduling.lock_timeout_ms < 100 {
            result.add_warning(ValidationWarning::new(
                "scheduling.lock_timeout_ms",
                "lock_timeout_ms is very low (<100), busy jobs may report lock timeouts",
            ));
        }

        if scheduling.stop_timeout_ms == 0 {
            result.add_warning(ValidationWarning::new(
                "scheduling.stop_timeout_ms",
                "stop_timeout_ms is 0, stopping will not wait for running jobs",
            ));
        }
    }

    fn validate_timers(config: &Config, result: &mut ValidationResult) {
        if config.timers.is_empty() {
            result.add_warning(ValidationWarning::new("timers", "No timers configured"));
        }

        let mut names = HashSet::new();
        for (i, timer) in config.timers.iter().enumerate() {
            let path = format!("timers[{}]", i);

            if timer.name.trim().is_empty() {
                result.add_error(ValidationError::new(
                    format!("{}.name", path),
                    "Timer name cannot be empty",
                ));
            } else if !names.insert(timer.name.as_str()) {
                result.add_error(ValidationError::new(
                    format!("{}.name", path),
                    format!("Duplicate timer name '{}'", timer.name),
                ));
            }

            if let Err(e) = timer.validate() {
                let field = match e {
                    ScheduleError::InvalidTimeZone(_) => "time_zone",
                    _ => "schedule",
                };
                result.add_error(ValidationError::new(format!("{}.{}", path, field), e.to_string()));
            }

            if timer.retry.is_some() && timer.halt_on_failure {
                result.add_warning(ValidationWarning::new(
                    format!("{}.halt_on_failure", path),
                    "Timer halts once its retries are used up",
                ));
            }
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
