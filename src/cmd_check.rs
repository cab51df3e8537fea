//! `jobweave check`: validate the configuration.

use anyhow::{bail, Result};

use jobweave_config::{Config, ConfigValidator};

pub(crate) fn check(config: &Config) -> Result<()> {
    let result = ConfigValidator::validate(config)?;

    for warning in &result.warnings {
        println!("warning: {}: {}", warning.path, warning.message);
    }
    for error in &result.errors {
        println!("error: {}: {}", error.path, error.message);
    }

    if !result.is_valid() {
        bail!("configuration has {} error(s)", result.errors.len());
    }
    println!("{} timer(s) configured", config.timers.len());
    Ok(())
}
