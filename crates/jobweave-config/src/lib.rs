//! # jobweave config
//!
//! TOML configuration for the jobweave daemon: logging, scheduling
//! defaults and the timers to run.

mod error;
mod loader;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};
