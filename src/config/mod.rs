//! Configuration module for the sitepipe asset pipeline
//!
//! Provides types and parsing for `sitepipe.toml` project configuration.

pub mod loader;
pub mod schema;

pub use loader::{default_config, load_config, ConfigError};
pub use schema::*;
