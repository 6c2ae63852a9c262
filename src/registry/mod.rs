//! Registries of named items.
//!
//! This module provides:
//! - A unified `Registry` trait for consistent registry interfaces
//! - `TaskRegistry` mapping task names and aliases to task definitions

mod task;
mod traits;

pub use task::{Step, TaskBody, TaskDefinition, TaskFn, TaskRegistry};
pub use traits::Registry;
