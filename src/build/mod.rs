//! Task execution for sitepipe
//!
//! Provides the machinery that runs the task graph.
//!
//! # Overview
//!
//! - **Discovery**: Find source files using glob patterns from config
//! - **Context**: Configuration, paths and shared services for one run
//! - **Execution**: Run leaf tasks and composite sequences, fanning out
//!   concurrent steps over worker threads
//! - **Progress**: Report task events to the console or as JSON
//!
//! # Example
//!
//! ```ignore
//! use sitepipe::build::{BuildContext, TaskRunner};
//! use sitepipe::config::load_config;
//! use sitepipe::tasks::standard_registry;
//!
//! let config = load_config(None)?;
//! let context = BuildContext::new(config, project_root);
//! let result = TaskRunner::new(&standard_registry(), &context).run("build")?;
//! assert!(result.is_success());
//! ```

pub mod context;
pub mod discovery;
pub mod parallel;
pub mod pipeline;
pub mod progress;
pub mod result;

pub use context::*;
pub use discovery::*;
pub use parallel::*;
pub use pipeline::*;
pub use result::*;
