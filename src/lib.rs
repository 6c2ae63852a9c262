//! sitepipe - front-end asset pipeline
//!
//! This library provides functionality to:
//! - Compile Sass sources to CSS
//! - Bundle and minify the scripts and stylesheets referenced by HTML build blocks
//! - Optimize images through a content-addressed cache
//! - Copy fonts and clean the production tree
//! - Serve the source tree with live reload and watch it for changes

pub mod build;
pub mod cache;
pub mod cli;
pub mod config;
pub mod livereload;
pub mod registry;
pub mod server;
pub mod tasks;
pub mod transform;
pub mod useref;
pub mod watch;
