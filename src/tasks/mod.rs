//! The task inventory.
//!
//! Each leaf task selects inputs by glob, pipes them through transforms and
//! writes them to an output directory. [`standard_registry`] wires the leaf
//! tasks into the `build` and `default` sequences.

pub mod bundle;
pub mod clean;
pub mod fonts;
pub mod images;
pub mod serve;
pub mod styles;

use crate::build::discovery::DiscoveryError;
use crate::build::{BuildContext, TaskReport};
use crate::cache::CacheError;
use crate::registry::{Step, TaskDefinition, TaskRegistry};
use crate::server::ServerError;
use crate::transform::TransformError;
use crate::useref::UserefError;
use crate::watch::WatchError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error raised by a task.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TaskError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Useref(#[from] UserefError),
    /// IO error on a specific file
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error(transparent)]
    Watch(#[from] WatchError),
    /// Deleting the configured directory is not allowed
    #[error("Refusing to delete {path}: {reason} (set clean.force = true to override)")]
    CleanRefused { path: PathBuf, reason: String },
    #[error("{0}")]
    Message(String),
}

impl TaskError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> TaskError + '_ {
        move |source| TaskError::Io { path: path.to_path_buf(), source }
    }
}

/// Read a file, naming it in the error.
pub(crate) fn read(path: &Path) -> Result<Vec<u8>, TaskError> {
    std::fs::read(path).map_err(TaskError::io(path))
}

/// Write a file, creating its parent directories.
pub(crate) fn write(path: &Path, contents: &[u8]) -> Result<(), TaskError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(TaskError::io(parent))?;
    }
    std::fs::write(path, contents).map_err(TaskError::io(path))?;
    tracing::debug!(file = %path.display(), bytes = contents.len(), "wrote");
    Ok(())
}

fn watch_task(ctx: &BuildContext) -> Result<TaskReport, TaskError> {
    crate::watch::watch(ctx)?;
    Ok(TaskReport::default())
}

/// The task graph of the pipeline.
///
/// | Task | Alias |
/// |---|---|
/// | `style-compile` | `sass` |
/// | `dev-server` | `browserSync` |
/// | `watch` | |
/// | `bundle-and-minify` | `useref` |
/// | `image-optimize` | `images` |
/// | `copy-fonts` | `fonts` |
/// | `clean-output` | `clean:dist` |
/// | `clear-cache` | `cache:clear` |
/// | `build` | |
/// | `default` | |
pub fn standard_registry() -> TaskRegistry {
    let mut registry = TaskRegistry::new();

    registry.register(
        TaskDefinition::leaf("style-compile", "Compile Sass sources to CSS", styles::compile_styles)
            .with_alias("sass"),
    );
    registry.register(
        TaskDefinition::leaf(
            "dev-server",
            "Serve the source tree with live reload",
            serve::start_dev_server,
        )
        .with_alias("browserSync"),
    );
    registry.register(TaskDefinition::leaf(
        "watch",
        "Recompile styles and reload browsers on changes",
        watch_task,
    ));
    registry.register(
        TaskDefinition::leaf(
            "bundle-and-minify",
            "Concatenate and minify the scripts and stylesheets referenced by HTML",
            bundle::bundle_and_minify,
        )
        .with_alias("useref"),
    );
    registry.register(
        TaskDefinition::leaf("image-optimize", "Optimize images", images::optimize_images)
            .with_alias("images"),
    );
    registry.register(
        TaskDefinition::leaf("copy-fonts", "Copy fonts to the production tree", fonts::copy_fonts)
            .with_alias("fonts"),
    );
    registry.register(
        TaskDefinition::leaf("clean-output", "Delete the production tree", clean::clean_output)
            .with_alias("clean:dist"),
    );
    registry.register(
        TaskDefinition::leaf("clear-cache", "Clear the image cache", clean::clear_cache)
            .with_alias("cache:clear"),
    );

    registry.register(TaskDefinition::sequence(
        "build",
        "Produce the production tree",
        vec![
            Step::task("clean-output"),
            Step::parallel(&["style-compile", "bundle-and-minify", "image-optimize", "copy-fonts"]),
        ],
    ));
    registry.register(TaskDefinition::sequence(
        "default",
        "Compile styles, serve and watch",
        vec![Step::parallel(&["style-compile", "dev-server"]), Step::task("watch")],
    ));

    registry
}

/// Path with `/` separators, as used in URLs.
pub(crate) fn url_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    #[test]
    fn test_standard_registry_names_and_aliases() {
        let registry = standard_registry();
        for (name, alias) in [
            ("style-compile", "sass"),
            ("dev-server", "browserSync"),
            ("bundle-and-minify", "useref"),
            ("image-optimize", "images"),
            ("copy-fonts", "fonts"),
            ("clean-output", "clean:dist"),
            ("clear-cache", "cache:clear"),
        ] {
            assert_eq!(registry.canonical_name(alias), Some(name));
        }
        assert!(registry.contains("watch"));
        assert_eq!(registry.len(), 10);
    }

    #[test]
    fn test_build_cleans_first() {
        let registry = standard_registry();
        let build = registry.get("build").unwrap();
        assert_eq!(build.steps()[0], Step::task("clean-output"));
        assert_eq!(build.steps()[1].tasks().len(), 4);

        let default = registry.get("default").unwrap();
        assert_eq!(default.steps().last(), Some(&Step::task("watch")));
    }

    #[test]
    fn test_url_path() {
        assert_eq!(url_path(Path::new("css/sub/main.css")), "css/sub/main.css");
    }
}
