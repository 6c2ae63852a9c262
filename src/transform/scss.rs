//! Sass compilation via `grass`.

use super::{as_text, Transform, TransformError};
use crate::config::StyleOutput;
use std::path::{Path, PathBuf};

/// Compiles `.scss` sources to CSS.
///
/// `@use`/`@import` resolve against the importing file's directory first,
/// then against each extra load path in order.
#[derive(Debug, Clone, Default)]
pub struct ScssCompiler {
    load_paths: Vec<PathBuf>,
    style: StyleOutput,
}

impl ScssCompiler {
    pub fn new(style: StyleOutput) -> Self {
        Self { load_paths: Vec::new(), style }
    }

    /// Add a directory searched for imports.
    pub fn with_load_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.load_paths.push(path.into());
        self
    }
}

impl Transform for ScssCompiler {
    fn name(&self) -> &'static str {
        "sass"
    }

    fn fingerprint(&self) -> String {
        format!("style={:?}", self.style)
    }

    fn apply(&self, path: &Path, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        let source = as_text(path, input)?;

        let style = match self.style {
            StyleOutput::Expanded => grass::OutputStyle::Expanded,
            StyleOutput::Compressed => grass::OutputStyle::Compressed,
        };
        let mut options = grass::Options::default().style(style);
        if let Some(dir) = path.parent() {
            options = options.load_path(dir);
        }
        for load_path in &self.load_paths {
            options = options.load_path(load_path);
        }

        grass::from_string(source.to_string(), &options)
            .map(String::into_bytes)
            .map_err(|e| TransformError::Sass { file: path.to_path_buf(), message: e.to_string() })
    }
}
