//! File transformations applied by pipeline tasks.
//!
//! Every transformation is an implementation of [`Transform`]: bytes in,
//! bytes out, with a stable fingerprint of its options so results can be
//! cached. Tasks only know about the trait, so any implementation can be
//! swapped for another library without touching the task graph.

mod css;
mod image;
mod js;
mod scss;

pub use self::css::CssMinifier;
pub use self::image::ImageOptimizer;
pub use self::js::JsMinifier;
pub use self::scss::ScssCompiler;

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error raised by a transformation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransformError {
    /// Input was expected to be text
    #[error("{0} is not valid UTF-8")]
    NotUtf8(PathBuf),
    /// Style preprocessor error
    #[error("Sass error in {file}: {message}")]
    Sass { file: PathBuf, message: String },
    /// Stylesheet minifier error
    #[error("CSS error in {file}: {message}")]
    Css { file: PathBuf, message: String },
    /// Script minifier error
    #[error("JavaScript error in {file}: {message}")]
    Js { file: PathBuf, message: String },
    /// Image codec error
    #[error("Image error in {file}: {source}")]
    Image {
        file: PathBuf,
        #[source]
        source: ::image::ImageError,
    },
}

/// A byte-level file transformation.
pub trait Transform: Send + Sync {
    /// Short name used in logs and as the cache namespace.
    fn name(&self) -> &'static str;

    /// Options that influence the output; part of every cache key.
    fn fingerprint(&self) -> String {
        String::new()
    }

    /// Transform `input`, the contents of the file at `path`.
    fn apply(&self, path: &Path, input: &[u8]) -> Result<Vec<u8>, TransformError>;
}

/// Identity transformation (plain copy).
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl Transform for Passthrough {
    fn name(&self) -> &'static str {
        "copy"
    }

    fn apply(&self, _path: &Path, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        Ok(input.to_vec())
    }
}

/// Interpret `input` as UTF-8 text.
pub(crate) fn as_text<'a>(path: &Path, input: &'a [u8]) -> Result<&'a str, TransformError> {
    std::str::from_utf8(input).map_err(|_| TransformError::NotUtf8(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_is_identity() {
        let bytes = vec![0u8, 159, 146, 150, 255];
        let out = Passthrough.apply(Path::new("font.woff2"), &bytes).unwrap();
        assert_eq!(out, bytes);
        assert_eq!(Passthrough.fingerprint(), "");
    }

    #[test]
    fn test_as_text_rejects_binary() {
        let result = as_text(Path::new("bad.css"), &[0xff, 0xfe]);
        assert!(matches!(result, Err(TransformError::NotUtf8(_))));
    }
}
