//! Stylesheet minification via `lightningcss`.

use super::{as_text, Transform, TransformError};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use std::path::Path;

/// Minifies CSS: merges rules, shortens values, strips whitespace and comments.
#[derive(Debug, Default, Clone, Copy)]
pub struct CssMinifier;

impl Transform for CssMinifier {
    fn name(&self) -> &'static str {
        "cssmin"
    }

    fn apply(&self, path: &Path, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        let source = as_text(path, input)?;
        let css_error =
            |message: String| TransformError::Css { file: path.to_path_buf(), message };

        let options =
            ParserOptions { filename: path.display().to_string(), ..ParserOptions::default() };
        let mut sheet = StyleSheet::parse(source, options).map_err(|e| css_error(e.to_string()))?;
        sheet.minify(MinifyOptions::default()).map_err(|e| css_error(e.to_string()))?;

        let printed = sheet
            .to_css(PrinterOptions { minify: true, ..PrinterOptions::default() })
            .map_err(|e| css_error(e.to_string()))?;
        Ok(printed.code.into_bytes())
    }
}
