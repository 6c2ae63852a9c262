//! Script minification via `oxc`.

use super::{as_text, Transform, TransformError};
use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{Minifier, MinifierOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

/// Minifies JavaScript as a classic (non-module) script, so top-level
/// names stay global and shared between concatenated files.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsMinifier;

impl Transform for JsMinifier {
    fn name(&self) -> &'static str {
        "uglify"
    }

    fn fingerprint(&self) -> String {
        "oxc-script".to_string()
    }

    fn apply(&self, path: &Path, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        let source = as_text(path, input)?;
        let js_error = |message: String| TransformError::Js { file: path.to_path_buf(), message };

        // A minifier bug must fail this file, not the whole run
        catch_unwind(AssertUnwindSafe(|| minify(source)))
            .map_err(|_| js_error("minifier crashed on this input".to_string()))?
            .map(String::into_bytes)
            .map_err(js_error)
    }
}

fn minify(source: &str) -> Result<String, String> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, source, SourceType::cjs()).parse();
    if parsed.panicked || !parsed.errors.is_empty() {
        let messages: Vec<String> = parsed.errors.iter().map(ToString::to_string).collect();
        return Err(if messages.is_empty() {
            "could not parse script".to_string()
        } else {
            messages.join("; ")
        });
    }

    let mut program = parsed.program;
    let minified = Minifier::new(MinifierOptions::default()).minify(&allocator, &mut program);
    let output = Codegen::new()
        .with_options(CodegenOptions::minify())
        .with_scoping(minified.scoping)
        .build(&program);
    Ok(output.code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minify_str(source: &str) -> String {
        String::from_utf8(JsMinifier.apply(Path::new("main.js"), source.as_bytes()).unwrap())
            .unwrap()
    }

    #[test]
    fn test_minified_output_is_smaller() {
        let source = "// greet the user\nfunction greet(name) {\n    var message = 'hello ' + name;\n    return message;\n}\n";
        let out = minify_str(source);
        assert!(out.len() < source.len());
        assert!(!out.contains("greet the user"));
        assert!(out.contains("greet"));
    }

    #[test]
    fn test_accessors_stay_accessors() {
        let out = minify_str(
            "var obj = { get size() { return 1; }, set size(v) { this._v = v; } };\nwindow.obj = obj;\n",
        );
        assert!(out.contains("get size()"), "{}", out);
        assert!(out.contains("set size("), "{}", out);
    }

    #[test]
    fn test_top_level_names_stay_global() {
        let out = minify_str("var counter = 0;\nfunction bump(step) { counter += step; }\n");
        assert!(out.contains("counter"), "{}", out);
        assert!(out.contains("function bump("), "{}", out);
    }

    #[test]
    fn test_function_in_block_is_accepted() {
        let out = minify_str("if (window.ready) function start() { return 1; }\nstart();\n");
        assert!(out.contains("window.ready"), "{}", out);
        assert!(out.contains("function"), "{}", out);
    }

    #[test]
    fn test_syntax_error_names_file() {
        let err = JsMinifier.apply(Path::new("broken.js"), b"function ( {").unwrap_err();
        assert!(matches!(err, TransformError::Js { ref file, .. } if file == Path::new("broken.js")));
    }
}
