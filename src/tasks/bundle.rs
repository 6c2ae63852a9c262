//! bundle-and-minify: concatenate the assets referenced by HTML build blocks.

use super::{write, TaskError};
use crate::build::discovery::{discover, glob_base};
use crate::build::{BuildContext, TaskReport};
use crate::transform::{CssMinifier, JsMinifier, Transform};
use crate::useref;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Rewrite every HTML page into the production tree and write one
/// (minified) file per build-block target.
///
/// Pages sharing a target must agree on its contents; when they do not, the
/// first page wins and a warning is reported.
pub fn bundle_and_minify(ctx: &BuildContext) -> Result<TaskReport, TaskError> {
    let config = &ctx.config().bundle;
    let out_dir = ctx.resolve_path(&config.out);
    let base = ctx.resolve_path(&glob_base(&config.html));

    let mut outputs = Vec::new();
    let mut warnings = Vec::new();
    let mut written: HashMap<PathBuf, (Vec<u8>, PathBuf)> = HashMap::new();

    for page in discover(ctx.project_root(), &config.html)? {
        let html = std::fs::read_to_string(&page.path).map_err(TaskError::io(&page.path))?;
        let processed = useref::process(&page.path, &html, &base)?;
        warnings.extend(processed.warnings);

        let page_out = out_dir.join(&page.relative);
        write(&page_out, processed.html.as_bytes())?;
        outputs.push(page_out.clone());

        let page_dir = page_out.parent().unwrap_or(&out_dir).to_path_buf();
        for asset in processed.assets {
            let target = page_dir.join(&asset.target);
            let contents = minify(ctx, &target, asset.contents)?;

            if let Some((existing, first_page)) = written.get(&target) {
                if *existing != contents {
                    warnings.push(format!(
                        "{} builds {} differently than {}; keeping the first",
                        page.path.display(),
                        asset.target.display(),
                        first_page.display()
                    ));
                }
                continue;
            }

            write(&target, &contents)?;
            outputs.push(target.clone());
            written.insert(target, (contents, page.path.clone()));
        }
    }

    Ok(TaskReport::new("bundle-and-minify").with_outputs(outputs).with_warnings(warnings))
}

/// Minify by the target's extension, as enabled in the configuration.
fn minify(ctx: &BuildContext, target: &Path, contents: Vec<u8>) -> Result<Vec<u8>, TaskError> {
    let config = &ctx.config().bundle;
    let extension = target.extension().map(|e| e.to_string_lossy().to_lowercase());
    let minified = match extension.as_deref() {
        Some("js") if config.minify_js => JsMinifier.apply(target, &contents)?,
        Some("css") if config.minify_css => CssMinifier.apply(target, &contents)?,
        _ => contents,
    };
    Ok(minified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use std::fs;
    use tempfile::TempDir;

    const INDEX: &str = r#"<html>
<head>
    <!-- build:css css/styles.min.css -->
    <link rel="stylesheet" href="css/main.css">
    <!-- endbuild -->
</head>
<body>
    <!-- build:js js/main.min.js -->
    <script src="js/a.js"></script>
    <script src="js/b.js"></script>
    <!-- endbuild -->
</body>
</html>
"#;

    fn project() -> TempDir {
        let temp = TempDir::new().unwrap();
        let app = temp.path().join("app");
        fs::create_dir_all(app.join("css")).unwrap();
        fs::create_dir_all(app.join("js")).unwrap();
        fs::write(app.join("index.html"), INDEX).unwrap();
        fs::write(app.join("css/main.css"), "body {\n    margin: 0px;\n}\n").unwrap();
        fs::write(app.join("js/a.js"), "function first(value) {\n    return value + 1;\n}\n").unwrap();
        fs::write(app.join("js/b.js"), "var second = first(41);\n").unwrap();
        temp
    }

    #[test]
    fn test_pages_and_targets_written() {
        let temp = project();
        let ctx = BuildContext::new(default_config(), temp.path().to_path_buf());
        let report = bundle_and_minify(&ctx).unwrap();

        let dist = temp.path().join("dist");
        assert_eq!(report.outputs.len(), 3);
        let html = fs::read_to_string(dist.join("index.html")).unwrap();
        assert!(html.contains(r#"<script src="js/main.min.js"></script>"#));
        assert!(html.contains(r#"<link rel="stylesheet" href="css/styles.min.css">"#));

        let css = fs::read_to_string(dist.join("css/styles.min.css")).unwrap();
        assert!(css.contains("margin:0"));
        assert!(!css.contains('\n'));
        let js = fs::read_to_string(dist.join("js/main.min.js")).unwrap();
        assert!(js.contains("first"));
        assert!(js.len() < 70);
    }

    #[test]
    fn test_minification_can_be_disabled() {
        let temp = project();
        let mut config = default_config();
        config.bundle.minify_js = false;
        let ctx = BuildContext::new(config, temp.path().to_path_buf());
        bundle_and_minify(&ctx).unwrap();

        let js = fs::read_to_string(temp.path().join("dist/js/main.min.js")).unwrap();
        assert!(js.starts_with("function first(value) {\n"));
    }

    #[test]
    fn test_conflicting_targets_warn() {
        let temp = project();
        let other = INDEX.replace(r#"<script src="js/b.js"></script>"#, "");
        fs::write(temp.path().join("app/other.html"), other).unwrap();

        let ctx = BuildContext::new(default_config(), temp.path().to_path_buf());
        let report = bundle_and_minify(&ctx).unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("js/main.min.js"));
        // Two pages, two shared targets written once
        assert_eq!(report.outputs.len(), 4);
    }

    #[test]
    fn test_missing_reference_fails() {
        let temp = project();
        fs::remove_file(temp.path().join("app/js/b.js")).unwrap();
        let ctx = BuildContext::new(default_config(), temp.path().to_path_buf());
        assert!(matches!(bundle_and_minify(&ctx), Err(TaskError::Useref(_))));
    }

    #[test]
    fn test_target_escaping_output_is_refused() {
        let temp = project();
        let index = INDEX.replace("build:js js/main.min.js", "build:js ../../escaped.js");
        fs::write(temp.path().join("app/index.html"), index).unwrap();

        let ctx = BuildContext::new(default_config(), temp.path().to_path_buf());
        let err = bundle_and_minify(&ctx).unwrap_err();
        assert!(matches!(err, TaskError::Useref(useref::UserefError::TargetEscapes { .. })));
        assert!(!temp.path().join("escaped.js").exists());
        assert!(!temp.path().parent().unwrap().join("escaped.js").exists());
    }
}
