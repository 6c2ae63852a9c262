//! Source file discovery for the asset pipeline.
//!
//! Selects input files with glob patterns the way stream-based front-end
//! tools do: brace alternation is expanded, dotfiles are not matched, and
//! every match remembers its path relative to the pattern's glob base so
//! outputs can mirror the source tree.

use glob::{glob_with, MatchOptions, Pattern};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Error during source discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Invalid glob pattern
    #[error("Invalid glob pattern '{0}': {1}")]
    InvalidPattern(String, glob::PatternError),
    /// Unbalanced `{`/`}` in a pattern
    #[error("Unbalanced braces in glob pattern '{0}'")]
    UnbalancedBraces(String),
}

/// A file selected by a glob pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute (or root-joined) path to the file
    pub path: PathBuf,
    /// Path relative to the glob base of the pattern that selected it
    pub relative: PathBuf,
}

const MAGIC: &[char] = &['*', '?', '[', '{'];

fn match_options() -> MatchOptions {
    MatchOptions { case_sensitive: true, require_literal_separator: true, require_literal_leading_dot: true }
}

/// Expand `{a,b}` alternation in a glob pattern.
///
/// Nested groups are expanded recursively. A pattern without braces expands
/// to itself.
pub fn expand_braces(pattern: &str) -> Result<Vec<String>, DiscoveryError> {
    let Some(open) = pattern.find('{') else {
        if pattern.contains('}') {
            return Err(DiscoveryError::UnbalancedBraces(pattern.to_string()));
        }
        return Ok(vec![pattern.to_string()]);
    };

    // Find the matching close brace and the top-level commas inside it
    let mut depth = 0usize;
    let mut close = None;
    let mut splits = Vec::new();
    for (i, c) in pattern[open..].char_indices() {
        let i = open + i;
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(i);
                    break;
                }
            }
            ',' if depth == 1 => splits.push(i),
            _ => {}
        }
    }
    let close = close.ok_or_else(|| DiscoveryError::UnbalancedBraces(pattern.to_string()))?;

    let prefix = &pattern[..open];
    let suffix = &pattern[close + 1..];
    let mut bounds = vec![open];
    bounds.extend(splits);
    bounds.push(close);

    let mut expanded = Vec::new();
    for pair in bounds.windows(2) {
        let alternative = &pattern[pair[0] + 1..pair[1]];
        let candidate = format!("{}{}{}", prefix, alternative, suffix);
        expanded.extend(expand_braces(&candidate)?);
    }
    Ok(expanded)
}

/// The non-magic leading directory of a glob pattern.
///
/// `app/scss/**/*.scss` has base `app/scss`; a literal file path has its
/// parent directory as base.
pub fn glob_base(pattern: &str) -> PathBuf {
    let mut base = PathBuf::new();
    let components: Vec<&str> = pattern.split('/').collect();
    let last = components.len().saturating_sub(1);

    for (i, component) in components.iter().enumerate() {
        if component.contains(MAGIC) || i == last {
            break;
        }
        if component.is_empty() && i == 0 {
            base.push("/");
        } else {
            base.push(component);
        }
    }
    base
}

/// Discover files under `root` matching `pattern`.
///
/// Results are sorted and de-duplicated; directories are skipped.
pub fn discover(root: &Path, pattern: &str) -> Result<Vec<SourceFile>, DiscoveryError> {
    let base = root.join(glob_base(pattern));
    let mut found: BTreeMap<PathBuf, PathBuf> = BTreeMap::new();

    for expanded in expand_braces(pattern)? {
        let full_pattern = root.join(&expanded);
        let pattern_str = full_pattern.to_string_lossy();

        let paths = glob_with(&pattern_str, match_options())
            .map_err(|e| DiscoveryError::InvalidPattern(pattern.to_string(), e))?;

        for entry in paths {
            match entry {
                Ok(path) if path.is_file() => {
                    let relative = path
                        .strip_prefix(&base)
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|_| path.file_name().map(PathBuf::from).unwrap_or_default());
                    found.insert(path, relative);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("error reading path during discovery: {}", e);
                }
            }
        }
    }

    Ok(found.into_iter().map(|(path, relative)| SourceFile { path, relative }).collect())
}

/// Check whether `path` is selected by `pattern` relative to `root`.
///
/// Paths outside `root` never match.
pub fn matches(root: &Path, pattern: &str, path: &Path) -> Result<bool, DiscoveryError> {
    let Ok(relative) = path.strip_prefix(root) else {
        return Ok(false);
    };
    let relative = normalize(relative);

    for expanded in expand_braces(pattern)? {
        let compiled = Pattern::new(&expanded)
            .map_err(|e| DiscoveryError::InvalidPattern(pattern.to_string(), e))?;
        if compiled.matches_path_with(&relative, match_options()) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Drop `.` components so `./app/x.scss` and `app/x.scss` compare equal.
fn normalize(path: &Path) -> PathBuf {
    path.components().filter(|c| !matches!(c, Component::CurDir)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, rel).unwrap();
    }

    #[test]
    fn test_expand_braces_simple() {
        let expanded = expand_braces("images/*.{png,jpg}").unwrap();
        assert_eq!(expanded, vec!["images/*.png", "images/*.jpg"]);
    }

    #[test]
    fn test_expand_braces_nested() {
        let expanded = expand_braces("{a,b{1,2}}/x").unwrap();
        assert_eq!(expanded, vec!["a/x", "b1/x", "b2/x"]);
    }

    #[test]
    fn test_expand_braces_multiple_groups() {
        let expanded = expand_braces("{a,b}/{c,d}").unwrap();
        assert_eq!(expanded, vec!["a/c", "a/d", "b/c", "b/d"]);
    }

    #[test]
    fn test_expand_braces_none() {
        assert_eq!(expand_braces("app/*.html").unwrap(), vec!["app/*.html"]);
    }

    #[test]
    fn test_expand_braces_unbalanced() {
        assert!(matches!(expand_braces("app/{a,b"), Err(DiscoveryError::UnbalancedBraces(_))));
        assert!(matches!(expand_braces("app/a}"), Err(DiscoveryError::UnbalancedBraces(_))));
    }

    #[test]
    fn test_glob_base() {
        assert_eq!(glob_base("app/scss/**/*.scss"), PathBuf::from("app/scss"));
        assert_eq!(glob_base("app/*.html"), PathBuf::from("app"));
        assert_eq!(glob_base("app/images/**/*.{png,jpg}"), PathBuf::from("app/images"));
        assert_eq!(glob_base("app/fonts/**/*"), PathBuf::from("app/fonts"));
        assert_eq!(glob_base("app/index.html"), PathBuf::from("app"));
        assert_eq!(glob_base("*.css"), PathBuf::new());
    }

    #[test]
    fn test_discover_relative_paths_mirror_tree() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "app/scss/main.scss");
        touch(temp.path(), "app/scss/pages/home.scss");
        touch(temp.path(), "app/scss/readme.md");

        let files = discover(temp.path(), "app/scss/**/*.scss").unwrap();
        let relative: Vec<_> = files.iter().map(|f| f.relative.clone()).collect();
        assert_eq!(relative, vec![PathBuf::from("main.scss"), PathBuf::from("pages/home.scss")]);
    }

    #[test]
    fn test_discover_brace_patterns_dedup() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "app/images/a.png");
        touch(temp.path(), "app/images/b.jpg");
        touch(temp.path(), "app/images/c.txt");

        let files = discover(temp.path(), "app/images/**/*.{png,jpg,png}").unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_discover_skips_dotfiles_and_dirs() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "app/fonts/font.woff");
        touch(temp.path(), "app/fonts/.DS_Store");
        fs::create_dir_all(temp.path().join("app/fonts/empty")).unwrap();

        let files = discover(temp.path(), "app/fonts/**/*").unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative, PathBuf::from("font.woff"));
    }

    #[test]
    fn test_matches_relative_to_root() {
        let root = Path::new("/project");
        assert!(matches(root, "app/*.html", Path::new("/project/app/index.html")).unwrap());
        assert!(!matches(root, "app/*.html", Path::new("/project/app/sub/index.html")).unwrap());
        assert!(matches(root, "app/js/**/*.js", Path::new("/project/app/js/a/b.js")).unwrap());
        assert!(matches(root, "app/js/**/*.js", Path::new("/project/app/js/main.js")).unwrap());
        assert!(!matches(root, "app/*.html", Path::new("/other/app/index.html")).unwrap());
    }
}
