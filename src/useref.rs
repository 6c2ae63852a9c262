//! HTML build-block processing.
//!
//! Script and stylesheet references wrapped in build comments are
//! concatenated into one asset per block, and the block is replaced by a
//! single reference to that asset:
//!
//! ```html
//! <!-- build:js js/main.min.js -->
//! <script src="js/lib.js"></script>
//! <script src="js/main.js"></script>
//! <!-- endbuild -->
//! ```
//!
//! becomes `<script src="js/main.min.js"></script>` plus a `js/main.min.js`
//! asset holding both files. Block types are `js`, `css` and `remove`; an
//! optional `(path)` or `({a,b})` after the type lists alternate directories
//! (relative to the HTML file) searched for the referenced files.

use regex::Regex;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

/// Error while processing build blocks.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UserefError {
    #[error("{file}:{line}: build block is never closed")]
    Unclosed { file: PathBuf, line: usize },
    #[error("{file}:{line}: endbuild without a matching build block")]
    UnexpectedEnd { file: PathBuf, line: usize },
    #[error("{file}:{line}: build blocks cannot be nested")]
    Nested { file: PathBuf, line: usize },
    #[error("{file}:{line}: unknown build block type '{kind}'")]
    UnknownType { file: PathBuf, line: usize, kind: String },
    #[error("{file}:{line}: build:{kind} block needs a target path")]
    MissingTarget { file: PathBuf, line: usize, kind: String },
    #[error("{file}:{line}: target '{target}' points outside the output directory")]
    TargetEscapes { file: PathBuf, line: usize, target: String },
    #[error("{file}: referenced file '{reference}' not found (searched {searched})")]
    MissingReference { file: PathBuf, reference: String, searched: String },
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Type of a build block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Js,
    Css,
    Remove,
}

impl BlockKind {
    fn parse(kind: &str) -> Option<Self> {
        match kind {
            "js" => Some(BlockKind::Js),
            "css" => Some(BlockKind::Css),
            "remove" => Some(BlockKind::Remove),
            _ => None,
        }
    }

    /// Separator placed between concatenated files.
    fn separator(self) -> &'static [u8] {
        match self {
            BlockKind::Js => b"\n;\n",
            _ => b"\n",
        }
    }

    fn tag(self, target: &str) -> String {
        match self {
            BlockKind::Js => format!("<script src=\"{}\"></script>", target),
            BlockKind::Css => format!("<link rel=\"stylesheet\" href=\"{}\">", target),
            BlockKind::Remove => String::new(),
        }
    }
}

/// A parsed build block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildBlock {
    pub kind: BlockKind,
    /// Output path as written in the block (empty for `remove`)
    pub target: String,
    /// Alternate search directories, in order
    pub search_paths: Vec<String>,
    /// Referenced `src`/`href` values, in document order
    pub references: Vec<String>,
    /// 1-based line of the opening comment
    pub line: usize,
    /// Byte range of the whole block, comments included
    span: (usize, usize),
}

/// A concatenated asset produced from one or more blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleAsset {
    pub kind: BlockKind,
    /// Target path relative to the HTML file's directory
    pub target: PathBuf,
    pub contents: Vec<u8>,
    pub sources: Vec<PathBuf>,
}

/// Result of processing one HTML file.
#[derive(Debug, Clone, Default)]
pub struct UserefOutput {
    /// The rewritten document
    pub html: String,
    pub assets: Vec<BundleAsset>,
    pub warnings: Vec<String>,
}

struct Patterns {
    start: Regex,
    end: Regex,
    script: Regex,
    link: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |p: &str| Regex::new(p).expect("static build-block pattern compiles");
        Patterns {
            start: re(r"<!--\s*build:(\w+)(?:\(([^)]*)\))?(?:\s+(\S+?))?\s*-->"),
            end: re(r"<!--\s*endbuild\s*-->"),
            script: re(r#"(?is)<script\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#),
            link: re(r#"(?is)<link\b[^>]*?\bhref\s*=\s*["']([^"']+)["']"#),
        }
    })
}

fn line_of(text: &str, index: usize) -> usize {
    text[..index].matches('\n').count() + 1
}

/// Find every build block in `html`.
pub fn parse_blocks(file: &Path, html: &str) -> Result<Vec<BuildBlock>, UserefError> {
    let p = patterns();
    let mut blocks = Vec::new();
    let mut cursor = 0;

    loop {
        let next_start = p.start.captures_at(html, cursor);
        let next_end = p.end.find_at(html, cursor);

        let caps = match (next_start, next_end) {
            (None, None) => break,
            (None, Some(end)) => {
                return Err(UserefError::UnexpectedEnd {
                    file: file.to_path_buf(),
                    line: line_of(html, end.start()),
                })
            }
            (Some(caps), end) => {
                let start = caps.get(0).map(|m| m.start()).unwrap_or(cursor);
                if let Some(end) = end.filter(|e| e.start() < start) {
                    return Err(UserefError::UnexpectedEnd {
                        file: file.to_path_buf(),
                        line: line_of(html, end.start()),
                    });
                }
                caps
            }
        };

        let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((cursor, cursor));
        let line = line_of(html, whole.0);
        let kind_str = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let kind = BlockKind::parse(kind_str).ok_or_else(|| UserefError::UnknownType {
            file: file.to_path_buf(),
            line,
            kind: kind_str.to_string(),
        })?;
        let target = caps.get(3).map(|m| m.as_str().to_string()).unwrap_or_default();
        if target.is_empty() && kind != BlockKind::Remove {
            return Err(UserefError::MissingTarget {
                file: file.to_path_buf(),
                line,
                kind: kind_str.to_string(),
            });
        }
        let search_paths = caps.get(2).map(|m| parse_search_paths(m.as_str())).unwrap_or_default();

        let end = p
            .end
            .find_at(html, whole.1)
            .ok_or_else(|| UserefError::Unclosed { file: file.to_path_buf(), line })?;
        if let Some(inner) = p.start.find_at(html, whole.1).filter(|m| m.start() < end.start()) {
            return Err(UserefError::Nested {
                file: file.to_path_buf(),
                line: line_of(html, inner.start()),
            });
        }

        let body = &html[whole.1..end.start()];
        let references = match kind {
            BlockKind::Js => capture_all(&p.script, body),
            BlockKind::Css => capture_all(&p.link, body),
            BlockKind::Remove => Vec::new(),
        };

        blocks.push(BuildBlock {
            kind,
            target,
            search_paths,
            references,
            line,
            span: (whole.0, end.end()),
        });
        cursor = end.end();
    }

    Ok(blocks)
}

fn capture_all(pattern: &Regex, text: &str) -> Vec<String> {
    pattern.captures_iter(text).filter_map(|c| c.get(1)).map(|m| m.as_str().to_string()).collect()
}

/// `app` → `["app"]`, `{app,.tmp}` → `["app", ".tmp"]`.
fn parse_search_paths(raw: &str) -> Vec<String> {
    raw.trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_remote(reference: &str) -> bool {
    let lower = reference.to_ascii_lowercase();
    lower.starts_with("http:") || lower.starts_with("https:") || lower.starts_with("//")
}

/// Strip query string and fragment, and any leading `/`.
fn reference_path(reference: &str) -> &str {
    let end = reference.find(&['?', '#'][..]).unwrap_or(reference.len());
    reference[..end].trim_start_matches('/')
}

/// Resolve `.` and `..` without touching the filesystem. `None` when `..`
/// climbs above the start of the path.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            other => out.push(other),
        }
    }
    Some(out)
}

/// Process the build blocks of an HTML document located at `html_path`.
///
/// Targets are resolved against the document's directory and must stay
/// inside `base`, the directory whose tree is mirrored into the output.
/// Referenced files are read from disk; the returned assets are not written.
pub fn process(html_path: &Path, html: &str, base: &Path) -> Result<UserefOutput, UserefError> {
    let blocks = parse_blocks(html_path, html)?;
    let html_dir = html_path.parent().unwrap_or_else(|| Path::new("."));
    let base = normalize(base).unwrap_or_else(|| base.to_path_buf());

    let mut output = UserefOutput::default();
    let mut rewritten = String::with_capacity(html.len());
    let mut cursor = 0;

    for block in &blocks {
        rewritten.push_str(&html[cursor..block.span.0]);
        rewritten.push_str(&block.kind.tag(&block.target));
        cursor = block.span.1;

        if block.kind == BlockKind::Remove {
            continue;
        }

        let target = PathBuf::from(reference_path(&block.target));
        if !normalize(&html_dir.join(&target)).is_some_and(|resolved| resolved.starts_with(&base)) {
            return Err(UserefError::TargetEscapes {
                file: html_path.to_path_buf(),
                line: block.line,
                target: block.target.clone(),
            });
        }

        let roots: Vec<PathBuf> = if block.search_paths.is_empty() {
            vec![html_dir.to_path_buf()]
        } else {
            block.search_paths.iter().map(|p| html_dir.join(p)).collect()
        };

        let mut contents = Vec::new();
        let mut sources = Vec::new();
        for reference in &block.references {
            if is_remote(reference) {
                output.warnings.push(format!(
                    "{}:{}: skipping remote reference '{}'",
                    html_path.display(),
                    block.line,
                    reference
                ));
                continue;
            }

            let relative = reference_path(reference);
            let found = roots.iter().map(|root| root.join(relative)).find(|p| p.is_file());
            let Some(source) = found else {
                return Err(UserefError::MissingReference {
                    file: html_path.to_path_buf(),
                    reference: reference.clone(),
                    searched: roots
                        .iter()
                        .map(|r| r.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            };

            let bytes =
                fs::read(&source).map_err(|e| UserefError::Io { path: source.clone(), source: e })?;
            if !contents.is_empty() {
                contents.extend_from_slice(block.kind.separator());
            }
            contents.extend_from_slice(&bytes);
            sources.push(source);
        }

        match output.assets.iter_mut().find(|a| a.target == target) {
            // Two blocks in one document naming the same target are merged
            Some(existing) => {
                existing.contents.extend_from_slice(block.kind.separator());
                existing.contents.extend_from_slice(&contents);
                existing.sources.extend(sources);
            }
            None => output.assets.push(BundleAsset { kind: block.kind, target, contents, sources }),
        }
    }

    rewritten.push_str(&html[cursor..]);
    output.html = rewritten;
    Ok(output)
}
