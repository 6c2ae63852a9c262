//! Watch mode: recompile styles and reload browsers on file changes
//!
//! Provides file system watching with debouncing for the `watch` task. Each
//! debounced batch of changes is turned into at most one action of each kind,
//! so saving several stylesheets at once compiles once and reloads once.

use notify::{RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::Duration;
use thiserror::Error;

use crate::build::discovery::{glob_base, matches, DiscoveryError};
use crate::build::pipeline::run_leaf;
use crate::build::progress::ProgressEvent;
use crate::build::{BuildContext, RunResult};
use crate::livereload::ReloadEvent;
use crate::tasks::styles::compile_styles;

/// Error during watch mode
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WatchError {
    /// Failed to initialize file watcher
    #[error("Failed to initialize file watcher: {0}")]
    WatcherInit(#[source] notify::Error),
    /// Failed to add watch path
    #[error("Failed to watch {path}: {source}")]
    WatchPath {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
    /// The event channel closed
    #[error("Watch channel error: {0}")]
    Channel(String),
    /// Nothing to watch exists
    #[error("None of the watched directories exist: {}", .0.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "))]
    SourceNotFound(Vec<PathBuf>),
    #[error(transparent)]
    Pattern(#[from] DiscoveryError),
}

/// What a batch of changes asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchAction {
    /// Recompile stylesheets (which refreshes CSS in browsers)
    CompileStyles,
    /// Reload every connected page
    Reload,
}

/// Maps changed paths to actions.
#[derive(Debug, Clone)]
pub struct WatchRules {
    root: PathBuf,
    styles: String,
    reload: Vec<String>,
    /// Compiled CSS lands here; changes inside are our own output
    generated: PathBuf,
}

impl WatchRules {
    pub fn new(root: PathBuf, styles: String, reload: Vec<String>, generated: PathBuf) -> Self {
        Self { root, styles, reload, generated }
    }

    pub fn from_context(ctx: &BuildContext) -> Self {
        let config = ctx.config();
        Self::new(
            ctx.project_root().to_path_buf(),
            config.styles.src.clone(),
            config.watch.reload.clone(),
            ctx.resolve_path(&config.styles.out),
        )
    }

    /// Action for a single changed path, if any.
    pub fn classify(&self, path: &Path) -> Result<Option<WatchAction>, DiscoveryError> {
        if path.starts_with(&self.generated) {
            return Ok(None);
        }
        if matches(&self.root, &self.styles, path)? {
            return Ok(Some(WatchAction::CompileStyles));
        }
        for pattern in &self.reload {
            if matches(&self.root, pattern, path)? {
                return Ok(Some(WatchAction::Reload));
            }
        }
        Ok(None)
    }

    /// Actions for one debounced batch: each kind at most once, styles first.
    pub fn plan_actions(&self, paths: &[PathBuf]) -> Result<Vec<WatchAction>, DiscoveryError> {
        let mut wanted = HashSet::new();
        for path in paths {
            if let Some(action) = self.classify(path)? {
                wanted.insert(action);
            }
        }

        Ok([WatchAction::CompileStyles, WatchAction::Reload]
            .into_iter()
            .filter(|a| wanted.contains(a))
            .collect())
    }

    /// Directories to watch recursively: the existing glob bases, without
    /// any nested inside another.
    pub fn watch_roots(&self) -> Vec<PathBuf> {
        let mut bases: Vec<PathBuf> = std::iter::once(&self.styles)
            .chain(self.reload.iter())
            .map(|pattern| self.root.join(glob_base(pattern)))
            .filter(|dir| dir.is_dir())
            .collect();
        bases.sort();
        bases.dedup();

        let mut roots: Vec<PathBuf> = Vec::new();
        for base in bases {
            if !roots.iter().any(|r| base.starts_with(r)) {
                roots.push(base);
            }
        }
        roots
    }
}

/// Tracks failing tasks across batches for recovery detection
#[derive(Debug, Default)]
pub struct ErrorTracker {
    failing: HashSet<String>,
}

impl ErrorTracker {
    /// Create a new error tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Update tracker with a run result, returns the tasks that recovered
    pub fn update(&mut self, result: &RunResult) -> Vec<String> {
        let mut fixed = Vec::new();
        for report in &result.reports {
            if self.failing.remove(&report.task) {
                fixed.push(report.task.clone());
            }
        }
        for failure in &result.failures {
            self.failing.insert(failure.task.clone());
        }
        fixed
    }

    /// Check if there are any tracked errors
    pub fn has_errors(&self) -> bool {
        !self.failing.is_empty()
    }
}

/// State of a running watch loop.
pub struct WatchSession<'a> {
    ctx: &'a BuildContext,
    rules: WatchRules,
    tracker: ErrorTracker,
}

impl<'a> WatchSession<'a> {
    pub fn new(ctx: &'a BuildContext, rules: WatchRules) -> Self {
        Self { ctx, rules, tracker: ErrorTracker::new() }
    }

    /// Handle one debounced batch of changed paths, returning what was done.
    ///
    /// A failed recompile is reported and the session carries on.
    pub fn handle_batch(&mut self, paths: &[PathBuf]) -> Result<Vec<WatchAction>, WatchError> {
        let actions = self.rules.plan_actions(paths)?;
        if actions.is_empty() {
            return Ok(actions);
        }

        let reporter = self.ctx.reporter();
        if self.ctx.config().watch.clear_screen {
            clear_screen();
        }
        for path in paths {
            let shown = path.strip_prefix(self.ctx.project_root()).unwrap_or(path);
            reporter.report(ProgressEvent::Notice {
                message: format!("Changed: {}", shown.display()),
            });
        }

        for action in &actions {
            match action {
                WatchAction::CompileStyles => {
                    let result = run_leaf(self.ctx, "style-compile", &compile_styles);
                    for task in self.tracker.update(&result) {
                        reporter.report(ProgressEvent::Notice { message: format!("Fixed: '{}'", task) });
                    }
                }
                WatchAction::Reload => {
                    let reached = self.ctx.reload().notify(ReloadEvent::Full);
                    tracing::debug!(reached, "reload sent");
                    reporter.report(ProgressEvent::Notice {
                        message: "Reloading browsers...".to_string(),
                    });
                }
            }
        }
        Ok(actions)
    }
}

/// Clear the terminal screen
fn clear_screen() {
    // ANSI escape code to clear screen and move cursor to top-left
    eprint!("\x1B[2J\x1B[1;1H");
}

/// Watch the source tree until the process ends.
///
/// Only returns on setup failure or when the event channel closes.
pub fn watch(ctx: &BuildContext) -> Result<(), WatchError> {
    let rules = WatchRules::from_context(ctx);
    let roots = rules.watch_roots();
    if roots.is_empty() {
        let wanted = std::iter::once(&rules.styles)
            .chain(rules.reload.iter())
            .map(|p| rules.root.join(glob_base(p)))
            .collect();
        return Err(WatchError::SourceNotFound(wanted));
    }

    // Create channel for debounced events
    let (tx, rx) = channel();
    let debounce = Duration::from_millis(u64::from(ctx.config().watch.debounce_ms));
    let mut debouncer = new_debouncer(debounce, tx).map_err(WatchError::WatcherInit)?;

    for root in &roots {
        debouncer
            .watcher()
            .watch(root, RecursiveMode::Recursive)
            .map_err(|source| WatchError::WatchPath { path: root.clone(), source })?;
    }

    let shown: Vec<String> = roots
        .iter()
        .map(|r| r.strip_prefix(ctx.project_root()).unwrap_or(r).display().to_string())
        .collect();
    ctx.reporter().report(ProgressEvent::Notice {
        message: format!("Watching {} for changes...", shown.join(", ")),
    });

    let mut session = WatchSession::new(ctx, rules);
    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let paths: Vec<PathBuf> = events
                    .into_iter()
                    .filter(|e| matches!(e.kind, DebouncedEventKind::Any))
                    .map(|e| e.path)
                    .collect();
                session.handle_batch(&paths)?;
            }
            Ok(Err(error)) => {
                // Watch error (non-fatal) - log but continue watching
                tracing::warn!(error = ?error, "watch error; continuing to watch");
            }
            Err(e) => {
                return Err(WatchError::Channel(e.to_string()));
            }
        }
    }
}
