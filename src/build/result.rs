//! Task result types.
//!
//! Contains types for representing the outcome of task runs.

use crate::tasks::TaskError;
use std::path::PathBuf;
use std::time::Duration;

/// Report of a task that completed successfully.
#[derive(Debug, Clone, Default)]
pub struct TaskReport {
    /// Name the task was registered under
    pub task: String,
    /// Files written (or, for cleanup tasks, removed)
    pub outputs: Vec<PathBuf>,
    /// Files served from the transformation cache
    pub cache_hits: usize,
    /// Files transformed and stored in the cache
    pub cache_misses: usize,
    /// Warning messages (if any)
    pub warnings: Vec<String>,
    /// Task duration
    pub duration: Duration,
}

impl TaskReport {
    /// Create an empty report for `task`.
    pub fn new(task: impl Into<String>) -> Self {
        Self { task: task.into(), ..Default::default() }
    }

    /// Set the files produced by the task.
    pub fn with_outputs(mut self, outputs: Vec<PathBuf>) -> Self {
        self.outputs = outputs;
        self
    }

    /// Add warnings to the report.
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    /// One-line description for console output.
    pub fn summary(&self) -> String {
        let files = self.outputs.len();
        let mut summary = format!("{} file{}", files, if files == 1 { "" } else { "s" });
        if self.cache_hits + self.cache_misses > 0 {
            summary.push_str(&format!(
                " ({} cached, {} processed)",
                self.cache_hits, self.cache_misses
            ));
        }
        summary
    }
}

/// A task that failed, with the error it raised.
#[derive(Debug)]
pub struct TaskFailure {
    pub task: String,
    pub error: TaskError,
}

/// Result of running a task (and, for composite tasks, everything it ran).
#[derive(Debug, Default)]
pub struct RunResult {
    /// Reports of leaf tasks that succeeded, in completion order per step
    pub reports: Vec<TaskReport>,
    /// Leaf tasks that failed
    pub failures: Vec<TaskFailure>,
    /// Total duration
    pub total_duration: Duration,
}

impl RunResult {
    /// Create a new empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a successful task report.
    pub fn add_report(&mut self, report: TaskReport) {
        self.reports.push(report);
    }

    /// Add a failed task.
    pub fn add_failure(&mut self, task: impl Into<String>, error: TaskError) {
        self.failures.push(TaskFailure { task: task.into(), error });
    }

    /// Fold another result into this one.
    pub fn merge(&mut self, other: RunResult) {
        self.reports.extend(other.reports);
        self.failures.extend(other.failures);
    }

    /// Check if the run succeeded (no failures).
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Find the report of a leaf task.
    pub fn report(&self, task: &str) -> Option<&TaskReport> {
        self.reports.iter().find(|r| r.task == task)
    }

    /// Get all outputs produced.
    pub fn all_outputs(&self) -> Vec<&PathBuf> {
        self.reports.iter().flat_map(|r| r.outputs.iter()).collect()
    }

    /// Get all warnings.
    pub fn all_warnings(&self) -> Vec<&String> {
        self.reports.iter().flat_map(|r| r.warnings.iter()).collect()
    }

    /// Names of the failed tasks.
    pub fn failed_tasks(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.task.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_summary() {
        let report = TaskReport::new("copy-fonts").with_outputs(vec![PathBuf::from("a.woff")]);
        assert_eq!(report.summary(), "1 file");

        let mut report = TaskReport::new("image-optimize")
            .with_outputs(vec![PathBuf::from("a.png"), PathBuf::from("b.png")]);
        report.cache_hits = 1;
        report.cache_misses = 1;
        assert_eq!(report.summary(), "2 files (1 cached, 1 processed)");
    }

    #[test]
    fn test_run_result_merge() {
        let mut result = RunResult::new();
        result.add_report(TaskReport::new("a"));

        let mut other = RunResult::new();
        other.add_report(TaskReport::new("b").with_warnings(vec!["careful".to_string()]));
        other.add_failure("c", TaskError::Message("boom".to_string()));
        result.merge(other);

        assert_eq!(result.reports.len(), 2);
        assert!(!result.is_success());
        assert_eq!(result.failed_tasks(), vec!["c"]);
        assert_eq!(result.all_warnings(), vec!["careful"]);
        assert!(result.report("b").is_some());
        assert!(result.report("c").is_none());
    }
}
