//! Task progress reporting.
//!
//! The runner reports what it does through a [`ProgressReporter`]. The console
//! reporter prints timestamped `Starting`/`Finished` lines and the JSON
//! reporter emits one object per line for tooling.
//!
//! # Example
//!
//! ```ignore
//! use sitepipe::build::progress::{ConsoleProgress, ProgressEvent, ProgressReporter};
//!
//! let reporter = ConsoleProgress::new();
//! reporter.report(ProgressEvent::TaskStarted { task: "style-compile".to_string() });
//! reporter.report(ProgressEvent::TaskFinished {
//!     task: "style-compile".to_string(),
//!     duration_ms: 12,
//!     summary: "3 files".to_string(),
//! });
//! ```

use serde_json::json;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

/// Events reported while tasks run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A composite task is about to run its steps
    SequenceStarted {
        task: String,
        steps: usize,
    },
    /// A leaf task started
    TaskStarted {
        task: String,
    },
    /// A leaf task completed successfully
    TaskFinished {
        task: String,
        duration_ms: u64,
        /// Short description of what was produced
        summary: String,
    },
    /// A leaf task failed
    TaskFailed {
        task: String,
        duration_ms: u64,
        error: String,
    },
    /// A composite task finished (successfully or not)
    SequenceFinished {
        task: String,
        success: bool,
        duration_ms: u64,
        succeeded: usize,
        failed: usize,
    },
    /// A warning was generated
    Warning {
        task: Option<String>,
        message: String,
    },
    /// Informational message (server address, watch status)
    Notice {
        message: String,
    },
}

/// Trait for progress reporters.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event.
    fn report(&self, event: ProgressEvent);
}

/// A progress reporter that discards all events.
#[derive(Debug, Default)]
pub struct NullProgress;

impl NullProgress {
    pub fn new() -> Self {
        Self
    }
}

impl ProgressReporter for NullProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Console progress reporter with optional colors.
pub struct ConsoleProgress {
    use_colors: bool,
    verbose: bool,
    /// Only warnings and failures are printed
    quiet: bool,
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for ConsoleProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleProgress")
            .field("use_colors", &self.use_colors)
            .field("verbose", &self.verbose)
            .field("quiet", &self.quiet)
            .finish()
    }
}

impl ConsoleProgress {
    /// Create a console reporter writing to stderr.
    pub fn new() -> Self {
        Self {
            use_colors: true,
            verbose: false,
            quiet: false,
            output: Mutex::new(Box::new(std::io::stderr())),
        }
    }

    /// Create a console progress reporter that writes to a custom output.
    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self {
            use_colors: false,
            verbose: false,
            quiet: false,
            output: Mutex::new(Box::new(output)),
        }
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    fn color(&self, text: &str, color: &str) -> String {
        if self.use_colors {
            format!("{}{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    fn cyan(&self, text: &str) -> String {
        self.color(text, "\x1b[36m")
    }

    fn magenta(&self, text: &str) -> String {
        self.color(text, "\x1b[35m")
    }

    fn yellow(&self, text: &str) -> String {
        self.color(text, "\x1b[33m")
    }

    fn red(&self, text: &str) -> String {
        self.color(text, "\x1b[31m")
    }

    fn gray(&self, text: &str) -> String {
        self.color(text, "\x1b[90m")
    }

    fn writeln(&self, line: &str) {
        if let Ok(mut output) = self.output.lock() {
            let _ = writeln!(output, "[{}] {}", self.gray(&timestamp()), line);
        }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ConsoleProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::SequenceStarted { task, .. } | ProgressEvent::TaskStarted { task } => {
                if !self.quiet {
                    self.writeln(&format!("Starting '{}'...", self.cyan(&task)));
                }
            }
            ProgressEvent::TaskFinished { task, duration_ms, summary } => {
                if !self.quiet {
                    let detail = if self.verbose && !summary.is_empty() {
                        format!(" ({})", summary)
                    } else {
                        String::new()
                    };
                    self.writeln(&format!(
                        "Finished '{}' after {}{}",
                        self.cyan(&task),
                        self.magenta(&format_duration(Duration::from_millis(duration_ms))),
                        detail
                    ));
                }
            }
            ProgressEvent::TaskFailed { task, duration_ms, error } => {
                self.writeln(&format!(
                    "'{}' {} after {}",
                    self.cyan(&task),
                    self.red("errored"),
                    self.magenta(&format_duration(Duration::from_millis(duration_ms)))
                ));
                self.writeln(&self.red(&error));
            }
            ProgressEvent::SequenceFinished { task, success, duration_ms, failed, .. } => {
                let elapsed = self.magenta(&format_duration(Duration::from_millis(duration_ms)));
                if success {
                    if !self.quiet {
                        self.writeln(&format!("Finished '{}' after {}", self.cyan(&task), elapsed));
                    }
                } else {
                    self.writeln(&format!(
                        "'{}' {} after {} ({} failed task{})",
                        self.cyan(&task),
                        self.red("errored"),
                        elapsed,
                        failed,
                        if failed == 1 { "" } else { "s" }
                    ));
                }
            }
            ProgressEvent::Warning { task, message } => {
                let prefix = match task {
                    Some(task) => format!("{}: ", task),
                    None => String::new(),
                };
                self.writeln(&format!("{} {}{}", self.yellow("warning"), prefix, message));
            }
            ProgressEvent::Notice { message } => {
                if !self.quiet {
                    self.writeln(&message);
                }
            }
        }
    }
}

/// JSON progress reporter for machine-readable output.
pub struct JsonProgress {
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for JsonProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonProgress").finish()
    }
}

impl JsonProgress {
    /// Create a new JSON progress reporter writing to stderr.
    pub fn new() -> Self {
        Self { output: Mutex::new(Box::new(std::io::stderr())) }
    }

    /// Create a JSON progress reporter that writes to a custom output.
    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self { output: Mutex::new(Box::new(output)) }
    }
}

impl Default for JsonProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let value = match event {
            ProgressEvent::SequenceStarted { task, steps } => {
                json!({ "event": "sequence_started", "task": task, "steps": steps })
            }
            ProgressEvent::TaskStarted { task } => json!({ "event": "task_started", "task": task }),
            ProgressEvent::TaskFinished { task, duration_ms, summary } => json!({
                "event": "task_finished",
                "task": task,
                "duration_ms": duration_ms,
                "summary": summary,
            }),
            ProgressEvent::TaskFailed { task, duration_ms, error } => json!({
                "event": "task_failed",
                "task": task,
                "duration_ms": duration_ms,
                "error": error,
            }),
            ProgressEvent::SequenceFinished { task, success, duration_ms, succeeded, failed } => {
                json!({
                    "event": "sequence_finished",
                    "task": task,
                    "success": success,
                    "duration_ms": duration_ms,
                    "succeeded": succeeded,
                    "failed": failed,
                })
            }
            ProgressEvent::Warning { task, message } => {
                json!({ "event": "warning", "task": task, "message": message })
            }
            ProgressEvent::Notice { message } => json!({ "event": "notice", "message": message }),
        };

        if let Ok(mut output) = self.output.lock() {
            let _ = writeln!(output, "{}", value);
        }
    }
}

/// Format a duration for humans: `850 ms`, `1.2 s`, `2 min 5 s`.
pub fn format_duration(duration: Duration) -> String {
    let ms = duration.as_millis();
    if ms < 1000 {
        format!("{} ms", ms)
    } else if ms < 60_000 {
        format!("{:.1} s", duration.as_secs_f64())
    } else {
        format!("{} min {} s", ms / 60_000, (ms % 60_000) / 1000)
    }
}

/// Wall-clock time of day (UTC) as `HH:MM:SS`.
pub fn timestamp() -> String {
    use std::time::SystemTime;
    let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
    let secs = now.as_secs() % 86400;
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Writer that appends into a shared buffer.
    struct TestWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn console() -> (ConsoleProgress, Arc<Mutex<Vec<u8>>>) {
        let output = Arc::new(Mutex::new(Vec::new()));
        (ConsoleProgress::with_output(TestWriter(Arc::clone(&output))), output)
    }

    fn text(output: &Arc<Mutex<Vec<u8>>>) -> String {
        String::from_utf8_lossy(&output.lock().unwrap()).into_owned()
    }

    #[test]
    fn test_null_progress() {
        let reporter = NullProgress::new();
        reporter.report(ProgressEvent::TaskStarted { task: "x".to_string() });
    }

    #[test]
    fn test_console_start_finish_lines() {
        let (reporter, output) = console();
        reporter.report(ProgressEvent::TaskStarted { task: "copy-fonts".to_string() });
        reporter.report(ProgressEvent::TaskFinished {
            task: "copy-fonts".to_string(),
            duration_ms: 12,
            summary: "2 files".to_string(),
        });

        let text = text(&output);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("Starting 'copy-fonts'..."));
        assert!(lines[1].ends_with("Finished 'copy-fonts' after 12 ms"));
    }

    #[test]
    fn test_console_verbose_includes_summary() {
        let (reporter, output) = console();
        let reporter = reporter.with_verbose(true);
        reporter.report(ProgressEvent::TaskFinished {
            task: "image-optimize".to_string(),
            duration_ms: 5,
            summary: "4 files (4 cached, 0 processed)".to_string(),
        });
        assert!(text(&output).contains("(4 files (4 cached, 0 processed))"));
    }

    #[test]
    fn test_console_failure() {
        let (reporter, output) = console();
        reporter.report(ProgressEvent::TaskFailed {
            task: "style-compile".to_string(),
            duration_ms: 3,
            error: "Sass error in main.scss: expected \";\"".to_string(),
        });
        let text = text(&output);
        assert!(text.contains("'style-compile' errored after 3 ms"));
        assert!(text.contains("Sass error in main.scss"));
    }

    #[test]
    fn test_console_quiet_keeps_warnings_and_errors() {
        let (reporter, output) = console();
        let reporter = reporter.with_quiet(true);
        reporter.report(ProgressEvent::TaskStarted { task: "build".to_string() });
        reporter.report(ProgressEvent::Notice { message: "serving".to_string() });
        reporter.report(ProgressEvent::Warning {
            task: Some("bundle-and-minify".to_string()),
            message: "skipping remote reference".to_string(),
        });

        let text = text(&output);
        assert!(!text.contains("Starting"));
        assert!(!text.contains("serving"));
        assert!(text.contains("warning bundle-and-minify: skipping remote reference"));
    }

    #[test]
    fn test_json_progress_lines_parse() {
        let output = Arc::new(Mutex::new(Vec::new()));
        let reporter = JsonProgress::with_output(TestWriter(Arc::clone(&output)));
        reporter.report(ProgressEvent::TaskFailed {
            task: "a\"b".to_string(),
            duration_ms: 1,
            error: "line\nbreak".to_string(),
        });
        reporter.report(ProgressEvent::Warning { task: None, message: "w".to_string() });

        let text = text(&output);
        let values: Vec<serde_json::Value> =
            text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(values[0]["event"], "task_failed");
        assert_eq!(values[0]["task"], "a\"b");
        assert_eq!(values[0]["error"], "line\nbreak");
        assert_eq!(values[1]["task"], serde_json::Value::Null);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(12)), "12 ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5 s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2 min 5 s");
    }

    #[test]
    fn test_timestamp_shape() {
        let ts = timestamp();
        assert_eq!(ts.len(), 8);
        assert_eq!(ts.as_bytes()[2], b':');
        assert_eq!(ts.as_bytes()[5], b':');
    }
}
