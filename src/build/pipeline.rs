//! Task runner.
//!
//! Executes a task from a [`TaskRegistry`]: a leaf task runs its function,
//! a composite task runs its steps strictly in order. A `Parallel` step
//! fans its tasks out and finishes when every one of them has finished.
//! When any task of a step fails, the steps after it are not started.
//!
//! # Example
//!
//! ```ignore
//! use sitepipe::build::{BuildContext, TaskRunner};
//! use sitepipe::tasks::standard_registry;
//!
//! let registry = standard_registry();
//! let context = BuildContext::new(config, project_root);
//! let result = TaskRunner::new(&registry, &context).run("build")?;
//! println!("{} tasks finished", result.reports.len());
//! ```

use crate::build::parallel::fan_out;
use crate::build::progress::ProgressEvent;
use crate::build::{BuildContext, RunResult, TaskReport};
use crate::registry::{Registry, Step, TaskBody, TaskDefinition, TaskRegistry};
use crate::server::ServerError;
use crate::tasks::TaskError;
use std::time::Instant;
use thiserror::Error;

/// Error that prevents a task from running at all.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RunError {
    /// Task name (or a step of a composite task) is not registered
    #[error("Task '{0}' is not in your task list")]
    UnknownTask(String),
    /// A composite task includes itself
    #[error("Task cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
}

/// Runs tasks against a build context.
pub struct TaskRunner<'a> {
    registry: &'a TaskRegistry,
    context: &'a BuildContext,
}

impl<'a> TaskRunner<'a> {
    pub fn new(registry: &'a TaskRegistry, context: &'a BuildContext) -> Self {
        Self { registry, context }
    }

    /// Run a task (or alias) and everything it includes.
    ///
    /// Task failures are part of the returned [`RunResult`]; only problems
    /// with the task graph itself are errors.
    pub fn run(&self, name: &str) -> Result<RunResult, RunError> {
        self.check(name, &mut Vec::new())?;

        let start = Instant::now();
        let mut result = self.run_named(name);
        result.total_duration = start.elapsed();
        Ok(result)
    }

    /// Verify every task reachable from `name` exists and nothing recurses.
    fn check(&self, name: &str, stack: &mut Vec<String>) -> Result<(), RunError> {
        let task = self.lookup(name)?;
        if stack.contains(&task.name) {
            let mut cycle = stack.clone();
            cycle.push(task.name.clone());
            return Err(RunError::Cycle(cycle));
        }

        stack.push(task.name.clone());
        for step in task.steps() {
            for child in step.tasks() {
                self.check(child, stack)?;
            }
        }
        stack.pop();
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<&'a TaskDefinition, RunError> {
        self.registry.get(name).ok_or_else(|| RunError::UnknownTask(name.to_string()))
    }

    fn run_named(&self, name: &str) -> RunResult {
        match self.lookup(name) {
            Ok(task) => self.run_definition(task),
            Err(e) => {
                let mut result = RunResult::new();
                result.add_failure(name, TaskError::Message(e.to_string()));
                result
            }
        }
    }

    fn run_definition(&self, task: &TaskDefinition) -> RunResult {
        match &task.body {
            TaskBody::Run(run) => run_leaf(self.context, &task.name, run.as_ref()),
            TaskBody::Sequence(steps) => self.run_sequence(&task.name, steps),
        }
    }

    fn run_sequence(&self, name: &str, steps: &[Step]) -> RunResult {
        let reporter = self.context.reporter();
        let start = Instant::now();
        reporter.report(ProgressEvent::SequenceStarted { task: name.to_string(), steps: steps.len() });

        let mut result = RunResult::new();
        for step in steps {
            let step_result = match step {
                Step::Task(child) => self.run_named(child),
                Step::Parallel(children) => {
                    let mut merged = RunResult::new();
                    for child_result in
                        fan_out(children, self.context.jobs(), |child| self.run_named(child))
                    {
                        merged.merge(child_result);
                    }
                    merged
                }
            };

            let failed = !step_result.is_success();
            result.merge(step_result);
            if failed {
                tracing::debug!(task = name, step = %step, "step failed; stopping sequence");
                break;
            }
        }

        reporter.report(ProgressEvent::SequenceFinished {
            task: name.to_string(),
            success: result.is_success(),
            duration_ms: start.elapsed().as_millis() as u64,
            succeeded: result.reports.len(),
            failed: result.failures.len(),
        });
        result
    }

    /// Block on the dev server if a task started one.
    ///
    /// Returns immediately when no server is running.
    pub fn wait_for_server(&self) -> Result<(), ServerError> {
        match self.context.take_server() {
            Some(server) => {
                self.context.reporter().report(ProgressEvent::Notice {
                    message: format!("Serving at {} (Ctrl+C to stop)", server.url()),
                });
                server.wait()
            }
            None => Ok(()),
        }
    }
}

/// Run one task function with progress reporting.
pub fn run_leaf(
    context: &BuildContext,
    name: &str,
    run: &(dyn Fn(&BuildContext) -> Result<TaskReport, TaskError> + Send + Sync),
) -> RunResult {
    let reporter = context.reporter();
    reporter.report(ProgressEvent::TaskStarted { task: name.to_string() });

    let start = Instant::now();
    let outcome = run(context);
    let duration = start.elapsed();

    let mut result = RunResult::new();
    match outcome {
        Ok(mut report) => {
            report.task = name.to_string();
            report.duration = duration;
            for warning in &report.warnings {
                reporter.report(ProgressEvent::Warning {
                    task: Some(name.to_string()),
                    message: warning.clone(),
                });
            }
            reporter.report(ProgressEvent::TaskFinished {
                task: name.to_string(),
                duration_ms: duration.as_millis() as u64,
                summary: report.summary(),
            });
            tracing::debug!(task = name, outputs = report.outputs.len(), "task finished");
            result.add_report(report);
        }
        Err(error) => {
            reporter.report(ProgressEvent::TaskFailed {
                task: name.to_string(),
                duration_ms: duration.as_millis() as u64,
                error: error.to_string(),
            });
            result.add_failure(name, error);
        }
    }
    result
}
