//! Task listing and execution for the CLI.

use std::path::Path;

use super::{EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};
use crate::build::{BuildContext, TaskRunner};
use crate::registry::{Registry, TaskRegistry};

/// Print every task with its aliases and description (or steps).
pub fn list_tasks(registry: &TaskRegistry, project_root: &Path) {
    println!("Tasks for {}", project_root.display());

    let labels: Vec<String> = registry
        .iter()
        .map(|task| {
            if task.aliases.is_empty() {
                task.name.clone()
            } else {
                format!("{} ({})", task.name, task.aliases.join(", "))
            }
        })
        .collect();
    let width = labels.iter().map(String::len).max().unwrap_or(0);

    for (task, label) in registry.iter().zip(&labels) {
        let detail = if task.is_composite() {
            task.steps().iter().map(ToString::to_string).collect::<Vec<_>>().join(" -> ")
        } else {
            task.description.clone()
        };
        println!("  {:width$}  {}", label, detail, width = width);
    }
}

/// Run tasks in order, stopping at the first failure.
///
/// Every name is checked before anything runs.
pub fn run_tasks(registry: &TaskRegistry, context: &BuildContext, names: &[String]) -> u8 {
    if let Some(unknown) = names.iter().find(|name| !registry.contains(name)) {
        eprintln!("Task '{}' is not in your task list (see --list)", unknown);
        return EXIT_INVALID_ARGS;
    }

    let runner = TaskRunner::new(registry, context);
    for name in names {
        let result = match runner.run(name) {
            Ok(result) => result,
            Err(e) => {
                eprintln!("Error: {}", e);
                return EXIT_INVALID_ARGS;
            }
        };

        if !result.is_success() {
            for failure in &result.failures {
                tracing::debug!(task = %failure.task, error = ?failure.error, "task failed");
            }
            return EXIT_ERROR;
        }
    }

    // A dev server started without a watcher keeps the process alive
    match runner.wait_for_server() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            EXIT_ERROR
        }
    }
}
