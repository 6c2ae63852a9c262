//! Task registry: named tasks and the steps of composite tasks.

use super::traits::Registry;
use crate::build::{BuildContext, TaskReport};
use crate::tasks::TaskError;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Function run by a leaf task.
pub type TaskFn = Arc<dyn Fn(&BuildContext) -> Result<TaskReport, TaskError> + Send + Sync>;

/// One step of a composite task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Run one task
    Task(String),
    /// Run several tasks concurrently; the step ends when all have finished
    Parallel(Vec<String>),
}

impl Step {
    pub fn task(name: &str) -> Self {
        Step::Task(name.to_string())
    }

    pub fn parallel(names: &[&str]) -> Self {
        Step::Parallel(names.iter().map(|n| n.to_string()).collect())
    }

    /// Names of the tasks this step runs.
    pub fn tasks(&self) -> Vec<&str> {
        match self {
            Step::Task(name) => vec![name.as_str()],
            Step::Parallel(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Task(name) => write!(f, "{}", name),
            Step::Parallel(names) => write!(f, "[{}]", names.join(", ")),
        }
    }
}

/// What a task does when run.
#[derive(Clone)]
pub enum TaskBody {
    Run(TaskFn),
    Sequence(Vec<Step>),
}

impl fmt::Debug for TaskBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskBody::Run(_) => f.write_str("Run(..)"),
            TaskBody::Sequence(steps) => f.debug_tuple("Sequence").field(steps).finish(),
        }
    }
}

/// A named task.
#[derive(Debug, Clone)]
pub struct TaskDefinition {
    pub name: String,
    pub description: String,
    /// Alternative names accepted on the command line
    pub aliases: Vec<String>,
    pub body: TaskBody,
}

impl TaskDefinition {
    /// A task that runs a function.
    pub fn leaf<F>(name: &str, description: &str, run: F) -> Self
    where
        F: Fn(&BuildContext) -> Result<TaskReport, TaskError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            aliases: Vec::new(),
            body: TaskBody::Run(Arc::new(run)),
        }
    }

    /// A task that runs other tasks step by step.
    pub fn sequence(name: &str, description: &str, steps: Vec<Step>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            aliases: Vec::new(),
            body: TaskBody::Sequence(steps),
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.body, TaskBody::Sequence(_))
    }

    pub fn steps(&self) -> &[Step] {
        match &self.body {
            TaskBody::Sequence(steps) => steps,
            TaskBody::Run(_) => &[],
        }
    }
}

/// Registry of tasks, kept in registration order.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: Vec<TaskDefinition>,
    /// Canonical names and aliases to indices into `tasks`
    index: HashMap<String, usize>,
    names: Vec<String>,
}

impl TaskRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task, replacing any task with the same name.
    pub fn register(&mut self, task: TaskDefinition) {
        if let Some(&idx) = self.index.get(&task.name) {
            let old = std::mem::replace(&mut self.tasks[idx], task);
            for alias in &old.aliases {
                self.index.remove(alias);
            }
            let aliases = self.tasks[idx].aliases.clone();
            for alias in aliases {
                self.index.insert(alias, idx);
            }
            return;
        }

        let idx = self.tasks.len();
        self.index.insert(task.name.clone(), idx);
        for alias in &task.aliases {
            self.index.insert(alias.clone(), idx);
        }
        self.names.push(task.name.clone());
        self.tasks.push(task);
    }

    /// Tasks in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &TaskDefinition> {
        self.tasks.iter()
    }

    /// Canonical name for a name or alias.
    pub fn canonical_name(&self, name: &str) -> Option<&str> {
        self.get(name).map(|t| t.name.as_str())
    }
}

impl Registry<TaskDefinition> for TaskRegistry {
    fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    fn get(&self, name: &str) -> Option<&TaskDefinition> {
        self.index.get(name).map(|&idx| &self.tasks[idx])
    }

    fn len(&self) -> usize {
        self.tasks.len()
    }

    fn clear(&mut self) {
        self.tasks.clear();
        self.index.clear();
        self.names.clear();
    }

    fn names(&self) -> Box<dyn Iterator<Item = &String> + '_> {
        Box::new(self.names.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(name: &str) -> TaskDefinition {
        let report_name = name.to_string();
        TaskDefinition::leaf(name, "", move |_| Ok(TaskReport::new(report_name.clone())))
    }

    #[test]
    fn test_lookup_by_name_and_alias() {
        let mut registry = TaskRegistry::new();
        registry.register(noop("style-compile").with_alias("sass"));
        registry.register(TaskDefinition::sequence(
            "build",
            "",
            vec![Step::task("style-compile")],
        ));

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("sass"));
        assert_eq!(registry.canonical_name("sass"), Some("style-compile"));
        assert!(registry.get("build").unwrap().is_composite());
        assert!(registry.get("deploy").is_none());

        let names: Vec<&String> = registry.names().collect();
        assert_eq!(names, vec!["style-compile", "build"]);
    }

    #[test]
    fn test_register_replaces_and_drops_old_aliases() {
        let mut registry = TaskRegistry::new();
        registry.register(noop("fonts-task").with_alias("fonts"));
        registry.register(noop("fonts-task").with_alias("copy"));

        assert_eq!(registry.len(), 1);
        assert!(!registry.contains("fonts"));
        assert!(registry.contains("copy"));
    }

    #[test]
    fn test_clear() {
        let mut registry = TaskRegistry::new();
        registry.register(noop("a"));
        registry.clear();
        assert!(registry.is_empty());
        assert!(!registry.contains("a"));
    }

    #[test]
    fn test_step_display() {
        assert_eq!(Step::task("watch").to_string(), "watch");
        assert_eq!(Step::parallel(&["a", "b"]).to_string(), "[a, b]");
        assert_eq!(Step::parallel(&["a", "b"]).tasks(), vec!["a", "b"]);
    }
}
