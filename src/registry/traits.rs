//! Common trait for registries that store named items.

/// Common trait for registries that store named items.
///
/// This trait provides a unified interface for registries that map string names to values.
/// It defines common operations like checking existence, retrieving items, and counting entries.
///
/// # Type Parameters
///
/// * `V` - The type of value stored in the registry
///
/// # Example
///
/// ```
/// use sitepipe::registry::{Registry, TaskDefinition, TaskRegistry};
/// use sitepipe::build::TaskReport;
///
/// let mut registry = TaskRegistry::new();
/// registry.register(
///     TaskDefinition::leaf("noop", "Does nothing", |_| Ok(TaskReport::new("noop")))
///         .with_alias("nothing"),
/// );
///
/// assert!(registry.contains("nothing"));
/// assert_eq!(registry.len(), 1);
/// ```
pub trait Registry<V> {
    /// Check if an item with the given name (or alias) exists in the registry.
    fn contains(&self, name: &str) -> bool;

    /// Get an item by name or alias.
    ///
    /// Returns `None` if no item with the given name exists.
    fn get(&self, name: &str) -> Option<&V>;

    /// Get the number of items in the registry.
    fn len(&self) -> usize;

    /// Check if the registry is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all items from the registry.
    fn clear(&mut self);

    /// Get an iterator over the canonical names in the registry.
    fn names(&self) -> Box<dyn Iterator<Item = &String> + '_>;
}
