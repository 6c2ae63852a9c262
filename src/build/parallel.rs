//! Fan-out execution.
//!
//! Runs independent work items on scoped worker threads and returns their
//! results in declaration order, whatever order they finish in.
//!
//! # How It Works
//!
//! 1. Spawn `min(jobs, items)` scoped workers
//! 2. Each worker claims the next unclaimed index until none are left
//! 3. Results are collected with their index and sorted before returning
//!
//! With no job limit every item gets its own worker, so all of them start
//! at once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Apply `f` to every item concurrently, at most `jobs` at a time.
pub fn fan_out<T, R, F>(items: &[T], jobs: Option<usize>, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let workers = jobs.unwrap_or(items.len()).max(1).min(items.len());

    // Nothing to overlap
    if workers <= 1 {
        return items.iter().map(&f).collect();
    }

    let results = Mutex::new(Vec::with_capacity(items.len()));
    let next_idx = AtomicUsize::new(0);

    std::thread::scope(|s| {
        for _ in 0..workers {
            s.spawn(|| loop {
                let idx = next_idx.fetch_add(1, Ordering::SeqCst);
                if idx >= items.len() {
                    break;
                }

                let result = f(&items[idx]);
                if let Ok(mut results) = results.lock() {
                    results.push((idx, result));
                }
            });
        }
    });

    // Sort results by original index to maintain deterministic order
    let mut results = results.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
    results.sort_by_key(|(idx, _)| *idx);
    results.into_iter().map(|(_, r)| r).collect()
}
