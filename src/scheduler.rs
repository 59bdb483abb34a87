// src/scheduler.rs

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::debug;

type TaskTable = HashMap<String, (u64, JoinHandle<()>)>;

/// Keyed background tasks that can be cancelled individually or all at once.
///
/// Scheduling under a key that is already taken aborts the previous task.
/// A task that runs to completion removes its own entry.
#[derive(Debug, Clone, Default)]
pub struct TaskScheduler {
    tasks: Arc<Mutex<TaskTable>>,
    generation: Arc<AtomicU64>,
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule<F>(&self, key: &str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let tasks = Arc::clone(&self.tasks);
        let owned_key = key.to_string();

        // Held across spawn so the task cannot finish before its entry exists
        let mut table = lock(&self.tasks);
        let handle = tokio::spawn(async move {
            task.await;
            let mut table = lock(&tasks);
            if table.get(&owned_key).map(|(g, _)| *g) == Some(generation) {
                table.remove(&owned_key);
            }
        });
        if let Some((_, previous)) = table.insert(key.to_string(), (generation, handle)) {
            previous.abort();
        }
    }

    /// Abort the task under `key`; false when nothing was pending
    pub fn cancel(&self, key: &str) -> bool {
        match lock(&self.tasks).remove(key) {
            Some((_, handle)) => {
                handle.abort();
                debug!("Cancelled scheduled task {}", key);
                true
            }
            None => false,
        }
    }

    /// Abort every pending task, returning how many were aborted
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<(String, (u64, JoinHandle<()>))> = lock(&self.tasks).drain().collect();
        for (_, (_, handle)) in &drained {
            handle.abort();
        }
        drained.len()
    }

    pub fn is_scheduled(&self, key: &str) -> bool {
        lock(&self.tasks).contains_key(key)
    }

    pub fn pending(&self) -> usize {
        lock(&self.tasks).len()
    }
}

fn lock(tasks: &Mutex<TaskTable>) -> MutexGuard<'_, TaskTable> {
    // A panicking task leaves the table itself consistent
    tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
