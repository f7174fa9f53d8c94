/// Task tracker for the background loops of a pairing controller
///
/// Keeps at most one task per name. A std mutex keeps every operation
/// synchronous so the tracker can cancel from `Drop`.
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::debug;

pub struct TaskTracker {
    tasks: Mutex<HashMap<&'static str, JoinHandle<()>>>,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
        }
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<&'static str, JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn `future` under `name`, aborting any task already registered
    /// under that name.
    pub fn spawn<F>(&self, name: &'static str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.guard();
        if let Some(old) = tasks.remove(name) {
            debug!("replacing task '{}'", name);
            old.abort();
        }
        tasks.insert(name, tokio::spawn(future));
    }

    pub fn cancel(&self, name: &str) {
        if let Some(handle) = self.guard().remove(name) {
            handle.abort();
            debug!("cancelled task '{}'", name);
        }
    }

    pub fn cancel_all(&self) {
        let drained: Vec<_> = self.guard().drain().collect();
        for (name, handle) in drained {
            handle.abort();
            debug!("cancelled task '{}'", name);
        }
    }

    /// Whether a task under `name` is registered and has not finished.
    pub fn is_running(&self, name: &str) -> bool {
        self.guard().get(name).is_some_and(|h| !h.is_finished())
    }
}

impl Default for TaskTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskTracker {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
