use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::types::Task;

/// Process-wide task map, owned explicitly and shared by `Arc` — submission
/// creates entries, the owning batch mutates them, pollers read snapshots.
/// Entries live for the process lifetime; there is no eviction.
pub struct TaskRegistry {
    tasks: Mutex<HashMap<String, Task>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        TaskRegistry {
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a fresh running task and returns its id. Ids are derived from
    /// the creation timestamp in unix millis; a collision within the same
    /// millisecond bumps the value until it is free.
    pub async fn create_task(&self) -> String {
        let mut tasks = self.tasks.lock().await;
        let mut millis = Utc::now().timestamp_millis();
        while tasks.contains_key(&millis.to_string()) {
            millis += 1;
        }
        let id = millis.to_string();
        tasks.insert(id.clone(), Task::new(id.clone()));
        debug!("created task {}", id);
        id
    }

    /// Mutates one task under the lock. Returns false when the id is
    /// unknown.
    pub async fn update<F>(&self, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut Task),
    {
        let mut tasks = self.tasks.lock().await;
        match tasks.get_mut(id) {
            Some(task) => {
                f(task);
                true
            }
            None => false,
        }
    }

    /// Latest known state of one task, cloned.
    pub async fn snapshot(&self, id: &str) -> Option<Task> {
        self.tasks.lock().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::TaskStatus;

    macro_rules! aw {
        ($e:expr) => {
            tokio_test::block_on($e)
        };
    }

    #[test]
    fn ids_stay_unique_within_one_millisecond() {
        let registry = TaskRegistry::new();
        let a = aw!(registry.create_task());
        let b = aw!(registry.create_task());
        let c = aw!(registry.create_task());
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_eq!(aw!(registry.len()), 3);
    }

    #[test]
    fn new_tasks_start_running_at_zero_progress() {
        let registry = TaskRegistry::new();
        let id = aw!(registry.create_task());
        let task = aw!(registry.snapshot(&id)).unwrap();
        assert_eq!(task.status, TaskStatus::Running);
        assert_eq!(task.progress, 0.0);
        assert!(task.results.is_empty());
    }

    #[test]
    fn updates_apply_under_the_lock() {
        let registry = TaskRegistry::new();
        let id = aw!(registry.create_task());
        let updated = aw!(registry.update(&id, |t| {
            t.progress = 50.0;
            t.message = "Processing 1/2 pages...".into();
        }));
        assert!(updated);
        let task = aw!(registry.snapshot(&id)).unwrap();
        assert_eq!(task.progress, 50.0);
        assert_eq!(task.message, "Processing 1/2 pages...");
    }

    #[test]
    fn unknown_ids_are_reported() {
        let registry = TaskRegistry::new();
        assert!(!aw!(registry.update("missing", |_| {})));
        assert!(aw!(registry.snapshot("missing")).is_none());
    }
}
