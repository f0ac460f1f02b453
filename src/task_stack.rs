use crate::registry::Registry;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

pub type TaskChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// Source of foreground-task change notifications.
pub trait TaskStackListener: Send + Sync {
    fn add_listener(&self, callback: TaskChangeCallback) -> ListenerId;
    fn remove_listener(&self, id: ListenerId) -> bool;
}

/// In-process fan-out of task change events to registered listeners.
#[derive(Default)]
pub struct TaskStackListenerImpl {
    listeners: Mutex<Registry<TaskChangeCallback>>,
}

impl TaskStackListenerImpl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn on_task_created(&self, task_id: i32) {
        tracing::trace!(task_id, "task created");
        self.dispatch();
    }

    pub fn on_task_moved_to_front(&self, task_id: i32) {
        tracing::trace!(task_id, "task moved to front");
        self.dispatch();
    }

    fn dispatch(&self) {
        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot();
        for listener in listeners {
            listener();
        }
    }
}

impl TaskStackListener for TaskStackListenerImpl {
    fn add_listener(&self, callback: TaskChangeCallback) -> ListenerId {
        let id = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(callback);
        ListenerId(id)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id.0)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn dispatches_to_each_listener_once_per_change() {
        let stack = TaskStackListenerImpl::new();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let hits = hits.clone();
            stack.add_listener(Arc::new(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            }));
        }
        stack.on_task_moved_to_front(7);
        stack.on_task_created(8);
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn removal_by_token() {
        let stack = TaskStackListenerImpl::new();
        let id = stack.add_listener(Arc::new(|| {}));
        assert_eq!(stack.listener_count(), 1);
        assert!(stack.remove_listener(id));
        assert!(!stack.remove_listener(id));
        assert_eq!(stack.listener_count(), 0);
    }
}
