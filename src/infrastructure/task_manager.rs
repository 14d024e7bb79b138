use std::collections::HashMap;
use tokio::task::JoinHandle;

/// Background tasks owned by a connection; at most one of each kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Handshake started by `connect()`
    Connect,
    Reader,
    Writer,
    Heartbeat,
    Reconnect,
}

/// Manages background tasks with proper lifecycle handling
pub struct TaskManager {
    handles: HashMap<TaskKind, JoinHandle<()>>,
}

impl TaskManager {
    /// Create a new empty task manager
    pub fn new() -> Self {
        Self {
            handles: HashMap::new(),
        }
    }

    /// Spawn a task in the `kind` slot, aborting whatever held it before
    pub fn spawn<F>(&mut self, kind: TaskKind, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        if let Some(previous) = self.handles.insert(kind, handle) {
            previous.abort();
        }
    }

    /// Abort the task in the `kind` slot. Idempotent.
    pub fn abort(&mut self, kind: TaskKind) {
        if let Some(handle) = self.handles.remove(&kind) {
            handle.abort();
        }
    }

    /// Forget the task without aborting it. Used by a task that is tearing
    /// itself down, since aborting the current task would cancel it at the
    /// next await point.
    pub fn detach(&mut self, kind: TaskKind) {
        self.handles.remove(&kind);
    }

    /// Remove the task from its slot and hand the handle to the caller
    pub fn take(&mut self, kind: TaskKind) -> Option<JoinHandle<()>> {
        self.handles.remove(&kind)
    }

    #[cfg(test)]
    pub(crate) fn is_tracked(&self, kind: TaskKind) -> bool {
        self.handles
            .get(&kind)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Abort all tasks without waiting
    pub fn abort_all(&mut self) {
        for (_, handle) in self.handles.drain() {
            handle.abort();
        }
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        self.abort_all();
    }
}
