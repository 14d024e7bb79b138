use super::{EventKind, LiveEvent};
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub type Callback = Arc<dyn Fn(&LiveEvent) + Send + Sync + 'static>;

/// Handle returned by [`ListenerRegistry::on`], used to unregister
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Ordered callbacks per event bucket
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Mutex<HashMap<EventKind, Vec<(ListenerId, Callback)>>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&LiveEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    /// Returns whether a listener was removed
    pub fn off(&self, kind: &EventKind, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let Some(bucket) = listeners.get_mut(kind) else {
            return false;
        };

        let before = bucket.len();
        bucket.retain(|(listener_id, _)| *listener_id != id);
        let removed = bucket.len() != before;

        if bucket.is_empty() {
            listeners.remove(kind);
        }
        removed
    }

    pub fn has_listeners(&self, kind: &EventKind) -> bool {
        self.lock().get(kind).is_some_and(|bucket| !bucket.is_empty())
    }

    #[cfg(test)]
    pub(crate) fn listener_count(&self, kind: &EventKind) -> usize {
        self.lock().get(kind).map_or(0, Vec::len)
    }

    /// Invoke every callback of `kind` in registration order.
    ///
    /// Callbacks run without the registry lock held, so they may register or
    /// remove listeners. A panicking callback is logged and skipped. Returns
    /// the number of callbacks that completed.
    pub fn emit(&self, kind: &EventKind, event: &LiveEvent) -> usize {
        let callbacks: Vec<Callback> = match self.lock().get(kind) {
            Some(bucket) => bucket.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for callback in callbacks {
            match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "non-string panic".to_string());
                    tracing::error!("Listener for '{}' panicked: {}", kind, message);
                }
            }
        }
        delivered
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<EventKind, Vec<(ListenerId, Callback)>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
