//! Statement execution events.
//!
//! A data-access layer publishes "a statement is about to execute" through a
//! [`StatementEvents`] source. Listeners run synchronously on the executing
//! thread, before the statement's result reaches the caller.

use crate::statement::Statement;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Receives every statement executed on a source it is registered with.
pub trait StatementListener: Send + Sync {
    /// Called in-line, once per execution.
    fn on_execute(&self, statement: &dyn Statement);
}

/// A source of statement execution events.
///
/// Listener identity is `Arc` pointer identity: registering the same `Arc`
/// twice must not produce two registrations.
pub trait StatementEvents: Send + Sync {
    /// Whether listeners may currently be attached.
    fn is_active(&self) -> bool {
        true
    }

    /// Register a listener. Registering an already present listener is a no-op.
    fn listen(&self, listener: Arc<dyn StatementListener>);

    /// Remove a listener. Returns `false` if it was not registered.
    fn remove(&self, listener: &Arc<dyn StatementListener>) -> bool;

    /// Whether `listener` is currently registered.
    fn contains(&self, listener: &Arc<dyn StatementListener>) -> bool;
}

pub(crate) fn same_listener(
    a: &Arc<dyn StatementListener>,
    b: &Arc<dyn StatementListener>,
) -> bool {
    // Data pointers only; vtables for one type may differ between codegen units.
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}

/// In-process event hub.
///
/// Data-access wrappers call [`EventSource::dispatch`] before running a
/// statement; counters attach through the [`StatementEvents`] impl.
#[derive(Default)]
pub struct EventSource {
    listeners: Mutex<Vec<Arc<dyn StatementListener>>>,
    closed: AtomicBool,
}

impl EventSource {
    /// Create an open source with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Notify every listener in registration order.
    ///
    /// The listener list is snapshotted first, so a listener may attach or
    /// detach from inside its callback. Closed sources dispatch nothing.
    pub fn dispatch(&self, statement: &dyn Statement) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }

        let listeners = self.lock().clone();
        if listeners.is_empty() {
            return;
        }

        tracing::trace!(
            target: "query_counter",
            listeners = listeners.len(),
            sql = %statement.canonical_text(),
            tag = statement.tag().unwrap_or(""),
            "dispatching statement"
        );
        for listener in &listeners {
            listener.on_execute(statement);
        }
    }

    /// Mark the source inactive and drop all listeners.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.lock().clear();
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Arc<dyn StatementListener>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSource")
            .field("listeners", &self.listener_count())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl StatementEvents for EventSource {
    fn is_active(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    fn listen(&self, listener: Arc<dyn StatementListener>) {
        let mut listeners = self.lock();
        if !listeners.iter().any(|l| same_listener(l, &listener)) {
            listeners.push(listener);
        }
    }

    fn remove(&self, listener: &Arc<dyn StatementListener>) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|l| !same_listener(l, listener));
        listeners.len() != before
    }

    fn contains(&self, listener: &Arc<dyn StatementListener>) -> bool {
        self.lock().iter().any(|l| same_listener(l, listener))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Capture(Mutex<Vec<String>>);

    impl StatementListener for Capture {
        fn on_execute(&self, statement: &dyn Statement) {
            self.0.lock().unwrap().push(statement.canonical_text().into_owned());
        }
    }

    #[test]
    fn listen_is_idempotent() {
        let source = EventSource::new();
        let listener: Arc<dyn StatementListener> = Arc::new(Capture::default());

        source.listen(listener.clone());
        source.listen(listener.clone());
        assert_eq!(source.listener_count(), 1);
        assert!(source.contains(&listener));

        assert!(source.remove(&listener));
        assert!(!source.remove(&listener));
        assert_eq!(source.listener_count(), 0);
    }

    #[test]
    fn dispatch_reaches_listeners_in_order() {
        let source = EventSource::new();
        let capture = Arc::new(Capture::default());
        source.listen(capture.clone());

        source.dispatch(&"SELECT 1");
        source.dispatch(&"SELECT 2");

        assert_eq!(*capture.0.lock().unwrap(), vec!["SELECT 1", "SELECT 2"]);
    }

    #[test]
    fn closed_source_is_inactive_and_silent() {
        let source = EventSource::new();
        let capture = Arc::new(Capture::default());
        source.listen(capture.clone());

        source.close();
        source.dispatch(&"SELECT 1");

        assert!(!source.is_active());
        assert_eq!(source.listener_count(), 0);
        assert!(capture.0.lock().unwrap().is_empty());
    }

    #[test]
    fn listener_may_detach_itself_during_dispatch() {
        struct DetachOnce {
            source: Arc<EventSource>,
            me: Mutex<Option<Arc<dyn StatementListener>>>,
        }

        impl StatementListener for DetachOnce {
            fn on_execute(&self, _: &dyn Statement) {
                if let Some(me) = self.me.lock().unwrap().take() {
                    self.source.remove(&me);
                }
            }
        }

        let source = Arc::new(EventSource::new());
        let listener = Arc::new(DetachOnce {
            source: source.clone(),
            me: Mutex::new(None),
        });
        let as_dyn: Arc<dyn StatementListener> = listener.clone();
        *listener.me.lock().unwrap() = Some(as_dyn.clone());
        source.listen(as_dyn);

        source.dispatch(&"SELECT 1");
        assert_eq!(source.listener_count(), 0);
    }
}
