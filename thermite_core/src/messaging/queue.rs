/*
    ABSTRACT: Thread-safe FIFO of immutable, reference-counted events shared
    between producers, the ObserverBus, and listeners.
*/
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

/// A thread-safe, ordered queue of shared, read-only events of a single family `T`.
///
/// Every event is held behind an `Arc<T>`, so `push`/`try_next`/`wait_next` move a
/// reference-counted handle rather than the event itself; the same event can be
/// observed by many listeners without being cloned.
///
/// Push-order equals pop-order. No method here ever runs caller code while holding
/// the internal lock.
pub struct EventQueue<T> {
    inner: Mutex<VecDeque<Arc<T>>>,
    cv: Condvar,
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            cv: Condvar::new(),
        }
    }
}

impl<T> EventQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `event` to the back of the queue and wakes one waiter, if any.
    pub fn push(&self, event: Arc<T>) {
        let mut queue = self.inner.lock().unwrap();
        queue.push_back(event);
        self.cv.notify_one();
    }

    /// Pops the front event, if any, without blocking.
    pub fn try_next(&self) -> Option<Arc<T>> {
        let mut queue = self.inner.lock().unwrap();
        queue.pop_front()
    }

    /// Blocks until an event is available, then pops and returns it.
    pub fn wait_next(&self) -> Arc<T> {
        let mut queue = self.inner.lock().unwrap();
        loop {
            if let Some(event) = queue.pop_front() {
                return event;
            }
            queue = self.cv.wait(queue).unwrap();
        }
    }

    /// Samples whether the queue currently holds any events.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    /// Samples the current number of queued events. Diagnostic use only — the
    /// value can be stale the instant it's returned under concurrent access.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}
