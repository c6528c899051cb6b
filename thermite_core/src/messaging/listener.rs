/*
    ABSTRACT: The composable "this object listens for events of family T" capability,
    built as a trait plus embedded state.
*/
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};

use super::queue::EventQueue;
use super::registration::ListenerRegistration;

/// State a listener embeds to gain `EventListener<T>`. Holds a queue events are
/// pushed into (when registered through `register_listener`) and weak references
/// to the registrations backing that queue, so `unregister`/drop can tear them down.
pub struct ListenerState<T> {
    queue: Arc<EventQueue<T>>,
    registrations: Mutex<Vec<Weak<ListenerRegistration<T>>>>,
}

impl<T> Default for ListenerState<T> {
    fn default() -> Self {
        Self {
            queue: Arc::new(EventQueue::new()),
            registrations: Mutex::new(Vec::new()),
        }
    }
}

impl<T> ListenerState<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn queue(&self) -> &Arc<EventQueue<T>> {
        &self.queue
    }

    pub(crate) fn track(&self, registration: Weak<ListenerRegistration<T>>) {
        self.registrations.lock().unwrap().push(registration);
    }

    fn collect_live(&self) -> Vec<Arc<ListenerRegistration<T>>> {
        let mut registrations = self.registrations.lock().unwrap();
        let mut live = Vec::with_capacity(registrations.len());
        registrations.retain(|weak| {
            if let Some(strong) = weak.upgrade() {
                live.push(strong);
                true
            } else {
                false
            }
        });
        live
    }

    /// Samples whether this listener's queue currently holds any events.
    pub fn has_pending_events(&self) -> bool {
        !self.queue.is_empty()
    }
}

impl<T> Drop for ListenerState<T> {
    fn drop(&mut self) {
        for registration in self.collect_live() {
            registration.unregister();
        }
    }
}

/// Implemented by objects that consume events of family `T` through a queue
/// delivered on the owning thread (e.g. gameplay systems driven by a main loop).
/// Composition over inheritance: implementors embed a `ListenerState<T>` and
/// expose it through `listener_state`, then implement `on_event`.
pub trait EventListener<T: Send + Sync + 'static> {
    fn listener_state(&self) -> &ListenerState<T>;

    /// Invoked once per queued event, in arrival order, from `process_events`.
    fn on_event(&self, event: Arc<T>);

    /// Whether this listener currently has events waiting to be processed.
    fn has_pending_events(&self) -> bool {
        self.listener_state().has_pending_events()
    }

    /// Drains every currently-queued event and invokes `on_event` for each, in
    /// order. A panic inside `on_event` is caught so one misbehaving listener
    /// can't poison the caller's loop.
    fn process_events(&self) {
        let queue = Arc::clone(self.listener_state().queue());
        while let Some(event) = queue.try_next() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| self.on_event(Arc::clone(&event))));
            if let Err(payload) = result {
                log::error!("listener on_event panicked: {}", describe_panic(&payload));
            }
        }
    }
}

fn describe_panic(payload: &Box<dyn std::any::Any + Send>) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
