/*
    ABSTRACT: The composable "this object produces events of family T" capability,
    built as a trait plus embedded state rather than a base class.
*/
use std::sync::{Arc, Mutex, Weak};

use super::registration::ProducerRegistration;

/// State a producer embeds to gain `EventProducer<T>`. Holds weak references to
/// every `ProducerRegistration` the producer currently holds across however many
/// buses it has registered with.
pub struct ProducerState<T> {
    registrations: Mutex<Vec<Weak<ProducerRegistration<T>>>>,
}

impl<T> Default for ProducerState<T> {
    fn default() -> Self {
        Self {
            registrations: Mutex::new(Vec::new()),
        }
    }
}

impl<T> ProducerState<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called by a bus at registration time.
    pub(crate) fn track(&self, registration: Weak<ProducerRegistration<T>>) {
        self.registrations.lock().unwrap().push(registration);
    }

    fn collect_live(&self) -> Vec<Arc<ProducerRegistration<T>>> {
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

    /// Dispatches `event` to every bus this producer is currently registered with.
    /// Thread-safe; callable from any thread.
    pub fn dispatch_event(&self, event: Arc<T>) {
        for registration in self.collect_live() {
            registration.dispatch(Arc::clone(&event));
        }
    }
}

impl<T> Drop for ProducerState<T> {
    fn drop(&mut self) {
        for registration in self.collect_live() {
            registration.unregister();
        }
    }
}

/// Implemented by objects that produce events of family `T` (e.g. a window
/// platform layer, an input manager). Composition over inheritance: implementors
/// embed a `ProducerState<T>` field and expose it through `producer_state`.
pub trait EventProducer<T: Send + Sync + 'static> {
    fn producer_state(&self) -> &ProducerState<T>;

    /// Dispatches `event` to every bus this producer is registered with.
    fn dispatch_event(&self, event: Arc<T>) {
        self.producer_state().dispatch_event(event);
    }
}
