/*
    ABSTRACT: The three dispatcher shapes that can sit at the end of a registration:
    Direct (synchronous callback), Queue (push into a listener's queue), and Bridge
    (wraps either one with LifetimeToken accounting).
*/
use std::sync::{Arc, Mutex, Weak};

use super::queue::EventQueue;
use super::token::LifetimeToken;

/// Delivers one event to one sink. Implemented by `DirectDispatcher`, `QueueDispatcher`,
/// and `Bridge`; producers and the bus only ever hold `Arc<dyn Dispatch<T>>` /
/// `Weak<dyn Dispatch<T>>`, never a concrete variant.
pub(crate) trait Dispatch<T>: Send + Sync {
    fn deliver(&self, event: Arc<T>);
}

/// Invokes a callback synchronously, serialized through its own mutex so that two
/// concurrent deliveries through the same registration never re-enter the callback.
pub(crate) struct DirectDispatcher<T> {
    callback: Arc<dyn Fn(Arc<T>) + Send + Sync>,
    call_lock: Mutex<()>,
}

impl<T> DirectDispatcher<T> {
    pub fn new(callback: Arc<dyn Fn(Arc<T>) + Send + Sync>) -> Self {
        Self {
            callback,
            call_lock: Mutex::new(()),
        }
    }
}

impl<T> Dispatch<T> for DirectDispatcher<T> {
    fn deliver(&self, event: Arc<T>) {
        let _guard = self.call_lock.lock().unwrap();
        (self.callback)(event);
    }
}

/// Pushes into a listener's own `EventQueue<T>`; the queue's internal mutex is the
/// only serialization this dispatcher needs.
pub(crate) struct QueueDispatcher<T> {
    target: Arc<EventQueue<T>>,
}

impl<T> QueueDispatcher<T> {
    pub fn new(target: Arc<EventQueue<T>>) -> Self {
        Self { target }
    }
}

impl<T> Dispatch<T> for QueueDispatcher<T> {
    fn deliver(&self, event: Arc<T>) {
        self.target.push(event);
    }
}

/// Wraps an underlying dispatcher with in-flight accounting through a weakly-held
/// `LifetimeToken`. Every dispatcher a bus hands out to a producer is a `Bridge`;
/// a dead or unregistered token makes delivery a silent no-op.
pub(crate) struct Bridge<T> {
    token: Weak<LifetimeToken>,
    underlying: Arc<dyn Dispatch<T>>,
}

impl<T> Bridge<T> {
    pub fn new(token: Weak<LifetimeToken>, underlying: Arc<dyn Dispatch<T>>) -> Self {
        Self { token, underlying }
    }
}

impl<T> Dispatch<T> for Bridge<T> {
    fn deliver(&self, event: Arc<T>) {
        let Some(token) = self.token.upgrade() else {
            return;
        };
        if !token.try_enter() {
            return;
        }
        self.underlying.deliver(event);
        token.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn direct_dispatcher_invokes_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let dispatcher = DirectDispatcher::new(Arc::new(move |_: Arc<u32>| {
            counted.fetch_add(1, Ordering::SeqCst);
        }));
        dispatcher.deliver(Arc::new(7));
        dispatcher.deliver(Arc::new(8));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn queue_dispatcher_pushes_into_target() {
        let queue = Arc::new(EventQueue::<u32>::new());
        let dispatcher = QueueDispatcher::new(Arc::clone(&queue));
        dispatcher.deliver(Arc::new(5));
        assert_eq!(*queue.try_next().unwrap(), 5);
    }

    #[test]
    fn bridge_drops_delivery_once_token_is_unregistered() {
        let token = Arc::new(LifetimeToken::new());
        let queue = Arc::new(EventQueue::<u32>::new());
        let bridge = Bridge::new(
            Arc::downgrade(&token),
            Arc::new(QueueDispatcher::new(Arc::clone(&queue))),
        );

        bridge.deliver(Arc::new(1));
        assert_eq!(queue.len(), 1);

        token.unregister_wait();
        bridge.deliver(Arc::new(2));
        assert_eq!(queue.len(), 1, "delivery after unregister must be a no-op");
    }

    #[test]
    fn bridge_drops_delivery_once_token_is_dropped() {
        let queue = Arc::new(EventQueue::<u32>::new());
        let weak_token = {
            let token = Arc::new(LifetimeToken::new());
            Arc::downgrade(&token)
        };
        let bridge = Bridge::new(weak_token, Arc::new(QueueDispatcher::new(Arc::clone(&queue))));
        bridge.deliver(Arc::new(1));
        assert!(queue.is_empty());
    }
}
