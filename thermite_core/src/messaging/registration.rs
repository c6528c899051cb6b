/*
    ABSTRACT: Per-(producer, bus) and per-(listener, bus) registration records.
*/
use std::sync::{Arc, Condvar, Mutex, Weak};

use super::dispatch::Dispatch;
use super::token::LifetimeToken;

type UnregisterCallback = Box<dyn FnOnce() + Send>;

struct ProducerInner<T> {
    unregistered: bool,
    inflight: u32,
    dispatchers: Vec<Weak<dyn Dispatch<T>>>,
    unregister_cb: Option<UnregisterCallback>,
}

/// Binds one producer to one bus. Holds weak references to the dispatchers (always
/// `Bridge`s, handed out by the bus) that `dispatch` forwards events to.
pub(crate) struct ProducerRegistration<T> {
    inner: Mutex<ProducerInner<T>>,
    cv: Condvar,
}

impl<T> ProducerRegistration<T> {
    pub fn new(unregister_cb: UnregisterCallback) -> Self {
        Self {
            inner: Mutex::new(ProducerInner {
                unregistered: false,
                inflight: 0,
                dispatchers: Vec::new(),
                unregister_cb: Some(unregister_cb),
            }),
            cv: Condvar::new(),
        }
    }

    pub fn add_dispatcher(&self, dispatcher: Weak<dyn Dispatch<T>>) {
        let mut inner = self.inner.lock().unwrap();
        if inner.unregistered {
            return;
        }
        inner.dispatchers.retain(|weak| weak.upgrade().is_some());
        inner.dispatchers.push(dispatcher);
    }

    /// Removes `dispatcher` from this registration's list, pruning any other
    /// dead weak references as it walks. A no-op if `dispatcher` isn't present.
    pub fn remove_dispatcher(&self, dispatcher: &Arc<dyn Dispatch<T>>) {
        let mut inner = self.inner.lock().unwrap();
        inner.dispatchers.retain(|weak| match weak.upgrade() {
            Some(strong) => !Arc::ptr_eq(&strong, dispatcher),
            None => false,
        });
    }

    /// Snapshots the live dispatchers and delivers `event` to each of them, in
    /// registration order, outside the registration's own lock.
    pub fn dispatch(&self, event: Arc<T>) {
        let live: Vec<Arc<dyn Dispatch<T>>> = {
            let mut inner = self.inner.lock().unwrap();
            if inner.unregistered {
                return;
            }
            let mut live = Vec::with_capacity(inner.dispatchers.len());
            inner.dispatchers.retain(|weak| {
                if let Some(strong) = weak.upgrade() {
                    live.push(strong);
                    true
                } else {
                    false
                }
            });
            inner.inflight += 1;
            live
        };

        for dispatcher in &live {
            dispatcher.deliver(Arc::clone(&event));
        }

        let mut inner = self.inner.lock().unwrap();
        inner.inflight -= 1;
        if inner.unregistered && inner.inflight == 0 {
            self.cv.notify_all();
        }
    }

    /// Idempotent. Marks the registration unregistered, invokes the bus's teardown
    /// callback outside the lock, drops the dispatcher list, then blocks until any
    /// dispatch already in flight has finished.
    pub fn unregister(&self) {
        let cb = {
            let mut inner = self.inner.lock().unwrap();
            if inner.unregistered {
                return;
            }
            inner.unregistered = true;
            inner.unregister_cb.take()
        };

        if let Some(cb) = cb {
            cb();
        }

        let mut inner = self.inner.lock().unwrap();
        inner.dispatchers.clear();
        let _inner = self.cv.wait_while(inner, |inner| inner.inflight != 0).unwrap();
    }

    /// Prevents a subsequent `unregister` from invoking the bus callback. Used by
    /// the bus's own teardown to break the "bus drop -> callback -> bus" cycle.
    pub fn disable_unregister_callback(&self) {
        self.inner.lock().unwrap().unregister_cb = None;
    }
}

struct ListenerInner<T> {
    unregistered: bool,
    dispatcher: Option<Arc<dyn Dispatch<T>>>,
    unregister_cb: Option<UnregisterCallback>,
}

/// Binds one listener to one bus. Holds the single dispatcher (always a `Bridge`
/// wrapping Direct or Queue) the bus delivers through, and the `LifetimeToken` that
/// bridge shares weakly.
pub(crate) struct ListenerRegistration<T> {
    inner: Mutex<ListenerInner<T>>,
    token: Arc<LifetimeToken>,
}

impl<T> ListenerRegistration<T> {
    pub fn new(
        dispatcher: Arc<dyn Dispatch<T>>,
        token: Arc<LifetimeToken>,
        unregister_cb: UnregisterCallback,
    ) -> Self {
        Self {
            inner: Mutex::new(ListenerInner {
                unregistered: false,
                dispatcher: Some(dispatcher),
                unregister_cb: Some(unregister_cb),
            }),
            token,
        }
    }

    /// Forwards to the stored dispatcher; the `Bridge` it wraps performs the
    /// in-flight accounting.
    pub fn dispatch(&self, event: Arc<T>) {
        let dispatcher = self.inner.lock().unwrap().dispatcher.clone();
        if let Some(dispatcher) = dispatcher {
            dispatcher.deliver(event);
        }
    }

    /// Idempotent: sets `unregistered` before invoking the callback so a
    /// re-entrant call returns at the top instead of recursing through it.
    pub fn unregister(&self) {
        let cb = {
            let mut inner = self.inner.lock().unwrap();
            if inner.unregistered {
                return;
            }
            inner.unregistered = true;
            inner.unregister_cb.take()
        };

        if let Some(cb) = cb {
            cb();
        }

        self.inner.lock().unwrap().dispatcher = None;
        self.token.unregister_wait();
    }

    pub fn disable_unregister_callback(&self) {
        self.inner.lock().unwrap().unregister_cb = None;
    }
}
