/*
    ABSTRACT: The in-flight accounting primitive gating bridged delivery against
    unregistration.
*/
use std::sync::{Condvar, Mutex};

struct TokenState {
    unregistered: bool,
    inflight: u32,
}

/// Lets a `Bridge` participate in the owning registration's in-flight accounting.
///
/// `try_enter`/`exit` bracket a single bridged delivery. `unregister_wait` marks the
/// token unregistered (so no further `try_enter` succeeds) and blocks until every
/// delivery already let in by `try_enter` has called `exit`.
pub(crate) struct LifetimeToken {
    state: Mutex<TokenState>,
    cv: Condvar,
}

impl LifetimeToken {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TokenState {
                unregistered: false,
                inflight: 0,
            }),
            cv: Condvar::new(),
        }
    }

    /// Attempts to enter a dispatch. Fails once `unregister_wait` has been called.
    pub fn try_enter(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.unregistered {
            return false;
        }
        state.inflight += 1;
        true
    }

    /// Exits a dispatch previously entered via `try_enter`.
    pub fn exit(&self) {
        let mut state = self.state.lock().unwrap();
        state.inflight -= 1;
        if state.unregistered && state.inflight == 0 {
            self.cv.notify_all();
        }
    }

    /// Marks the token unregistered and blocks until every in-flight dispatch has
    /// exited. Idempotent: a second call observes `unregistered` already set and
    /// simply re-waits on the (already-satisfied) predicate.
    pub fn unregister_wait(&self) {
        let state = self.state.lock().unwrap();
        let mut state = self
            .cv
            .wait_while(state, |s| {
                s.unregistered = true;
                s.inflight != 0
            })
            .unwrap();
        state.unregistered = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn enter_fails_after_unregister() {
        let token = LifetimeToken::new();
        token.unregister_wait();
        assert!(!token.try_enter());
    }

    #[test]
    fn unregister_wait_drains_inflight_before_returning() {
        let token = Arc::new(LifetimeToken::new());
        assert!(token.try_enter());

        let waiter_token = Arc::clone(&token);
        let waiter = thread::spawn(move || waiter_token.unregister_wait());

        // Give unregister_wait a chance to observe inflight > 0 before we exit.
        thread::sleep(Duration::from_millis(20));
        token.exit();

        waiter.join().unwrap();
        assert!(!token.try_enter());
    }

    #[test]
    fn unregister_wait_is_idempotent() {
        let token = LifetimeToken::new();
        token.unregister_wait();
        token.unregister_wait();
        assert!(!token.try_enter());
    }
}
