//! Suspend gate: the mutex + condition variable pair a prefetch worker parks on.
//!
//! The mutex guards a single "wake pending" flag. Anyone waking the worker sets
//! it under the mutex before notifying, and the worker holds the mutex from its
//! predicate check until it blocks. A resume or stop issued while the worker is
//! about to park is therefore never lost, and a spurious wakeup just re-checks
//! the predicate.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};

#[derive(Debug, Default)]
pub struct SuspendGate {
    wake_pending: Mutex<bool>,
    cond: Condvar,
    parked: AtomicUsize,
}

impl SuspendGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park the calling thread for as long as `blocked()` holds.
    ///
    /// `waiting` is raised before every park and lowered once `blocked()`
    /// turns false, right before returning. `on_wake` runs after every wake,
    /// still under the gate mutex, before the predicate is re-checked.
    ///
    /// Returns how many times the thread parked.
    pub fn park_while(
        &self,
        waiting: &AtomicBool,
        mut blocked: impl FnMut() -> bool,
        mut on_wake: impl FnMut(),
    ) -> usize {
        let mut pending = self.wake_pending.lock().unwrap_or_else(|e| e.into_inner());
        let mut parks = 0;

        while blocked() {
            waiting.store(true, Ordering::SeqCst);
            // Any wake sent before we took the lock is already reflected in `blocked()`
            *pending = false;
            self.parked.fetch_add(1, Ordering::SeqCst);
            pending = self
                .cond
                .wait_while(pending, |pending| !*pending)
                .unwrap_or_else(|e| e.into_inner());
            self.parked.fetch_sub(1, Ordering::SeqCst);
            *pending = false;
            parks += 1;
            on_wake();
        }

        waiting.store(false, Ordering::SeqCst);
        parks
    }

    /// Wake a parked thread, if any. Safe to call at any time.
    pub fn notify(&self) {
        let mut pending = self.wake_pending.lock().unwrap_or_else(|e| e.into_inner());
        *pending = true;
        self.cond.notify_all();
    }

    /// Wake only if `waiting` is raised. Returns whether a wake was sent.
    pub fn notify_waiting(&self, waiting: &AtomicBool) -> bool {
        let mut pending = self.wake_pending.lock().unwrap_or_else(|e| e.into_inner());
        if !waiting.load(Ordering::SeqCst) {
            return false;
        }
        *pending = true;
        self.cond.notify_all();
        true
    }

    /// Number of threads currently blocked on the gate
    pub fn parked(&self) -> usize {
        self.parked.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    fn wait_until(timeout: Duration, f: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if f() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        f()
    }

    #[test]
    fn test_no_park_when_not_blocked() {
        let gate = SuspendGate::new();
        let waiting = AtomicBool::new(false);
        let parks = gate.park_while(&waiting, || false, || panic!("must not wake"));
        assert_eq!(parks, 0);
        assert!(!waiting.load(Ordering::SeqCst));
    }

    #[test]
    fn test_notify_waiting_skips_idle_gate() {
        let gate = SuspendGate::new();
        let waiting = AtomicBool::new(false);
        assert!(!gate.notify_waiting(&waiting));
    }

    #[test]
    fn test_park_until_predicate_clears() {
        let gate = Arc::new(SuspendGate::new());
        let waiting = Arc::new(AtomicBool::new(false));
        let blocked = Arc::new(AtomicBool::new(true));
        let wakes = Arc::new(AtomicUsize::new(0));

        let handle = {
            let (gate, waiting, blocked, wakes) =
                (gate.clone(), waiting.clone(), blocked.clone(), wakes.clone());
            thread::spawn(move || {
                gate.park_while(
                    &waiting,
                    || blocked.load(Ordering::SeqCst),
                    || {
                        wakes.fetch_add(1, Ordering::SeqCst);
                    },
                )
            })
        };

        assert!(wait_until(Duration::from_secs(2), || gate.parked() == 1));
        assert!(waiting.load(Ordering::SeqCst));

        // Wake without clearing the predicate: parks again
        assert!(gate.notify_waiting(&waiting));
        assert!(wait_until(Duration::from_secs(2), || {
            wakes.load(Ordering::SeqCst) == 1 && gate.parked() == 1
        }));
        assert!(waiting.load(Ordering::SeqCst));

        blocked.store(false, Ordering::SeqCst);
        gate.notify();

        let parks = handle.join().unwrap();
        assert_eq!(parks, 2);
        assert_eq!(wakes.load(Ordering::SeqCst), 2);
        assert!(!waiting.load(Ordering::SeqCst));
        assert_eq!(gate.parked(), 0);
    }
}
