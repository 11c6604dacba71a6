//! Single-slot thread pool for prefetch workers.
//!
//! One slot per timeline job. Inserting a new worker first removes whatever
//! handle is still in the slot (joining it), so a job never owns two threads.
//! The worker's return value comes back through `join`, which is how the job
//! gets its working snapshot back after a run.

use log::{trace, warn};
use std::io;
use std::thread;

#[cfg(test)]
thread_local! {
    static FAIL_NEXT_SPAWN: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

/// Make the next `insert` on this thread fail as if the OS refused a thread
#[cfg(test)]
pub(crate) fn fail_next_spawn() {
    FAIL_NEXT_SPAWN.with(|f| f.set(true));
}

#[derive(Debug)]
pub struct ThreadSlot<T> {
    name: String,
    handle: Option<thread::JoinHandle<T>>,
    spawned: u64,
}

impl<T: Send + 'static> ThreadSlot<T> {
    /// Create an empty slot. Spawned threads are named `{name}-{n}`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handle: None,
            spawned: 0,
        }
    }

    /// Spawn `f` into the slot.
    ///
    /// A stale handle still in the slot is joined first and its result
    /// returned alongside. On spawn failure the slot stays empty.
    pub fn insert<F>(&mut self, f: F) -> io::Result<Option<T>>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let stale = self.join();

        #[cfg(test)]
        if FAIL_NEXT_SPAWN.with(|f| f.replace(false)) {
            return Err(io::Error::other("thread limit reached"));
        }

        let thread_name = format!("{}-{}", self.name, self.spawned);
        let handle = thread::Builder::new().name(thread_name.clone()).spawn(f)?;
        self.spawned += 1;
        self.handle = Some(handle);
        trace!("{} spawned", thread_name);

        Ok(stale)
    }

    /// Block until the thread in the slot exits and take its result.
    ///
    /// Returns None if the slot is empty or the thread panicked.
    pub fn join(&mut self) -> Option<T> {
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(result) => Some(result),
            Err(_) => {
                warn!("{}: worker thread panicked", self.name);
                None
            }
        }
    }

    pub fn is_occupied(&self) -> bool {
        self.handle.is_some()
    }

    /// Occupied and the thread has already returned
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| h.is_finished())
    }

    /// Total threads spawned through this slot
    pub fn spawned(&self) -> u64 {
        self.spawned
    }
}

impl<T> Drop for ThreadSlot<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                // Owner is responsible for stopping the worker first
                trace!("{}: detaching running worker thread", self.name);
            }
        }
    }
}
