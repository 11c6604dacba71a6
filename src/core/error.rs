//! Prefetch errors.
//!
//! Prefetching fails soft: render failures, disabled caches or timelines with
//! nothing to render are not errors. The only hard failure is not being able
//! to start the worker thread, which leaves the timeline without prefetching
//! (synchronous rendering only).

use std::io;

#[derive(Debug)]
pub enum PrefetchError {
    /// Worker thread could not be spawned
    Spawn(io::Error),
}

impl std::fmt::Display for PrefetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrefetchError::Spawn(e) => write!(f, "Failed to spawn prefetch worker: {}", e),
        }
    }
}

impl std::error::Error for PrefetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PrefetchError::Spawn(e) => Some(e),
        }
    }
}

impl From<io::Error> for PrefetchError {
    fn from(e: io::Error) -> Self {
        PrefetchError::Spawn(e)
    }
}
