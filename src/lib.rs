//! FRAMEFETCH - speculative frame prefetch for timeline compositors
//!
//! Re-exports all modules for use by binary targets.

// Prefetch engine (controller, worker, cache, playback)
pub mod core;

// App modules
pub mod cli;
pub mod config;
pub mod entities;
pub mod sim;

// Re-export commonly used types from core
pub use crate::core::cache_man::CacheManager;
pub use crate::core::global_cache::GlobalFrameCache;
pub use crate::core::player::PlaybackState;
pub use crate::core::prefetcher::{Prefetcher, StartOutcome};
pub use crate::core::{Collaborators, PrefetchError};

// Re-export entities
pub use config::PrefetchConfig;
pub use entities::{Element, Frame, RenderContext, SharedTimeline, Timeline};
