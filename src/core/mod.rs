//! Core engine modules - prefetch controller, worker, cache, playback
//!
//! These modules form the prefetch engine, independent of any UI. The engine
//! sees the host only through the traits in `entities::traits`.

pub mod cache_man;
pub mod error;
pub mod gate;
pub mod global_cache;
pub mod job;
pub mod player;
pub mod prefetcher;
pub mod snapshot;
pub mod window;
mod worker;
pub mod workers;

// Re-exports for convenience
pub use cache_man::CacheManager;
pub use error::PrefetchError;
pub use gate::SuspendGate;
pub use global_cache::{CacheStats, EntryKind, GlobalFrameCache};
pub use job::{Collaborators, PrefetchJob, WorkerExit};
pub use player::PlaybackState;
pub use prefetcher::{Prefetcher, StartOutcome};
pub use snapshot::WorkingSnapshot;
pub use window::{PrefetchWindow, Rebase, Throttle};
pub use workers::ThreadSlot;
