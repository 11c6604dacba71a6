//! Abstract collaborator traits for dependency inversion.
//!
//! The prefetch engine never touches the timeline model, the evaluation
//! engine, the compositor or the cache storage directly. It drives them
//! through these traits, which also lets the worker's control logic be tested
//! without real rendering cost.
//!
//! Reference implementations live in `entities::timeline`, `entities::graph`,
//! `core::global_cache` and `core::player`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::element::Element;
use super::frame::{Frame, RenderError};
use super::render_context::{RenderContext, TaskId};
use super::scene::SceneSnapshot;

/// Bit set of cache entry types a timeline stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct CacheTypes(u8);

impl CacheTypes {
    pub const NONE: Self = Self(0);
    /// Decoded source frames
    pub const RAW: Self = Self(1);
    /// Source frames after per-element effects
    pub const PREPROCESSED: Self = Self(1 << 1);
    /// Intermediate blend results
    pub const COMPOSITE: Self = Self(1 << 2);
    /// Final composited output
    pub const FINAL_OUT: Self = Self(1 << 3);
    pub const ALL: Self = Self(0b1111);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Per-timeline cache settings, read by the worker on every iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    pub enabled_types: CacheTypes,
    /// Cache visualization overlay is shown in the UI
    pub view_overlay_enabled: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled_types: CacheTypes::ALL,
            view_overlay_enabled: false,
        }
    }
}

/// Live, mutable timeline state.
///
/// Read from both the UI thread and the prefetch worker. Implementations must
/// make every accessor safe to call concurrently with edits.
pub trait Timeline: Send + Sync {
    fn uuid(&self) -> Uuid;

    /// Playhead position
    fn current_frame(&self) -> f32;

    /// Exclusive end of the playable range
    fn end_frame(&self) -> f32;

    fn prefetch_enabled(&self) -> bool;

    fn cache_settings(&self) -> CacheSettings;

    /// Top-level elements in timeline order
    fn top_level_elements(&self) -> Vec<Element>;

    /// False when the timeline carries no editable sequence data at all
    fn has_editing(&self) -> bool {
        true
    }
}

/// Private dependency-graph instance resolving animated values.
///
/// Freed on drop.
pub trait DependencyGraph: Send {
    /// Evaluate the graph at `frame`
    fn evaluate(&mut self, frame: f32);

    /// State produced by the last `evaluate` call
    fn evaluated_scene(&self) -> SceneSnapshot;
}

/// Builds dependency graphs for a timeline
pub trait GraphBuilder: Send + Sync {
    fn build(&self, timeline: &dyn Timeline, layer: &str) -> Box<dyn DependencyGraph>;
}

/// Frame compositor.
///
/// Cost is unknown and variable. Failures come back as `Err` and are never
/// fatal to the caller.
pub trait Renderer: Send + Sync {
    fn render(
        &self,
        context: &RenderContext,
        scene: &SceneSnapshot,
        frame: f32,
    ) -> Result<Frame, RenderError>;
}

/// Capacity view of the frame cache
pub trait PrefetchCache: Send + Sync {
    /// Cache reached its capacity for this timeline
    fn is_full(&self, timeline: Uuid) -> bool;

    /// Evict one recyclable entry. Returns false if nothing could be evicted.
    fn recycle_one(&self, timeline: Uuid) -> bool;

    /// Drop temporary entries made by `task_id` at `frame`
    fn evict_temporary(&self, timeline: Uuid, task_id: TaskId, frame: f32);
}

/// Interactive UI state the engine must yield to
pub trait UiState: Send + Sync {
    /// Playback timer is running
    fn is_playing(&self) -> bool;

    /// User is dragging the playhead
    fn is_scrubbing(&self) -> bool;
}
