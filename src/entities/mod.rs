//! Entities module - timeline-side data types and collaborator interfaces
//!
//! The prefetch engine in `core` only sees the traits from [`traits`]. The
//! concrete types here (timeline, graph) are reference implementations that
//! hosts may replace with their own.

pub mod element;
pub mod frame;
pub mod graph;
pub mod render_context;
pub mod scene;
pub mod timeline;
pub mod traits;

pub use element::Element;
pub use frame::{Frame, FrameStatus, RenderError};
pub use graph::{ElementGraph, ElementGraphBuilder};
pub use render_context::{CacheRedirect, RenderContext, TaskId, TASK_MAIN_RENDER, TASK_PREFETCH_RENDER};
pub use scene::SceneSnapshot;
pub use timeline::{SharedTimeline, TimelineState};
pub use traits::{
    CacheSettings, CacheTypes, DependencyGraph, GraphBuilder, PrefetchCache, Renderer, Timeline,
    UiState,
};
