//! Thread-safe timeline state shared between the UI and prefetch workers.
//!
//! **Why**: The prefetch worker reads the playhead, end frame and cache flags
//! on every iteration while the UI keeps editing them. All fields sit behind
//! one mutex; every accessor takes it briefly, so reads are never torn.
//!
//! **Used by**: demo binary, tests (any host can implement `Timeline` itself)

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use uuid::Uuid;

use super::element::Element;
use super::traits::{CacheSettings, Timeline};

/// Plain timeline data (serializable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineState {
    pub current_frame: f32,
    pub end_frame: f32,
    pub prefetch_enabled: bool,
    pub cache: CacheSettings,
    pub elements: Vec<Element>,
    /// False for timelines without any sequence data block
    pub has_editing: bool,
}

impl TimelineState {
    pub fn new(end_frame: f32) -> Self {
        Self {
            current_frame: 0.0,
            end_frame,
            prefetch_enabled: true,
            cache: CacheSettings::default(),
            elements: Vec::new(),
            has_editing: true,
        }
    }
}

/// Timeline behind a mutex, usable as `Arc<dyn Timeline>`
#[derive(Debug)]
pub struct SharedTimeline {
    uuid: Uuid,
    state: Mutex<TimelineState>,
}

impl SharedTimeline {
    pub fn new(end_frame: f32) -> Self {
        Self::from_state(TimelineState::new(end_frame))
    }

    pub fn from_state(state: TimelineState) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            state: Mutex::new(state),
        }
    }

    /// Apply an arbitrary edit under the lock
    pub fn update<R>(&self, f: impl FnOnce(&mut TimelineState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    /// Copy of the current state
    pub fn state(&self) -> TimelineState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_current_frame(&self, frame: f32) {
        self.update(|s| s.current_frame = frame);
    }

    /// Move playhead by `delta`, clamped to `[0, end_frame]`. Returns new position.
    pub fn step(&self, delta: f32) -> f32 {
        self.update(|s| {
            s.current_frame = (s.current_frame + delta).clamp(0.0, s.end_frame);
            s.current_frame
        })
    }

    pub fn set_end_frame(&self, frame: f32) {
        self.update(|s| s.end_frame = frame);
    }

    pub fn set_prefetch_enabled(&self, enabled: bool) {
        self.update(|s| s.prefetch_enabled = enabled);
    }

    pub fn set_cache_settings(&self, cache: CacheSettings) {
        self.update(|s| s.cache = cache);
    }

    pub fn set_has_editing(&self, has_editing: bool) {
        self.update(|s| s.has_editing = has_editing);
    }

    pub fn push_element(&self, element: Element) {
        self.update(|s| s.elements.push(element));
    }

    /// Remove element by stable name. Returns true if found.
    pub fn remove_element(&self, name: &str) -> bool {
        self.update(|s| {
            let before = s.elements.len();
            s.elements.retain(|el| el.name != name);
            s.elements.len() != before
        })
    }
}

impl Timeline for SharedTimeline {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn current_frame(&self) -> f32 {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).current_frame
    }

    fn end_frame(&self) -> f32 {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).end_frame
    }

    fn prefetch_enabled(&self) -> bool {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).prefetch_enabled
    }

    fn cache_settings(&self) -> CacheSettings {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).cache
    }

    fn top_level_elements(&self) -> Vec<Element> {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).elements.clone()
    }

    fn has_editing(&self) -> bool {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).has_editing
    }
}
