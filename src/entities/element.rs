//! Top-level timeline elements (strips).
//!
//! Identity across the foreground timeline and the worker's private copy is
//! the element `name`: it is stable for the lifetime of the element and unique
//! among a timeline's top-level elements. The uuid is per instance and is NOT
//! preserved when a working copy is built.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Element occupying `[start, end)` on one channel of the timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub uuid: Uuid,
    pub name: String,
    pub start: f32,
    pub end: f32,
    pub channel: u32,
}

impl Element {
    pub fn new(name: impl Into<String>, start: f32, end: f32) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            start,
            end: end.max(start),
            channel: 1,
        }
    }

    /// Place element on a specific channel
    pub fn on_channel(mut self, channel: u32) -> Self {
        self.channel = channel;
        self
    }

    pub fn duration(&self) -> f32 {
        self.end - self.start
    }

    /// Check if element is visible at frame
    pub fn contains(&self, frame: f32) -> bool {
        frame >= self.start && frame < self.end
    }

    /// Normalized local time at frame (0.0 at start, approaching 1.0 at end)
    pub fn local_time(&self, frame: f32) -> Option<f32> {
        if !self.contains(frame) {
            return None;
        }
        let duration = self.duration();
        if duration <= 0.0 {
            return Some(0.0);
        }
        Some((frame - self.start) / duration)
    }

    /// Copy with a fresh uuid but the same stable name
    pub fn duplicate(&self) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_is_half_open() {
        let el = Element::new("bg", 10.0, 20.0);
        assert!(!el.contains(9.5));
        assert!(el.contains(10.0));
        assert!(el.contains(19.9));
        assert!(!el.contains(20.0));
    }

    #[test]
    fn test_local_time() {
        let el = Element::new("bg", 10.0, 20.0);
        assert_eq!(el.local_time(15.0), Some(0.5));
        assert_eq!(el.local_time(25.0), None);
    }

    #[test]
    fn test_duplicate_keeps_name_not_uuid() {
        let el = Element::new("title", 0.0, 5.0).on_channel(3);
        let copy = el.duplicate();
        assert_eq!(copy.name, el.name);
        assert_eq!(copy.channel, 3);
        assert_ne!(copy.uuid, el.uuid);
    }
}
