//! Evaluated scene state at one point in time.

use indexmap::IndexMap;

/// Output of a dependency-graph evaluation.
///
/// `values` maps element names to their resolved value at `frame`, in
/// timeline order. Elements not visible at `frame` are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneSnapshot {
    pub frame: f32,
    pub layer: String,
    pub values: IndexMap<String, f32>,
}

impl SceneSnapshot {
    pub fn new(frame: f32, layer: impl Into<String>) -> Self {
        Self {
            frame,
            layer: layer.into(),
            values: IndexMap::new(),
        }
    }

    pub fn value(&self, name: &str) -> Option<f32> {
        self.values.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Visible element names, bottom to top
    pub fn visible(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}
