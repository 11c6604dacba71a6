//! Reference dependency graph: resolves per-element local time.
//!
//! Each graph owns a private copy of the timeline's elements taken at build
//! time, so evaluating it never reads or writes the live timeline.

use log::trace;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::element::Element;
use super::scene::SceneSnapshot;
use super::traits::{DependencyGraph, GraphBuilder, Timeline};

/// Builds [`ElementGraph`]s and counts how many it built
#[derive(Debug, Default)]
pub struct ElementGraphBuilder {
    builds: AtomicUsize,
}

impl ElementGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of graphs built so far
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }
}

impl GraphBuilder for ElementGraphBuilder {
    fn build(&self, timeline: &dyn Timeline, layer: &str) -> Box<dyn DependencyGraph> {
        self.builds.fetch_add(1, Ordering::Relaxed);
        let elements: Vec<Element> = timeline
            .top_level_elements()
            .iter()
            .map(Element::duplicate)
            .collect();
        trace!(
            "ElementGraph built for {} layer '{}' ({} elements)",
            timeline.uuid(),
            layer,
            elements.len()
        );
        Box::new(ElementGraph {
            elements,
            scene: SceneSnapshot::new(f32::NAN, layer),
        })
    }
}

/// Graph over a private element copy
#[derive(Debug)]
pub struct ElementGraph {
    elements: Vec<Element>,
    scene: SceneSnapshot,
}

impl DependencyGraph for ElementGraph {
    fn evaluate(&mut self, frame: f32) {
        self.scene.frame = frame;
        self.scene.values.clear();
        for el in &self.elements {
            if let Some(t) = el.local_time(frame) {
                self.scene.values.insert(el.name.clone(), t);
            }
        }
    }

    fn evaluated_scene(&self) -> SceneSnapshot {
        self.scene.clone()
    }
}
