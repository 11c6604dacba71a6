//! Working snapshot: the worker's private evaluation state.
//!
//! Holds its own dependency graph plus two render contexts:
//! - `context`: background duplicate, flagged as prefetch, rendered with
//! - `owner`: foreground twin sharing the prefetch task id, which cache
//!   entries made on the background side are attributed to
//!
//! Built synchronously on the UI thread before a worker starts, then moved
//! into the worker for the whole run. Nothing else touches it meanwhile.

use log::trace;
use std::fmt;
use std::sync::Arc;

use crate::entities::{
    CacheRedirect, DependencyGraph, Frame, GraphBuilder, RenderContext, RenderError, Renderer,
    SceneSnapshot, TaskId, Timeline,
};

/// View layer evaluated for prefetch renders
pub const PREFETCH_LAYER: &str = "render";

pub struct WorkingSnapshot {
    graph: Box<dyn DependencyGraph>,
    context: RenderContext,
    owner: RenderContext,
    scene: SceneSnapshot,
}

impl WorkingSnapshot {
    /// Build a private graph for `timeline` and evaluate it at `first_frame`
    /// right away, so the snapshot is never observed unevaluated.
    pub fn build(
        builder: &dyn GraphBuilder,
        timeline: &dyn Timeline,
        context: &RenderContext,
        first_frame: f32,
    ) -> Self {
        let mut graph = builder.build(timeline, PREFETCH_LAYER);
        graph.evaluate(first_frame);
        let scene = graph.evaluated_scene();

        trace!(
            "WorkingSnapshot built for {} at frame {} ({} visible)",
            timeline.uuid(),
            first_frame,
            scene.values.len()
        );

        Self {
            graph,
            context: context.for_prefetch(),
            owner: context.for_prefetch_owner(),
            scene,
        }
    }

    /// Advance the private graph to `frame`
    pub fn evaluate(&mut self, frame: f32) -> &SceneSnapshot {
        self.graph.evaluate(frame);
        self.scene = self.graph.evaluated_scene();
        &self.scene
    }

    /// Render the last evaluated state at `frame`
    pub fn render(&self, renderer: &dyn Renderer, frame: f32) -> Result<Frame, RenderError> {
        renderer.render(&self.context, &self.scene, frame)
    }

    pub fn scene(&self) -> &SceneSnapshot {
        &self.scene
    }

    /// Background context the worker renders with
    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    /// Foreground context cache entries are attributed to
    pub fn owner(&self) -> &RenderContext {
        &self.owner
    }

    pub fn task_id(&self) -> TaskId {
        self.owner.task_id
    }

    /// Point the background context back at the live timeline
    pub fn attach_redirect(&mut self, timeline: Arc<dyn Timeline>) {
        self.context
            .set_redirect(CacheRedirect::new(timeline, self.owner.clone()));
    }

    pub fn detach_redirect(&mut self) {
        self.context.clear_redirect();
    }

    pub fn is_redirected(&self) -> bool {
        self.context.redirect().is_some()
    }
}

impl fmt::Debug for WorkingSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkingSnapshot")
            .field("context", &self.context)
            .field("frame", &self.scene.frame)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Element, ElementGraphBuilder, SharedTimeline, TASK_PREFETCH_RENDER};

    fn timeline() -> Arc<SharedTimeline> {
        let timeline = Arc::new(SharedTimeline::new(100.0));
        timeline.push_element(Element::new("bg", 0.0, 100.0));
        timeline.push_element(Element::new("title", 20.0, 40.0));
        timeline
    }

    #[test]
    fn test_build_evaluates_immediately() {
        let timeline = timeline();
        let ctx = RenderContext::new(timeline.uuid(), 32, 32);
        let snapshot = WorkingSnapshot::build(&ElementGraphBuilder::new(), &*timeline, &ctx, 30.0);

        assert_eq!(snapshot.scene().frame, 30.0);
        assert_eq!(snapshot.scene().value("title"), Some(0.5));
        assert!(snapshot.context().is_prefetch_render);
        assert!(!snapshot.owner().is_prefetch_render);
        assert_eq!(snapshot.task_id(), TASK_PREFETCH_RENDER);
    }

    #[test]
    fn test_evaluate_does_not_touch_timeline() {
        let timeline = timeline();
        let ctx = RenderContext::new(timeline.uuid(), 32, 32);
        let mut snapshot =
            WorkingSnapshot::build(&ElementGraphBuilder::new(), &*timeline, &ctx, 1.0);

        let before = timeline.state().current_frame;
        snapshot.evaluate(25.0);
        assert_eq!(timeline.state().current_frame, before);
        assert_eq!(snapshot.scene().visible().count(), 2);
    }

    #[test]
    fn test_redirect_attach_detach() {
        let timeline = timeline();
        let ctx = RenderContext::new(timeline.uuid(), 32, 32);
        let mut snapshot =
            WorkingSnapshot::build(&ElementGraphBuilder::new(), &*timeline, &ctx, 1.0);
        assert!(!snapshot.is_redirected());

        snapshot.attach_redirect(timeline.clone());
        let redirect = snapshot.context().redirect().expect("attached");
        assert_eq!(redirect.timeline_uuid(), timeline.uuid());
        assert_eq!(redirect.original_element("bg").map(|e| e.end), Some(100.0));
        assert!(!snapshot.context().cache_owner().is_prefetch_render);

        snapshot.detach_redirect();
        assert!(!snapshot.is_redirected());
    }
}
