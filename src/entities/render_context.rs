//! Render context passed to the renderer for every frame request.
//!
//! The prefetch worker renders with a duplicated context that points at its
//! private evaluated state. While it runs, that context carries a
//! [`CacheRedirect`] back to the original timeline so cache entries produced
//! on the background context can be attributed to the live structure.

use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use super::element::Element;
use super::traits::Timeline;

/// Identity of the task that produced a cache entry.
///
/// Temporary cache entries are tagged with it so a task can evict its own
/// intermediate results without touching anyone else's.
pub type TaskId = u32;

/// Interactive (foreground) rendering
pub const TASK_MAIN_RENDER: TaskId = 0;
/// Background prefetch rendering, shared by both prefetch contexts
pub const TASK_PREFETCH_RENDER: TaskId = 1;

/// Parameters of a render request
#[derive(Clone)]
pub struct RenderContext {
    pub timeline: Uuid,
    pub width: u32,
    pub height: u32,
    /// Preview downscale factor (1.0 = full size)
    pub preview_scale: f32,
    pub task_id: TaskId,
    pub is_prefetch_render: bool,
    pub is_proxy_render: bool,
    redirect: Option<CacheRedirect>,
}

impl RenderContext {
    pub fn new(timeline: Uuid, width: u32, height: u32) -> Self {
        Self {
            timeline,
            width,
            height,
            preview_scale: 1.0,
            task_id: TASK_MAIN_RENDER,
            is_prefetch_render: false,
            is_proxy_render: false,
            redirect: None,
        }
    }

    pub fn with_preview_scale(mut self, scale: f32) -> Self {
        self.preview_scale = scale;
        self
    }

    /// Output size after preview scaling
    pub fn output_size(&self) -> (usize, usize) {
        let w = (self.width as f32 * self.preview_scale).round().max(1.0) as usize;
        let h = (self.height as f32 * self.preview_scale).round().max(1.0) as usize;
        (w, h)
    }

    /// Duplicate for the prefetch worker (background side)
    pub fn for_prefetch(&self) -> Self {
        Self {
            task_id: TASK_PREFETCH_RENDER,
            is_prefetch_render: true,
            redirect: None,
            ..self.clone()
        }
    }

    /// Foreground twin of a prefetch context.
    ///
    /// Not flagged as prefetch, but keeps the prefetch task id so temporary
    /// entries created through either context are evicted together.
    pub fn for_prefetch_owner(&self) -> Self {
        Self {
            task_id: TASK_PREFETCH_RENDER,
            is_prefetch_render: false,
            redirect: None,
            ..self.clone()
        }
    }

    pub fn redirect(&self) -> Option<&CacheRedirect> {
        self.redirect.as_ref()
    }

    pub fn set_redirect(&mut self, redirect: CacheRedirect) {
        self.redirect = Some(redirect);
    }

    pub fn clear_redirect(&mut self) {
        self.redirect = None;
    }

    /// Context that owns cache entries made under this one
    pub fn cache_owner(&self) -> &RenderContext {
        self.redirect
            .as_ref()
            .map(|r| r.original_context())
            .unwrap_or(self)
    }
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("timeline", &self.timeline)
            .field("size", &(self.width, self.height))
            .field("preview_scale", &self.preview_scale)
            .field("task_id", &self.task_id)
            .field("is_prefetch_render", &self.is_prefetch_render)
            .field("is_proxy_render", &self.is_proxy_render)
            .field("redirected", &self.redirect.is_some())
            .finish()
    }
}

/// Back-reference from the worker's context to the original timeline.
///
/// Lookups are linear over the top-level elements. They only happen on cold
/// paths (cache miss diagnostics), never per frame.
#[derive(Clone)]
pub struct CacheRedirect {
    timeline: Arc<dyn Timeline>,
    original: Arc<RenderContext>,
}

impl CacheRedirect {
    pub fn new(timeline: Arc<dyn Timeline>, original: RenderContext) -> Self {
        Self {
            timeline,
            original: Arc::new(original),
        }
    }

    /// Find the live element matching `name`
    pub fn original_element(&self, name: &str) -> Option<Element> {
        self.timeline
            .top_level_elements()
            .into_iter()
            .find(|el| el.name == name)
    }

    /// Foreground context the worker renders on behalf of
    pub fn original_context(&self) -> &RenderContext {
        &self.original
    }

    pub fn timeline_uuid(&self) -> Uuid {
        self.timeline.uuid()
    }

    pub fn timeline(&self) -> &Arc<dyn Timeline> {
        &self.timeline
    }
}

impl fmt::Debug for CacheRedirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRedirect")
            .field("timeline", &self.timeline.uuid())
            .field("original_task", &self.original.task_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::timeline::SharedTimeline;

    #[test]
    fn test_prefetch_contexts_share_task_id() {
        let ctx = RenderContext::new(Uuid::new_v4(), 1920, 1080);
        let bg = ctx.for_prefetch();
        let owner = ctx.for_prefetch_owner();

        assert!(bg.is_prefetch_render);
        assert!(!owner.is_prefetch_render);
        assert_eq!(bg.task_id, TASK_PREFETCH_RENDER);
        assert_eq!(owner.task_id, bg.task_id);
    }

    #[test]
    fn test_output_size_applies_preview_scale() {
        let ctx = RenderContext::new(Uuid::new_v4(), 1920, 1080).with_preview_scale(0.25);
        assert_eq!(ctx.output_size(), (480, 270));
    }

    #[test]
    fn test_redirect_resolves_by_name() {
        let timeline = Arc::new(SharedTimeline::new(100.0));
        timeline.push_element(Element::new("bg", 0.0, 50.0));
        timeline.push_element(Element::new("title", 10.0, 30.0));
        let original = RenderContext::new(timeline.uuid(), 64, 64).for_prefetch_owner();

        let mut bg = original.for_prefetch();
        assert!(bg.cache_owner().is_prefetch_render);

        bg.set_redirect(CacheRedirect::new(timeline.clone(), original));
        let redirect = bg.redirect().expect("redirect attached");
        assert_eq!(redirect.original_element("title").map(|e| e.start), Some(10.0));
        assert!(redirect.original_element("missing").is_none());
        assert!(!bg.cache_owner().is_prefetch_render);

        bg.clear_redirect();
        assert!(bg.redirect().is_none());
    }
}
