//! Simulated compositor for the demo binary and engine tests.
//!
//! Burns a fixed amount of wall time per frame, fills the frame cache the way
//! a real compositor would (temporary per-element entries plus one final
//! output entry) and records which frames it rendered on which thread.
//! Frames whose final output is already cached return immediately.
//!
//! Element media is "loaded" the first time a name is seen. Only that miss
//! consults the live timeline through the cache redirect.

use log::{debug, trace};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;

use crate::core::GlobalFrameCache;
use crate::entities::{
    CacheTypes, Frame, RenderContext, RenderError, Renderer, SceneSnapshot,
};

type RenderHook = Box<dyn Fn(f32) + Send + Sync>;

pub struct SimulatedRenderer {
    cost: Duration,
    cache: Option<Arc<GlobalFrameCache>>,
    hook: Option<RenderHook>,
    rendered: Mutex<Vec<f32>>,
    threads: Mutex<Vec<ThreadId>>,
    media: Mutex<HashSet<String>>,
}

impl SimulatedRenderer {
    pub fn new(cost: Duration) -> Self {
        Self {
            cost,
            cache: None,
            hook: None,
            rendered: Mutex::new(Vec::new()),
            threads: Mutex::new(Vec::new()),
            media: Mutex::new(HashSet::new()),
        }
    }

    /// Store results in `cache`
    pub fn with_cache(mut self, cache: Arc<GlobalFrameCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Run `hook(frame)` at the start of every render
    pub fn with_hook(mut self, hook: impl Fn(f32) + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Frames rendered so far, in order
    pub fn rendered(&self) -> Vec<f32> {
        self.rendered.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Distinct threads that rendered
    pub fn threads(&self) -> Vec<ThreadId> {
        self.threads.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn record(&self, frame: f32) {
        self.rendered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(frame);
        let id = thread::current().id();
        let mut threads = self.threads.lock().unwrap_or_else(|e| e.into_inner());
        if !threads.contains(&id) {
            threads.push(id);
        }
    }

    /// Make sure media for `name` is loaded. A miss resolves the element on
    /// the live timeline when rendering through a redirect.
    fn load_media(&self, context: &RenderContext, name: &str) -> Result<(), RenderError> {
        let mut media = self.media.lock().unwrap_or_else(|e| e.into_inner());
        if media.contains(name) {
            return Ok(());
        }
        if let Some(redirect) = context.redirect()
            && redirect.original_element(name).is_none()
        {
            debug!("No live element '{}' on {}", name, redirect.timeline_uuid());
            return Err(RenderError::MissingMedia(name.to_string()));
        }
        media.insert(name.to_string());
        Ok(())
    }

    /// Cache types to store under `context`: the live timeline's settings
    /// when redirected, everything otherwise
    fn enabled_types(context: &RenderContext) -> CacheTypes {
        context
            .redirect()
            .map(|r| r.timeline().cache_settings().enabled_types)
            .unwrap_or(CacheTypes::ALL)
    }
}

impl Renderer for SimulatedRenderer {
    fn render(
        &self,
        context: &RenderContext,
        scene: &SceneSnapshot,
        frame: f32,
    ) -> Result<Frame, RenderError> {
        if let Some(hook) = &self.hook {
            hook(frame);
        }
        if let Some(cached) = self.cache.as_ref().and_then(|cache| {
            cache.peek(context.cache_owner().timeline, frame, CacheTypes::FINAL_OUT)
        }) {
            return Ok(cached);
        }
        self.record(frame);
        if !self.cost.is_zero() {
            thread::sleep(self.cost);
        }

        if scene.is_empty() {
            return Err(RenderError::EmptyScene(frame));
        }

        for name in scene.visible() {
            self.load_media(context, name)?;
        }

        let (w, h) = context.output_size();
        let Some(cache) = &self.cache else {
            return Ok(Frame::placeholder(w, h));
        };
        let types = Self::enabled_types(context);

        if types.contains(CacheTypes::RAW) {
            for _ in scene.visible() {
                cache.put(context, frame, CacheTypes::RAW, Frame::placeholder(w, h), true);
            }
        }

        let shade = (frame as u32 % 256) as u8;
        let output = Frame::from_u8_buffer(vec![shade; w * h * 4], w, h);
        if types.contains(CacheTypes::FINAL_OUT) {
            cache.put(context, frame, CacheTypes::FINAL_OUT, output.clone(), false);
        }
        trace!("Simulated render {} ({}x{})", frame, w, h);
        Ok(output)
    }
}

impl std::fmt::Debug for SimulatedRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedRenderer")
            .field("cost", &self.cost)
            .field("cached", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CacheManager;
    use crate::entities::{CacheRedirect, CacheSettings, Element, SharedTimeline, Timeline};

    fn scene_with(names: &[&str]) -> SceneSnapshot {
        let mut scene = SceneSnapshot::new(1.0, "render");
        for name in names {
            scene.values.insert(name.to_string(), 0.0);
        }
        scene
    }

    #[test]
    fn test_empty_scene_is_error() {
        let renderer = SimulatedRenderer::new(Duration::ZERO);
        let ctx = RenderContext::new(uuid::Uuid::new_v4(), 4, 4);
        let err = renderer.render(&ctx, &scene_with(&[]), 3.0).unwrap_err();
        assert!(matches!(err, RenderError::EmptyScene(f) if f == 3.0));
        assert_eq!(renderer.rendered(), vec![3.0]);
    }

    #[test]
    fn test_fills_cache() {
        let cache = Arc::new(GlobalFrameCache::new(
            10,
            Arc::new(CacheManager::with_limit(usize::MAX)),
        ));
        let renderer = SimulatedRenderer::new(Duration::ZERO).with_cache(cache.clone());
        let ctx = RenderContext::new(uuid::Uuid::new_v4(), 4, 4);

        renderer.render(&ctx, &scene_with(&["bg"]), 2.0).unwrap();
        assert!(cache.contains(ctx.timeline, 2.0, CacheTypes::RAW));
        assert!(cache.contains(ctx.timeline, 2.0, CacheTypes::FINAL_OUT));

        // Second request is served from the cache
        renderer.render(&ctx, &scene_with(&["bg"]), 2.0).unwrap();
        assert_eq!(renderer.rendered(), vec![2.0]);
        assert_eq!(cache.stats().hits(), 0);
    }

    #[test]
    fn test_redirect_respects_live_settings() {
        let timeline = Arc::new(SharedTimeline::new(10.0));
        timeline.push_element(Element::new("bg", 0.0, 10.0));
        timeline.set_cache_settings(CacheSettings {
            enabled_types: CacheTypes::FINAL_OUT,
            view_overlay_enabled: false,
        });
        let owner = RenderContext::new(timeline.uuid(), 4, 4).for_prefetch_owner();
        let mut ctx = owner.for_prefetch();
        ctx.set_redirect(CacheRedirect::new(timeline.clone(), owner));

        let cache = Arc::new(GlobalFrameCache::new(
            10,
            Arc::new(CacheManager::with_limit(usize::MAX)),
        ));
        let renderer = SimulatedRenderer::new(Duration::ZERO).with_cache(cache.clone());
        renderer.render(&ctx, &scene_with(&["bg"]), 1.0).unwrap();

        assert!(!cache.contains(timeline.uuid(), 1.0, CacheTypes::RAW));
        assert!(cache.contains(timeline.uuid(), 1.0, CacheTypes::FINAL_OUT));

        // Element removed from the live timeline
        let err = renderer.render(&ctx, &scene_with(&["gone"]), 2.0).unwrap_err();
        assert!(matches!(err, RenderError::MissingMedia(name) if name == "gone"));
    }

    #[test]
    fn test_media_resolved_once() {
        let timeline = Arc::new(SharedTimeline::new(10.0));
        timeline.push_element(Element::new("bg", 0.0, 10.0));
        let owner = RenderContext::new(timeline.uuid(), 4, 4).for_prefetch_owner();
        let mut ctx = owner.for_prefetch();
        ctx.set_redirect(CacheRedirect::new(timeline.clone(), owner));

        let renderer = SimulatedRenderer::new(Duration::ZERO);
        renderer.render(&ctx, &scene_with(&["bg"]), 1.0).unwrap();

        // Loaded media no longer needs the live element
        assert!(timeline.remove_element("bg"));
        renderer.render(&ctx, &scene_with(&["bg"]), 2.0).unwrap();
        assert_eq!(renderer.rendered(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_hook_runs_before_render() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let renderer = {
            let seen = seen.clone();
            SimulatedRenderer::new(Duration::ZERO).with_hook(move |f| seen.lock().unwrap().push(f))
        };
        let ctx = RenderContext::new(uuid::Uuid::new_v4(), 4, 4);
        let _ = renderer.render(&ctx, &scene_with(&["a"]), 7.0);
        assert_eq!(*seen.lock().unwrap(), vec![7.0]);
        assert_eq!(renderer.threads().len(), 1);
    }
}
