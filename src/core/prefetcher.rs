//! Prefetch controller - the UI-facing entry point.
//!
//! **Why**: Interactive playback and scrubbing should not stall on expensive
//! composition. The controller keeps one [`PrefetchJob`] per timeline and
//! decides, on every interactive tick, whether to wake a parked worker or
//! start a new one.
//!
//! **Used by**: UI update loop (`start_or_resume` every tick), timeline edits
//! (`stop` before structural changes), timeline teardown (`free`)
//!
//! # Start conditions
//!
//! `start_or_resume` always sends a resume signal first. A new worker is
//! started only if all hold:
//! - prefetch enabled for the timeline
//! - no worker already running for it
//! - user not scrubbing
//! - not (playing AND estimated cost above `max_playing_cost`)
//! - at least one cache type enabled
//! - timeline has editing data and at least one element

use log::{debug, info, trace};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::error::PrefetchError;
use super::job::{Collaborators, PrefetchJob};
use super::window::Throttle;
use crate::config::PrefetchConfig;
use crate::entities::{RenderContext, Timeline};

/// What `start_or_resume` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new worker was spawned
    Started,
    /// Only a resume signal was sent (the worker may or may not exist)
    Resumed,
    /// Request came from a prefetch or proxy render and was ignored
    Ignored,
}

#[derive(Debug)]
pub struct Prefetcher {
    collaborators: Collaborators,
    config: PrefetchConfig,
    jobs: HashMap<Uuid, PrefetchJob>,
}

impl Prefetcher {
    pub fn new(collaborators: Collaborators, config: PrefetchConfig) -> Self {
        info!(
            "Prefetcher init: throttle={}/{}, max_playing_cost={}",
            config.throttle_min_ahead, config.throttle_min_margin, config.max_playing_cost
        );
        Self {
            collaborators,
            config,
            jobs: HashMap::new(),
        }
    }

    pub fn config(&self) -> &PrefetchConfig {
        &self.config
    }

    /// Start or resume prefetching for `timeline` at `cursor_frame`.
    ///
    /// `estimated_cost` is the caller's render cost estimate for the current
    /// frame relative to the frame budget (1.0 = exactly one frame period).
    pub fn start_or_resume(
        &mut self,
        timeline: &Arc<dyn Timeline>,
        context: &RenderContext,
        cursor_frame: f32,
        estimated_cost: f32,
    ) -> Result<StartOutcome, PrefetchError> {
        if context.is_prefetch_render || context.is_proxy_render {
            return Ok(StartOutcome::Ignored);
        }

        let id = timeline.uuid();
        let ui = &self.collaborators.ui;
        let playing = ui.is_playing();
        let scrubbing = ui.is_scrubbing();
        let running = self.is_running(id);

        if let Some(job) = self.jobs.get(&id) {
            job.resume();
        }

        let settings = timeline.cache_settings();
        let too_expensive = playing && estimated_cost > self.config.max_playing_cost;
        let can_start = timeline.prefetch_enabled()
            && !running
            && !scrubbing
            && !too_expensive
            && !settings.enabled_types.is_empty()
            && timeline.has_editing()
            && !timeline.top_level_elements().is_empty();

        if !can_start {
            trace!(
                "Prefetch not started for {}: running={} scrubbing={} too_expensive={}",
                id, running, scrubbing, too_expensive
            );
            return Ok(StartOutcome::Resumed);
        }

        let throttle = Throttle::from(&self.config);
        let job = self
            .jobs
            .entry(id)
            .or_insert_with(|| PrefetchJob::new(Arc::clone(timeline)));
        if let Err(e) = job.start(context, cursor_frame, &self.collaborators, throttle) {
            self.jobs.remove(&id);
            return Err(e);
        }
        Ok(StartOutcome::Started)
    }

    /// Wake a parked worker without starting a new one
    pub fn resume(&self, timeline: Uuid) -> bool {
        self.jobs.get(&timeline).is_some_and(PrefetchJob::resume)
    }

    /// Stop the worker and wait for it. The job is kept for reuse.
    ///
    /// Call before structural timeline edits.
    pub fn stop(&mut self, timeline: Uuid) {
        if let Some(job) = self.jobs.get_mut(&timeline) {
            job.stop();
        }
    }

    /// Stop and destroy the job (timeline teardown)
    pub fn free(&mut self, timeline: Uuid) {
        if let Some(mut job) = self.jobs.remove(&timeline) {
            job.stop();
            debug!("PrefetchJob freed for timeline {}", timeline);
        }
    }

    /// Stop every job (application shutdown)
    pub fn stop_all(&mut self) {
        for job in self.jobs.values_mut() {
            job.stop();
        }
    }

    /// Whether cache visualization for `timeline` should repaint.
    ///
    /// True while a worker actively fills the cache (not parked, not during
    /// playback) and the overlay is on, and always while scrubbing so the end
    /// of a scrub gesture is picked up.
    pub fn needs_redraw(&self, timeline: Uuid) -> bool {
        let ui = &self.collaborators.ui;
        if ui.is_scrubbing() {
            return true;
        }
        let Some(job) = self.jobs.get(&timeline) else {
            return false;
        };
        job.is_running()
            && !ui.is_playing()
            && !job.is_waiting()
            && job.timeline().cache_settings().view_overlay_enabled
    }

    /// `(start, end)` of the prefetched range, for progress display
    pub fn time_range(&self, timeline: Uuid) -> Option<(f32, f32)> {
        self.jobs.get(&timeline).map(PrefetchJob::time_range)
    }

    pub fn is_running(&self, timeline: Uuid) -> bool {
        self.jobs.get(&timeline).is_some_and(PrefetchJob::is_running)
    }

    pub fn is_waiting(&self, timeline: Uuid) -> bool {
        self.jobs.get(&timeline).is_some_and(PrefetchJob::is_waiting)
    }

    pub fn job(&self, timeline: Uuid) -> Option<&PrefetchJob> {
        self.jobs.get(&timeline)
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }
}

impl Drop for Prefetcher {
    fn drop(&mut self) {
        self.stop_all();
    }
}
