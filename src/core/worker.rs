//! Prefetch worker loop, one background thread per running job.
//!
//! Per iteration:
//! 1. Evaluating: advance the private graph to the window's target frame
//! 2. Rendering: render it, drop the buffer, evict this task's temporary
//!    cache entries at that frame
//! 3. Cache-Check: park on the gate while the cache is full and cannot
//!    recycle, or the user is scrubbing (unless disabled or stopping);
//!    every wake re-bases the window on the live playhead
//! 4. Continue: stop on throttle, disable or stop request; otherwise re-base
//!    and grow the window by one frame
//!
//! Stop requests are cooperative: an in-flight evaluate or render always
//! completes, the loop exits at the next check.

use log::{debug, trace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::job::{Collaborators, JobShared, WorkerExit};
use super::snapshot::WorkingSnapshot;
use super::window::Throttle;

/// Clears `running` even if the loop unwinds
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Worker thread body. Returns the snapshot so the job can keep it.
pub(crate) fn run(
    shared: Arc<JobShared>,
    mut snapshot: WorkingSnapshot,
    collaborators: Collaborators,
    throttle: Throttle,
) -> WorkingSnapshot {
    let _guard = RunningGuard(&shared.running);
    let timeline = Arc::clone(&shared.timeline);
    let timeline_id = timeline.uuid();
    let Collaborators {
        renderer, cache, ui, ..
    } = collaborators;

    snapshot.attach_redirect(Arc::clone(&timeline));
    trace!("Prefetch worker for {} entering loop", timeline_id);

    let exit = loop {
        let target = shared.window().target_frame();
        if target >= timeline.end_frame() {
            break WorkerExit::ReachedEnd;
        }

        // Evaluating
        snapshot.evaluate(target);

        // Rendering
        match snapshot.render(renderer.as_ref(), target) {
            Ok(frame) => {
                trace!("Prefetched {}:{} ({} bytes)", timeline_id, target, frame.mem());
            }
            Err(e) => {
                debug!("Prefetch render failed at {}:{}: {}", timeline_id, target, e);
            }
        }
        shared.record_frame();
        cache.evict_temporary(timeline_id, snapshot.task_id(), target);

        // Cache-Check
        let parks = shared.gate.park_while(
            &shared.waiting,
            || {
                let cache_blocked = cache.is_full(timeline_id) && !cache.recycle_one(timeline_id);
                (cache_blocked || ui.is_scrubbing())
                    && timeline.prefetch_enabled()
                    && !shared.stop_requested()
            },
            || {
                shared.rebase();
            },
        );
        if parks > 0 {
            trace!("Prefetch worker for {} resumed after {} park(s)", timeline_id, parks);
        }

        // Continue
        if throttle.should_yield(&shared.window(), timeline.current_frame()) {
            break WorkerExit::Throttled;
        }
        if !timeline.prefetch_enabled() {
            break WorkerExit::Disabled;
        }
        if shared.stop_requested() {
            break WorkerExit::Stopped;
        }

        let cursor = timeline.current_frame();
        shared.update_window(|w| {
            w.rebase(cursor);
            w.advance();
        });
    };

    // Terminated
    let last = shared.window().target_frame();
    cache.evict_temporary(timeline_id, snapshot.task_id(), last);
    shared.record_exit(exit);
    shared.running.store(false, Ordering::SeqCst);
    snapshot.detach_redirect();

    debug!(
        "Prefetch worker for {} finished: {:?} at frame {}",
        timeline_id, exit, last
    );
    snapshot
}
