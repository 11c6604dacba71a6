//! Prefetch job: one per timeline, reused across start/stop cycles.
//!
//! **Ownership**:
//! - `JobShared` (Arc): flags, window and suspend gate, seen by both the UI
//!   thread and the worker
//! - `WorkingSnapshot`: moved into the worker for a run, handed back on join
//! - `ThreadSlot`: at most one worker thread at a time
//!
//! **Flags** (all atomics):
//! - `running`: set by `start`, cleared by the worker when its loop ends
//! - `waiting`: raised and cleared by the worker only, around gate parking
//! - `stop_requested`: set by `stop`, cleared by `start`

use log::{debug, error, info};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::error::PrefetchError;
use super::gate::SuspendGate;
use super::snapshot::WorkingSnapshot;
use super::window::{PrefetchWindow, Rebase, Throttle};
use super::worker;
use super::workers::ThreadSlot;
use crate::entities::{GraphBuilder, PrefetchCache, RenderContext, Renderer, Timeline, UiState};

/// External services a job's worker drives
#[derive(Clone)]
pub struct Collaborators {
    pub graphs: Arc<dyn GraphBuilder>,
    pub renderer: Arc<dyn Renderer>,
    pub cache: Arc<dyn PrefetchCache>,
    pub ui: Arc<dyn UiState>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Why a worker left its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Window reached the timeline end
    ReachedEnd,
    /// Playhead caught up with the produced frames
    Throttled,
    /// Prefetch switched off in the timeline settings
    Disabled,
    /// `stop` was requested
    Stopped,
}

pub(crate) struct JobShared {
    pub(crate) timeline: Arc<dyn Timeline>,
    window: Mutex<PrefetchWindow>,
    pub(crate) running: AtomicBool,
    pub(crate) waiting: AtomicBool,
    pub(crate) stop_requested: AtomicBool,
    pub(crate) gate: SuspendGate,
    last_exit: Mutex<Option<WorkerExit>>,
    frames_rendered: AtomicU64,
}

impl JobShared {
    fn new(timeline: Arc<dyn Timeline>) -> Self {
        Self {
            window: Mutex::new(PrefetchWindow::new(timeline.current_frame())),
            timeline,
            running: AtomicBool::new(false),
            waiting: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            gate: SuspendGate::new(),
            last_exit: Mutex::new(None),
            frames_rendered: AtomicU64::new(0),
        }
    }

    pub(crate) fn window(&self) -> PrefetchWindow {
        *self.window.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn update_window<R>(&self, f: impl FnOnce(&mut PrefetchWindow) -> R) -> R {
        let mut window = self.window.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut window)
    }

    /// Re-sync the window with the live playhead
    pub(crate) fn rebase(&self) -> Rebase {
        let cursor = self.timeline.current_frame();
        self.update_window(|w| w.rebase(cursor))
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    pub(crate) fn record_exit(&self, exit: WorkerExit) {
        *self.last_exit.lock().unwrap_or_else(|e| e.into_inner()) = Some(exit);
    }

    pub(crate) fn record_frame(&self) {
        self.frames_rendered.fetch_add(1, Ordering::Relaxed);
    }
}

/// Per-timeline prefetch job
pub struct PrefetchJob {
    shared: Arc<JobShared>,
    snapshot: Option<WorkingSnapshot>,
    slot: ThreadSlot<WorkingSnapshot>,
}

impl PrefetchJob {
    pub fn new(timeline: Arc<dyn Timeline>) -> Self {
        let slot = ThreadSlot::new(format!("prefetch-{}", timeline.uuid().simple()));
        info!("PrefetchJob created for timeline {}", timeline.uuid());
        Self {
            shared: Arc::new(JobShared::new(timeline)),
            snapshot: None,
            slot,
        }
    }

    pub fn timeline(&self) -> &Arc<dyn Timeline> {
        &self.shared.timeline
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn is_waiting(&self) -> bool {
        self.shared.waiting.load(Ordering::SeqCst)
    }

    pub fn is_stop_requested(&self) -> bool {
        self.shared.stop_requested()
    }

    pub fn window(&self) -> PrefetchWindow {
        self.shared.window()
    }

    /// `(start, end)` of the prefetched range
    pub fn time_range(&self) -> (f32, f32) {
        self.shared.window().time_range()
    }

    pub fn last_exit(&self) -> Option<WorkerExit> {
        *self.shared.last_exit.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Frames rendered over the job's lifetime
    pub fn frames_rendered(&self) -> u64 {
        self.shared.frames_rendered.load(Ordering::Relaxed)
    }

    /// Threads currently parked on the suspend gate
    pub fn parked_workers(&self) -> usize {
        self.shared.gate.parked()
    }

    /// A worker thread handle is held (running or not yet reclaimed)
    pub fn has_worker(&self) -> bool {
        self.slot.is_occupied()
    }

    /// Worker threads spawned over the job's lifetime
    pub fn threads_spawned(&self) -> u64 {
        self.slot.spawned()
    }

    /// Snapshot from the last finished run. None while a worker holds it.
    pub fn working_snapshot(&self) -> Option<&WorkingSnapshot> {
        self.snapshot.as_ref()
    }

    /// Wake a parked worker. Never starts one. Returns whether a wake was sent.
    pub fn resume(&self) -> bool {
        let woke = self.shared.gate.notify_waiting(&self.shared.waiting);
        if woke {
            debug!("Prefetch resumed for {}", self.shared.timeline.uuid());
        }
        woke
    }

    /// Rebuild the working snapshot and spawn a worker at `cursor_frame`.
    ///
    /// The caller guarantees no worker is running.
    pub fn start(
        &mut self,
        context: &RenderContext,
        cursor_frame: f32,
        collaborators: &Collaborators,
        throttle: Throttle,
    ) -> Result<(), PrefetchError> {
        // Reclaim the previous run's thread; its snapshot is rebuilt below
        let _ = self.slot.join();
        self.snapshot = None;

        let window = PrefetchWindow::new(cursor_frame);
        let snapshot = WorkingSnapshot::build(
            collaborators.graphs.as_ref(),
            self.shared.timeline.as_ref(),
            context,
            window.target_frame(),
        );

        self.shared.update_window(|w| *w = window);
        self.shared.waiting.store(false, Ordering::SeqCst);
        self.shared.stop_requested.store(false, Ordering::SeqCst);
        self.shared.running.store(true, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        let collaborators = collaborators.clone();
        match self
            .slot
            .insert(move || worker::run(shared, snapshot, collaborators, throttle))
        {
            Ok(_) => {
                debug!(
                    "Prefetch started for {} at frame {}",
                    self.shared.timeline.uuid(),
                    cursor_frame
                );
                Ok(())
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::SeqCst);
                error!(
                    "Prefetch disabled for {}: {}",
                    self.shared.timeline.uuid(),
                    e
                );
                Err(e.into())
            }
        }
    }

    /// Request stop and block until the worker has left its loop and joined.
    pub fn stop(&mut self) {
        self.shared.stop_requested.store(true, Ordering::SeqCst);
        if !self.slot.is_occupied() {
            return;
        }

        self.shared.gate.notify();
        if let Some(snapshot) = self.slot.join() {
            self.snapshot = Some(snapshot);
        }
        // Also covers a worker that panicked mid-run
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.waiting.store(false, Ordering::SeqCst);
        debug!("Prefetch stopped for {}", self.shared.timeline.uuid());
    }
}

impl Drop for PrefetchJob {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for PrefetchJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefetchJob")
            .field("timeline", &self.shared.timeline.uuid())
            .field("window", &self.window())
            .field("running", &self.is_running())
            .field("waiting", &self.is_waiting())
            .field("stop_requested", &self.is_stop_requested())
            .finish()
    }
}
