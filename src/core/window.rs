//! Prefetch window: the contiguous frame range already rendered ahead of the
//! playhead, `[cursor_frame, cursor_frame + frames_ahead]`.
//!
//! Pure state, no locking. The job wraps it in a mutex shared by the UI
//! (progress display) and the worker (the only writer while running).

use crate::config::PrefetchConfig;

/// Outcome of [`PrefetchWindow::rebase`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rebase {
    /// Playhead still at window start
    Unchanged,
    /// Playhead moved forward into the window; `consumed` frames dropped off
    CaughtUp { consumed: u32 },
    /// Playhead jumped backward; all progress abandoned
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrefetchWindow {
    pub cursor_frame: f32,
    pub frames_ahead: u32,
}

impl PrefetchWindow {
    /// Fresh window spanning the frame right after `cursor_frame`
    pub fn new(cursor_frame: f32) -> Self {
        Self {
            cursor_frame,
            frames_ahead: 1,
        }
    }

    /// Frame currently being produced
    pub fn target_frame(&self) -> f32 {
        self.cursor_frame + self.frames_ahead as f32
    }

    /// `(start, end)` for progress display
    pub fn time_range(&self) -> (f32, f32) {
        (self.cursor_frame, self.target_frame())
    }

    /// Frames of headroom left between the produced frame and `live_cursor`
    pub fn margin(&self, live_cursor: f32) -> f32 {
        self.target_frame() - live_cursor
    }

    pub fn advance(&mut self) {
        self.frames_ahead += 1;
    }

    /// Re-sync with the live playhead.
    ///
    /// Forward motion shifts the start to `cursor` and drops the consumed
    /// frames, keeping at least one. Backward motion (a seek) resets the
    /// window to `(cursor, 1)`.
    pub fn rebase(&mut self, cursor: f32) -> Rebase {
        if cursor > self.cursor_frame {
            let delta = (cursor - self.cursor_frame) as i64;
            let remaining = (i64::from(self.frames_ahead) - delta).max(1);
            let consumed = self.frames_ahead.saturating_sub(remaining as u32);
            self.cursor_frame = cursor;
            self.frames_ahead = remaining as u32;
            return Rebase::CaughtUp { consumed };
        }
        if cursor < self.cursor_frame {
            *self = Self::new(cursor);
            return Rebase::Reset;
        }
        Rebase::Unchanged
    }
}

/// Cap on how far the worker runs ahead of an advancing playhead.
///
/// Once more than `min_ahead` frames are produced, the worker stops as soon
/// as the playhead gets within `min_margin` frames of the one being produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throttle {
    pub min_ahead: u32,
    pub min_margin: f32,
}

impl Default for Throttle {
    fn default() -> Self {
        Self {
            min_ahead: 5,
            min_margin: 2.0,
        }
    }
}

impl Throttle {
    pub fn should_yield(&self, window: &PrefetchWindow, live_cursor: f32) -> bool {
        window.frames_ahead > self.min_ahead && window.margin(live_cursor) < self.min_margin
    }
}

impl From<&PrefetchConfig> for Throttle {
    fn from(config: &PrefetchConfig) -> Self {
        Self {
            min_ahead: config.throttle_min_ahead,
            min_margin: config.throttle_min_margin,
        }
    }
}
