//! Playback state with frame-accurate timing
//!
//! **Why**: The prefetcher must yield to interaction. It reads two flags from
//! here on every iteration (playing, scrubbing), from its own thread, so both
//! are atomics.
//!
//! **Used by**: Prefetcher (`UiState`), demo binary (playback loop)
//!
//! # Timing Model
//!
//! FPS-based: each frame has a fixed duration (1/fps seconds). `update()` is
//! polled by the host loop and advances the playhead by one frame once a frame
//! duration has elapsed. No frames are skipped; if the host polls too slowly
//! playback simply runs slow.

use log::trace;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use crate::entities::{SharedTimeline, Timeline, UiState};

#[derive(Debug)]
pub struct PlaybackState {
    playing: AtomicBool,
    scrubbing: AtomicBool,
    loop_enabled: AtomicBool,
    /// f32 bits
    fps: AtomicU32,
    last_frame_time: Mutex<Option<Instant>>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new(24.0)
    }
}

impl PlaybackState {
    pub fn new(fps: f32) -> Self {
        Self {
            playing: AtomicBool::new(false),
            scrubbing: AtomicBool::new(false),
            loop_enabled: AtomicBool::new(false),
            fps: AtomicU32::new(fps.max(1.0).to_bits()),
            last_frame_time: Mutex::new(None),
        }
    }

    pub fn fps(&self) -> f32 {
        f32::from_bits(self.fps.load(Ordering::Relaxed))
    }

    pub fn set_loop(&self, enabled: bool) {
        self.loop_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn play(&self) {
        if !self.playing.swap(true, Ordering::SeqCst) {
            trace!("Playback started");
            self.reset_clock();
        }
    }

    /// Stop playback (always stops, doesn't toggle)
    pub fn stop(&self) {
        if self.playing.swap(false, Ordering::SeqCst) {
            trace!("Playback stopped");
            self.reset_clock();
        }
    }

    /// Begin a scrub gesture. Playback pauses while scrubbing.
    pub fn begin_scrub(&self) {
        self.scrubbing.store(true, Ordering::SeqCst);
        self.stop();
    }

    pub fn end_scrub(&self) {
        self.scrubbing.store(false, Ordering::SeqCst);
    }

    fn reset_clock(&self) {
        *self.last_frame_time.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Poll playback. Returns Some(new_frame) if the playhead moved.
    pub fn update(&self, timeline: &SharedTimeline) -> Option<f32> {
        if !self.is_playing() {
            return None;
        }

        let now = Instant::now();
        let mut last = self.last_frame_time.lock().unwrap_or_else(|e| e.into_inner());
        let Some(last_time) = *last else {
            *last = Some(now);
            return None;
        };

        if now.duration_since(last_time).as_secs_f32() < 1.0 / self.fps() {
            return None;
        }
        *last = Some(now);
        drop(last);

        Some(self.advance_frame(timeline))
    }

    /// Step one frame forward, looping or stopping at the end
    pub fn advance_frame(&self, timeline: &SharedTimeline) -> f32 {
        let loop_enabled = self.loop_enabled.load(Ordering::Relaxed);
        let mut reached_end = false;

        let frame = timeline.update(|s| {
            let next = s.current_frame.floor() + 1.0;
            if next >= s.end_frame {
                if loop_enabled {
                    trace!("Frame loop: {} -> 0", s.current_frame);
                    s.current_frame = 0.0;
                } else {
                    s.current_frame = (s.end_frame - 1.0).max(0.0);
                    reached_end = true;
                }
            } else {
                s.current_frame = next;
            }
            s.current_frame
        });

        if reached_end {
            trace!("Reached timeline end at {}, stopping", timeline.end_frame());
            self.stop();
        }
        frame
    }
}

impl UiState for PlaybackState {
    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn is_scrubbing(&self) -> bool {
        self.scrubbing.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_stop() {
        let state = PlaybackState::default();
        assert!(!state.is_playing());
        state.play();
        state.play();
        assert!(state.is_playing());
        state.stop();
        assert!(!state.is_playing());
    }

    #[test]
    fn test_scrub_pauses_playback() {
        let state = PlaybackState::default();
        state.play();
        state.begin_scrub();
        assert!(state.is_scrubbing());
        assert!(!state.is_playing());
        state.end_scrub();
        assert!(!state.is_scrubbing());
    }

    #[test]
    fn test_advance_stops_at_end() {
        let timeline = SharedTimeline::new(3.0);
        timeline.set_current_frame(1.0);
        let state = PlaybackState::default();
        state.play();

        assert_eq!(state.advance_frame(&timeline), 2.0);
        assert!(state.is_playing());
        assert_eq!(state.advance_frame(&timeline), 2.0);
        assert!(!state.is_playing());
    }

    #[test]
    fn test_advance_loops() {
        let timeline = SharedTimeline::new(3.0);
        timeline.set_current_frame(2.0);
        let state = PlaybackState::default();
        state.set_loop(true);
        state.play();

        assert_eq!(state.advance_frame(&timeline), 0.0);
        assert!(state.is_playing());
    }

    #[test]
    fn test_update_idle_when_stopped() {
        let timeline = SharedTimeline::new(10.0);
        let state = PlaybackState::new(1000.0);
        assert_eq!(state.update(&timeline), None);

        state.play();
        // First poll only arms the clock
        assert_eq!(state.update(&timeline), None);
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(state.update(&timeline), Some(1.0));
    }

    #[test]
    fn test_fps_floor() {
        let state = PlaybackState::new(0.0);
        assert_eq!(state.fps(), 1.0);
        assert_eq!(PlaybackState::new(48.0).fps(), 48.0);
    }
}
