//! Global frame cache with nested HashMap structure
//!
//! Structure: HashMap<Uuid, HashMap<SlotKey, CacheEntry>>
//! - Outer map: timeline_uuid -> entries
//! - Inner map: (frame_idx, cache type) -> entry
//!
//! Entries are either final (kept until recycled) or temporary, tagged with
//! the task that produced them. Temporary entries are intermediate results a
//! task drops itself once the frame is done.
//!
//! Capacity is bounded twice: by entry count and by the `CacheManager` byte
//! budget. Foreground inserts evict LRU entries to make room. Prefetch inserts
//! never do; the prefetch worker asks `recycle_one` instead, which only gives
//! up final entries the playhead has already passed.

use indexmap::IndexSet;
use log::{debug, trace};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::core::cache_man::CacheManager;
use crate::entities::{CacheTypes, Frame, PrefetchCache, RenderContext, TaskId, TASK_MAIN_RENDER};

/// Cache statistics for monitoring prefetch effectiveness
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    recycled: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recycle(&self) {
        self.recycled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Final entries given up by `recycle_one`
    pub fn recycled(&self) -> u64 {
        self.recycled.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses();
        if total == 0 { 0.0 } else { self.hits() as f64 / total as f64 }
    }
}

/// Retention class of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Kept until recycled or cleared
    Final,
    /// Intermediate result owned by the producing task
    Temporary(TaskId),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    frame: Frame,
    kind: EntryKind,
}

type SlotKey = (i32, CacheTypes);

/// Entry in LRU eviction queue
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
struct CacheKey {
    timeline: Uuid,
    frame_idx: i32,
    ty: CacheTypes,
}

/// Cache storage index for a (possibly fractional) frame
pub fn frame_index(frame: f32) -> i32 {
    frame.floor() as i32
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<Uuid, HashMap<SlotKey, CacheEntry>>,
    /// Front = least recently used
    lru: IndexSet<CacheKey>,
    playheads: HashMap<Uuid, f32>,
}

impl CacheInner {
    fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let frames = self.entries.get_mut(&key.timeline)?;
        let entry = frames.remove(&(key.frame_idx, key.ty))?;
        if frames.is_empty() {
            self.entries.remove(&key.timeline);
        }
        self.lru.shift_remove(key);
        Some(entry)
    }

    fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }
}

/// Global frame cache with nested HashMap + LRU order.
///
/// A single mutex guards entries, LRU order and playheads together.
#[derive(Debug)]
pub struct GlobalFrameCache {
    inner: Mutex<CacheInner>,
    manager: Arc<CacheManager>,
    stats: Arc<CacheStats>,
    /// Maximum entries across all timelines
    capacity: usize,
}

impl GlobalFrameCache {
    pub fn new(capacity: usize, manager: Arc<CacheManager>) -> Self {
        let capacity = capacity.max(1);
        debug!("GlobalFrameCache created: capacity={}", capacity);
        Self {
            inner: Mutex::new(CacheInner::default()),
            manager,
            stats: Arc::new(CacheStats::new()),
            capacity,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store a frame produced under `context`.
    ///
    /// Entries made on a redirected prefetch context are filed under the
    /// original context's timeline and task. Temporary entries are tagged with
    /// that task id.
    pub fn put(
        &self,
        context: &RenderContext,
        frame: f32,
        ty: CacheTypes,
        image: Frame,
        temporary: bool,
    ) {
        let owner = context.cache_owner();
        let key = CacheKey {
            timeline: owner.timeline,
            frame_idx: frame_index(frame),
            ty,
        };
        let kind = if temporary {
            EntryKind::Temporary(owner.task_id)
        } else {
            EntryKind::Final
        };
        let size = image.mem();

        let mut inner = self.lock();
        if let Some(old) = inner.remove(&key) {
            self.manager.release(old.frame.mem());
        }

        if owner.task_id == TASK_MAIN_RENDER {
            while inner.len() >= self.capacity || self.manager.over_budget() {
                let Some(oldest) = inner.lru.first().copied() else {
                    break;
                };
                if let Some(evicted) = inner.remove(&oldest) {
                    self.manager.release(evicted.frame.mem());
                    trace!("LRU evicted {}:{}", oldest.timeline, oldest.frame_idx);
                }
            }
        }

        inner
            .entries
            .entry(key.timeline)
            .or_default()
            .insert((key.frame_idx, ty), CacheEntry { frame: image, kind });
        inner.lru.insert(key);
        self.manager.reserve(size);
        trace!(
            "Cached {}:{} {:?} {:?} ({} bytes)",
            key.timeline, key.frame_idx, ty, kind, size
        );
    }

    /// Look up a frame, refreshing its LRU position on hit
    pub fn get(&self, timeline: Uuid, frame: f32, ty: CacheTypes) -> Option<Frame> {
        let key = CacheKey {
            timeline,
            frame_idx: frame_index(frame),
            ty,
        };
        let mut inner = self.lock();
        let found = inner
            .entries
            .get(&timeline)
            .and_then(|frames| frames.get(&(key.frame_idx, ty)))
            .map(|entry| entry.frame.clone());

        match found {
            Some(frame) => {
                self.stats.record_hit();
                inner.lru.shift_remove(&key);
                inner.lru.insert(key);
                Some(frame)
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// Look up without touching LRU order or stats
    pub fn peek(&self, timeline: Uuid, frame: f32, ty: CacheTypes) -> Option<Frame> {
        self.lock()
            .entries
            .get(&timeline)
            .and_then(|frames| frames.get(&(frame_index(frame), ty)))
            .map(|entry| entry.frame.clone())
    }

    /// Check presence without touching LRU order or stats
    pub fn contains(&self, timeline: Uuid, frame: f32, ty: CacheTypes) -> bool {
        self.lock()
            .entries
            .get(&timeline)
            .is_some_and(|frames| frames.contains_key(&(frame_index(frame), ty)))
    }

    pub fn entry_kind(&self, timeline: Uuid, frame: f32, ty: CacheTypes) -> Option<EntryKind> {
        self.lock()
            .entries
            .get(&timeline)
            .and_then(|frames| frames.get(&(frame_index(frame), ty)))
            .map(|entry| entry.kind)
    }

    /// Frames already passed for `timeline` become recyclable
    pub fn set_playhead(&self, timeline: Uuid, frame: f32) {
        self.lock().playheads.insert(timeline, frame);
    }

    /// Sorted frame indices holding a final entry of type `ty`
    pub fn cached_frames(&self, timeline: Uuid, ty: CacheTypes) -> Vec<i32> {
        let inner = self.lock();
        let mut frames: Vec<i32> = inner
            .entries
            .get(&timeline)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(slot, entry)| slot.1 == ty && entry.kind == EntryKind::Final)
                    .map(|(slot, _)| slot.0)
                    .collect()
            })
            .unwrap_or_default();
        frames.sort_unstable();
        frames
    }

    /// Drop everything cached for `timeline`
    pub fn clear_timeline(&self, timeline: Uuid) {
        let mut inner = self.lock();
        inner.playheads.remove(&timeline);
        if let Some(frames) = inner.entries.remove(&timeline) {
            let freed: usize = frames.values().map(|entry| entry.frame.mem()).sum();
            self.manager.release(freed);
            inner.lru.retain(|k| k.timeline != timeline);
            debug!(
                "Cleared timeline {}: {} entries, {} KB freed",
                timeline,
                frames.len(),
                freed / 1024
            );
        }
    }

    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    pub fn manager(&self) -> &Arc<CacheManager> {
        &self.manager
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total entries across all timelines
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn timeline_len(&self, timeline: Uuid) -> usize {
        self.lock().entries.get(&timeline).map_or(0, HashMap::len)
    }
}

impl PrefetchCache for GlobalFrameCache {
    fn is_full(&self, _timeline: Uuid) -> bool {
        self.len() >= self.capacity || self.manager.over_budget()
    }

    fn recycle_one(&self, timeline: Uuid) -> bool {
        let mut inner = self.lock();
        let Some(&playhead) = inner.playheads.get(&timeline) else {
            return false;
        };
        let behind = frame_index(playhead);

        let victim = inner.lru.iter().copied().find(|key| {
            key.timeline == timeline
                && key.frame_idx < behind
                && inner
                    .entries
                    .get(&key.timeline)
                    .and_then(|frames| frames.get(&(key.frame_idx, key.ty)))
                    .is_some_and(|entry| entry.kind == EntryKind::Final)
        });

        let Some(victim) = victim else {
            return false;
        };
        if let Some(entry) = inner.remove(&victim) {
            self.manager.release(entry.frame.mem());
        }
        self.stats.record_recycle();
        trace!("Recycled {}:{}", victim.timeline, victim.frame_idx);
        true
    }

    fn evict_temporary(&self, timeline: Uuid, task_id: TaskId, frame: f32) {
        let frame_idx = frame_index(frame);
        let mut inner = self.lock();
        let doomed: Vec<CacheKey> = inner
            .entries
            .get(&timeline)
            .map(|frames| {
                frames
                    .iter()
                    .filter(|(slot, entry)| {
                        slot.0 == frame_idx && entry.kind == EntryKind::Temporary(task_id)
                    })
                    .map(|(slot, _)| CacheKey {
                        timeline,
                        frame_idx,
                        ty: slot.1,
                    })
                    .collect()
            })
            .unwrap_or_default();

        for key in doomed {
            if let Some(entry) = inner.remove(&key) {
                self.manager.release(entry.frame.mem());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{SharedTimeline, Timeline, TASK_PREFETCH_RENDER};

    fn small_frame() -> Frame {
        Frame::from_u8_buffer(vec![0u8; 8 * 8 * 4], 8, 8)
    }

    fn cache(capacity: usize) -> GlobalFrameCache {
        GlobalFrameCache::new(capacity, Arc::new(CacheManager::with_limit(usize::MAX)))
    }

    #[test]
    fn test_put_get_and_stats() {
        let cache = cache(10);
        let ctx = RenderContext::new(Uuid::new_v4(), 8, 8);

        cache.put(&ctx, 3.0, CacheTypes::FINAL_OUT, small_frame(), false);
        assert!(cache.contains(ctx.timeline, 3.5, CacheTypes::FINAL_OUT));
        assert!(!cache.contains(ctx.timeline, 3.0, CacheTypes::RAW));

        assert!(cache.get(ctx.timeline, 3.0, CacheTypes::FINAL_OUT).is_some());
        assert!(cache.get(ctx.timeline, 4.0, CacheTypes::FINAL_OUT).is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits(), 1);
        assert_eq!(stats.misses(), 1);
        assert_eq!(stats.hit_rate(), 0.5);
        assert_eq!(cache.manager().usage(), 8 * 8 * 4);
    }

    #[test]
    fn test_foreground_put_evicts_lru() {
        let cache = cache(2);
        let ctx = RenderContext::new(Uuid::new_v4(), 8, 8);
        cache.put(&ctx, 1.0, CacheTypes::FINAL_OUT, small_frame(), false);
        cache.put(&ctx, 2.0, CacheTypes::FINAL_OUT, small_frame(), false);
        cache.put(&ctx, 3.0, CacheTypes::FINAL_OUT, small_frame(), false);

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(ctx.timeline, 1.0, CacheTypes::FINAL_OUT));
        assert_eq!(cache.cached_frames(ctx.timeline, CacheTypes::FINAL_OUT), vec![2, 3]);
    }

    #[test]
    fn test_prefetch_put_never_evicts() {
        let cache = cache(2);
        let ctx = RenderContext::new(Uuid::new_v4(), 8, 8).for_prefetch_owner();
        for f in 1..=3 {
            cache.put(&ctx, f as f32, CacheTypes::FINAL_OUT, small_frame(), false);
        }
        assert_eq!(cache.len(), 3);
        assert!(cache.is_full(ctx.timeline));
    }

    #[test]
    fn test_recycle_only_behind_playhead() {
        let cache = cache(3);
        let ctx = RenderContext::new(Uuid::new_v4(), 8, 8).for_prefetch_owner();
        for f in [5.0, 6.0, 7.0] {
            cache.put(&ctx, f, CacheTypes::FINAL_OUT, small_frame(), false);
        }
        assert!(cache.is_full(ctx.timeline));

        // No playhead yet: nothing recyclable
        assert!(!cache.recycle_one(ctx.timeline));

        cache.set_playhead(ctx.timeline, 5.0);
        assert!(!cache.recycle_one(ctx.timeline));

        cache.set_playhead(ctx.timeline, 6.5);
        assert!(cache.recycle_one(ctx.timeline));
        assert!(!cache.contains(ctx.timeline, 5.0, CacheTypes::FINAL_OUT));
        assert!(!cache.recycle_one(ctx.timeline));
        assert!(!cache.is_full(ctx.timeline));
        assert_eq!(cache.stats().recycled(), 1);
    }

    #[test]
    fn test_recycle_skips_temporary() {
        let cache = cache(1);
        let ctx = RenderContext::new(Uuid::new_v4(), 8, 8).for_prefetch_owner();
        cache.put(&ctx, 1.0, CacheTypes::RAW, small_frame(), true);
        cache.set_playhead(ctx.timeline, 10.0);
        assert!(!cache.recycle_one(ctx.timeline));
    }

    #[test]
    fn test_evict_temporary_by_task_and_frame() {
        let cache = cache(10);
        let main = RenderContext::new(Uuid::new_v4(), 8, 8);
        let prefetch = main.for_prefetch_owner();

        cache.put(&prefetch, 4.0, CacheTypes::RAW, small_frame(), true);
        cache.put(&prefetch, 4.0, CacheTypes::COMPOSITE, small_frame(), true);
        cache.put(&prefetch, 4.0, CacheTypes::FINAL_OUT, small_frame(), false);
        cache.put(&prefetch, 5.0, CacheTypes::RAW, small_frame(), true);
        cache.put(&main, 4.0, CacheTypes::PREPROCESSED, small_frame(), true);

        cache.evict_temporary(main.timeline, TASK_PREFETCH_RENDER, 4.0);

        assert!(!cache.contains(main.timeline, 4.0, CacheTypes::RAW));
        assert!(!cache.contains(main.timeline, 4.0, CacheTypes::COMPOSITE));
        assert!(cache.contains(main.timeline, 4.0, CacheTypes::FINAL_OUT));
        assert!(cache.contains(main.timeline, 5.0, CacheTypes::RAW));
        assert_eq!(
            cache.entry_kind(main.timeline, 4.0, CacheTypes::PREPROCESSED),
            Some(EntryKind::Temporary(TASK_MAIN_RENDER))
        );
    }

    #[test]
    fn test_put_through_redirect_files_under_owner() {
        let timeline = Arc::new(SharedTimeline::new(50.0));
        let owner = RenderContext::new(timeline.uuid(), 8, 8).for_prefetch_owner();
        let mut background = owner.for_prefetch();
        background.timeline = Uuid::new_v4();
        background.set_redirect(crate::entities::CacheRedirect::new(timeline.clone(), owner));

        let cache = cache(10);
        cache.put(&background, 2.0, CacheTypes::RAW, small_frame(), true);

        assert!(cache.contains(timeline.uuid(), 2.0, CacheTypes::RAW));
        assert_eq!(
            cache.entry_kind(timeline.uuid(), 2.0, CacheTypes::RAW),
            Some(EntryKind::Temporary(TASK_PREFETCH_RENDER))
        );
    }

    #[test]
    fn test_clear_timeline_releases_memory() {
        let cache = cache(10);
        let a = RenderContext::new(Uuid::new_v4(), 8, 8);
        let b = RenderContext::new(Uuid::new_v4(), 8, 8);
        for f in 0..4 {
            cache.put(&a, f as f32, CacheTypes::FINAL_OUT, small_frame(), false);
        }
        cache.put(&b, 0.0, CacheTypes::FINAL_OUT, small_frame(), false);

        cache.clear_timeline(a.timeline);
        assert_eq!(cache.timeline_len(a.timeline), 0);
        assert_eq!(cache.timeline_len(b.timeline), 1);
        assert_eq!(cache.manager().usage(), 8 * 8 * 4);
    }

    #[test]
    fn test_memory_budget_makes_cache_full() {
        let cache = GlobalFrameCache::new(100, Arc::new(CacheManager::with_limit(200)));
        let ctx = RenderContext::new(Uuid::new_v4(), 8, 8).for_prefetch_owner();
        assert!(!cache.is_full(ctx.timeline));
        cache.put(&ctx, 1.0, CacheTypes::FINAL_OUT, small_frame(), false);
        assert!(cache.is_full(ctx.timeline));
    }
}
