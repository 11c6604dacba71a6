//! Memory budget for the frame cache.
//!
//! **Why**: Prefetch fills the cache as fast as the renderer allows. Without a
//! byte budget a long timeline at full resolution would exhaust RAM long before
//! the entry-count capacity is reached.
//!
//! **Used by**: `GlobalFrameCache` (reserve on insert, release on eviction,
//! `over_budget` feeds `is_full`)

use log::{debug, info};
use std::sync::atomic::{AtomicUsize, Ordering};
use sysinfo::System;

const GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Byte limit derived from available system memory
fn system_limit(mem_fraction: f64, reserve_gb: f64) -> (usize, usize) {
    let mut sys = System::new();
    sys.refresh_memory();

    let available = sys.available_memory() as usize;
    let usable = available.saturating_sub((reserve_gb * GB) as usize);
    (available, (usable as f64 * mem_fraction.clamp(0.0, 1.0)) as usize)
}

#[derive(Debug)]
pub struct CacheManager {
    /// Bytes held by cached frames
    usage: AtomicUsize,
    /// Atomic so the limit can change while workers read it
    limit: AtomicUsize,
}

impl CacheManager {
    /// Budget `mem_fraction` of available memory after reserving `reserve_gb`
    /// for the rest of the system.
    pub fn new(mem_fraction: f64, reserve_gb: f64) -> Self {
        let (available, limit) = system_limit(mem_fraction, reserve_gb);
        info!(
            "CacheManager init: available={} MB, limit={} MB ({}%)",
            available / 1024 / 1024,
            limit / 1024 / 1024,
            (mem_fraction * 100.0) as u32
        );
        Self::with_limit(limit)
    }

    /// Fixed byte limit, independent of the host
    pub fn with_limit(limit: usize) -> Self {
        Self {
            usage: AtomicUsize::new(0),
            limit: AtomicUsize::new(limit),
        }
    }

    pub fn reserve(&self, bytes: usize) {
        let usage = self.usage.fetch_add(bytes, Ordering::Relaxed) + bytes;
        let limit = self.limit();
        if usage > limit {
            debug!(
                "Cache over budget: {} KB / {} KB",
                usage / 1024,
                limit / 1024
            );
        }
    }

    /// Saturating, so a double release never wraps
    pub fn release(&self, bytes: usize) {
        let _ = self
            .usage
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(current.saturating_sub(bytes))
            });
    }

    pub fn over_budget(&self) -> bool {
        self.usage() > self.limit()
    }

    pub fn usage(&self) -> usize {
        self.usage.load(Ordering::Relaxed)
    }

    pub fn limit(&self) -> usize {
        self.limit.load(Ordering::Relaxed)
    }

    /// Used fraction of the budget (0.0 when the limit is zero)
    pub fn usage_fraction(&self) -> f64 {
        match self.limit() {
            0 => 0.0,
            limit => self.usage() as f64 / limit as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_and_release() {
        let manager = CacheManager::with_limit(1000);
        manager.reserve(600);
        assert_eq!(manager.usage(), 600);
        assert!(!manager.over_budget());

        manager.reserve(600);
        assert!(manager.over_budget());
        assert!((manager.usage_fraction() - 1.2).abs() < 1e-9);

        manager.release(600);
        assert_eq!(manager.usage(), 600);
    }

    #[test]
    fn test_release_saturates() {
        let manager = CacheManager::with_limit(1000);
        manager.reserve(100);
        manager.release(500);
        assert_eq!(manager.usage(), 0);
    }

    #[test]
    fn test_zero_limit_fraction() {
        let manager = CacheManager::with_limit(0);
        assert_eq!(manager.usage_fraction(), 0.0);
    }

    #[test]
    fn test_system_limit_respects_fraction() {
        let half = CacheManager::new(0.5, 0.0);
        let none = CacheManager::new(0.0, 0.0);
        assert_eq!(none.limit(), 0);
        assert_eq!(half.usage(), 0);
    }
}
