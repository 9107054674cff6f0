//! Hybrid logical clock: a `(physical_ms, logical_counter, node_id)` triple
//! that lets nodes agree on a total event order without synchronized clocks.
//!
//! Mirrors the reference station's clock service: `now()` advances on local
//! events, `receive()` merges in a remote timestamp observed on an incoming
//! envelope, and the result is always monotonic with respect to both.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use lifeboat_core::HlcValue;

/// Source of wall-clock milliseconds. Exists so tests can pin physical time
/// and exercise the logical-counter branching deterministically.
pub trait WallClock: Send + Sync {
    fn now_ms(&self) -> i64;
}

struct SystemWallClock;

impl WallClock for SystemWallClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_millis() as i64
    }
}

struct State {
    physical_ms: i64,
    logical: u64,
}

/// A node-local hybrid logical clock. Safe to share across threads; every
/// operation takes an internal lock and returns the new current value.
pub struct HybridLogicalClock {
    node_id: String,
    state: Mutex<State>,
    wall: Box<dyn WallClock>,
}

impl HybridLogicalClock {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self::with_wall_clock(node_id, Box::new(SystemWallClock))
    }

    pub fn with_wall_clock(node_id: impl Into<String>, wall: Box<dyn WallClock>) -> Self {
        Self {
            node_id: node_id.into(),
            state: Mutex::new(State {
                physical_ms: 0,
                logical: 0,
            }),
            wall,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Advance the clock for a local event and return the new value.
    ///
    /// If wall-clock time has moved past the last recorded physical time,
    /// the logical counter resets to zero. Otherwise the physical time holds
    /// and the logical counter increments, guaranteeing monotonic progress
    /// even when several events land within the same millisecond.
    pub fn now(&self) -> HlcValue {
        let wall_now = self.wall.now_ms();
        let mut guard = self.state.lock().expect("hlc mutex poisoned");
        if wall_now > guard.physical_ms {
            guard.physical_ms = wall_now;
            guard.logical = 0;
        } else {
            guard.logical += 1;
        }
        HlcValue::new(guard.physical_ms, guard.logical, self.node_id.clone())
    }

    /// Merge a remote timestamp observed on an incoming event into the local
    /// clock, then advance for the local receive event itself.
    ///
    /// `new_physical` is the max of local physical time, remote physical
    /// time, and wall-clock time. The logical counter then depends on which
    /// of those three sources tied for the max: both local and remote tied
    /// with the winning physical time bump the higher of the two logical
    /// counters; only local or only remote bump that side's counter; wall
    /// clock alone winning resets the counter to zero.
    pub fn receive(&self, remote: &HlcValue) -> HlcValue {
        let wall_now = self.wall.now_ms();
        let mut guard = self.state.lock().expect("hlc mutex poisoned");
        let new_physical = guard.physical_ms.max(remote.physical_ms).max(wall_now);

        let new_logical = if new_physical == guard.physical_ms && new_physical == remote.physical_ms
        {
            guard.logical.max(remote.logical) + 1
        } else if new_physical == guard.physical_ms {
            guard.logical + 1
        } else if new_physical == remote.physical_ms {
            remote.logical + 1
        } else {
            0
        };

        guard.physical_ms = new_physical;
        guard.logical = new_logical;
        HlcValue::new(guard.physical_ms, guard.logical, self.node_id.clone())
    }

    /// Merge an optional remote timestamp, or simply advance locally if none
    /// is given. Convenience wrapper used by the event store on append, where
    /// a locally originated event has no remote HLC to merge.
    pub fn update(&self, remote: Option<&HlcValue>) -> HlcValue {
        match remote {
            Some(remote) => self.receive(remote),
            None => self.now(),
        }
    }

    /// The current value without advancing the clock.
    pub fn current(&self) -> HlcValue {
        let guard = self.state.lock().expect("hlc mutex poisoned");
        HlcValue::new(guard.physical_ms, guard.logical, self.node_id.clone())
    }

    pub fn compare(a: &HlcValue, b: &HlcValue) -> std::cmp::Ordering {
        a.compare(b)
    }

    pub fn happened_before(a: &HlcValue, b: &HlcValue) -> bool {
        a.happened_before(b)
    }

    pub fn is_concurrent(a: &HlcValue, b: &HlcValue) -> bool {
        a.is_concurrent(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    struct SharedWall(Arc<AtomicI64>);

    impl WallClock for SharedWall {
        fn now_ms(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn clock_at(node_id: &str, wall_ms: i64) -> (HybridLogicalClock, Arc<AtomicI64>) {
        let wall = Arc::new(AtomicI64::new(wall_ms));
        let hlc = HybridLogicalClock::with_wall_clock(node_id, Box::new(SharedWall(wall.clone())));
        (hlc, wall)
    }

    #[test]
    fn three_rapid_now_calls_bump_logical_counter() {
        let (hlc, _wall) = clock_at("N1", 1000);
        let a = hlc.now();
        let b = hlc.now();
        let c = hlc.now();
        assert_eq!(a.to_string(), "1000.0.N1");
        assert_eq!(b.to_string(), "1000.1.N1");
        assert_eq!(c.to_string(), "1000.2.N1");
    }

    #[test]
    fn now_resets_logical_counter_when_wall_clock_advances() {
        let (hlc, wall) = clock_at("N1", 1000);
        hlc.now();
        hlc.now();
        wall.store(1001, Ordering::SeqCst);
        let bumped = hlc.now();
        assert_eq!(bumped.to_string(), "1001.0.N1");
    }

    #[test]
    fn receive_adopts_later_remote_physical_time() {
        let (hlc, wall) = clock_at("N1", 1000);
        hlc.now();
        wall.store(1000, Ordering::SeqCst);
        let remote = HlcValue::new(1500, 3, "N2");
        let merged = hlc.receive(&remote);
        assert_eq!(merged.to_string(), "1500.4.N1");
    }

    #[test]
    fn receive_with_tied_physical_bumps_max_logical() {
        let (hlc, _wall) = clock_at("N1", 1000);
        hlc.now(); // 1000.0.N1
        hlc.now(); // 1000.1.N1
        let remote = HlcValue::new(1000, 5, "N2");
        let merged = hlc.receive(&remote);
        assert_eq!(merged.physical_ms, 1000);
        assert_eq!(merged.logical, 6);
    }

    #[test]
    fn happened_before_respects_physical_then_logical_order() {
        let a = HlcValue::new(1000, 0, "N1");
        let b = HlcValue::new(1000, 1, "N1");
        assert!(HybridLogicalClock::happened_before(&a, &b));
        assert!(!HybridLogicalClock::happened_before(&b, &a));
    }

    #[test]
    fn concurrent_when_same_physical_different_nodes() {
        let a = HlcValue::new(1000, 0, "N1");
        let b = HlcValue::new(1000, 0, "N2");
        assert!(HybridLogicalClock::is_concurrent(&a, &b));
    }

    #[test]
    fn update_without_remote_just_advances_locally() {
        let (hlc, _wall) = clock_at("N1", 1000);
        let a = hlc.update(None);
        let b = hlc.update(None);
        assert_eq!(a.to_string(), "1000.0.N1");
        assert_eq!(b.to_string(), "1000.1.N1");
    }

    #[test]
    fn update_with_remote_merges() {
        let (hlc, wall) = clock_at("N1", 1000);
        wall.store(1000, Ordering::SeqCst);
        let remote = HlcValue::new(2000, 0, "N2");
        let merged = hlc.update(Some(&remote));
        assert_eq!(merged.to_string(), "2000.1.N1");
    }
}
