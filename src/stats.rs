//! Client-side counters for diagnostics
//!
//! Cheap atomics bumped from the frame loop, snapshotted for periodic log
//! lines. Purely observational; nothing reads these to make decisions.

use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Rolling window size for frame-time percentiles
const FRAME_HISTORY_LEN: usize = 600;

/// Counter registry for one client instance
#[derive(Debug)]
pub struct ClientStats {
    pub frames: AtomicU64,
    pub rows_applied: AtomicU64,
    pub resubscribes: AtomicU64,
    pub reconnects: AtomicU64,
    pub anomalies: AtomicU64,
    start_time: Instant,
    /// Recent frame times in microseconds (VecDeque for O(1) pop_front)
    frame_history: RwLock<VecDeque<u64>>,
}

impl ClientStats {
    pub fn new() -> Self {
        Self {
            frames: AtomicU64::new(0),
            rows_applied: AtomicU64::new(0),
            resubscribes: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            anomalies: AtomicU64::new(0),
            start_time: Instant::now(),
            frame_history: RwLock::new(VecDeque::with_capacity(FRAME_HISTORY_LEN)),
        }
    }

    #[inline]
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one frame's duration
    pub fn record_frame(&self, dt: f32) {
        Self::bump(&self.frames);
        let mut history = self.frame_history.write();
        if history.len() >= FRAME_HISTORY_LEN {
            history.pop_front();
        }
        history.push_back((dt * 1_000_000.0) as u64);
    }

    /// 95th-percentile frame time over the rolling window, in microseconds
    pub fn frame_time_p95_us(&self) -> u64 {
        let history = self.frame_history.read();
        if history.is_empty() {
            return 0;
        }
        let mut sorted: Vec<u64> = history.iter().copied().collect();
        sorted.sort_unstable();
        sorted[(sorted.len() * 95 / 100).min(sorted.len() - 1)]
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames: self.frames.load(Ordering::Relaxed),
            rows_applied: self.rows_applied.load(Ordering::Relaxed),
            resubscribes: self.resubscribes.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            anomalies: self.anomalies.load(Ordering::Relaxed),
            frame_time_p95_us: self.frame_time_p95_us(),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for ClientStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of all counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames: u64,
    pub rows_applied: u64,
    pub resubscribes: u64,
    pub reconnects: u64,
    pub anomalies: u64,
    pub frame_time_p95_us: u64,
    pub uptime_secs: u64,
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "frames={} rows={} resubscribes={} reconnects={} anomalies={} frame_p95={}us uptime={}s",
            self.frames,
            self.rows_applied,
            self.resubscribes,
            self.reconnects,
            self.anomalies,
            self.frame_time_p95_us,
            self.uptime_secs
        )
    }
}
