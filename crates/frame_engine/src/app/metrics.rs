use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

use super::render_cycle::FrameOutcome;

static METRICS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_metrics_lock_poison_once(operation: &'static str) {
    if METRICS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "metrics lock poisoned; recovered inner value");
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    /// Frames presented per second over the last interval.
    pub fps: f32,
    /// Simulation ticks per second over the last interval.
    pub tps: f32,
    pub frame_time_ms: f32,
    /// The frame clock's exponentially smoothed rate at snapshot time.
    pub smoothed_fps: f32,
    pub skipped_frames: u32,
    /// Device recoveries since startup.
    pub recoveries: u64,
}

#[derive(Clone, Debug)]
pub struct MetricsHandle {
    snapshot: Arc<RwLock<LoopMetricsSnapshot>>,
}

impl Default for MetricsHandle {
    fn default() -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(LoopMetricsSnapshot::default())),
        }
    }
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        match self.snapshot.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("read");
                *poisoned.into_inner()
            }
        }
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("write");
                let mut guard = poisoned.into_inner();
                *guard = snapshot;
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval_start: Instant,
    interval: Duration,
    presented: u32,
    skipped: u32,
    ticks: u32,
    frame_time_sum: Duration,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    pub(crate) fn starting_at(interval: Duration, interval_start: Instant) -> Self {
        Self {
            interval_start,
            interval,
            presented: 0,
            skipped: 0,
            ticks: 0,
            frame_time_sum: Duration::ZERO,
        }
    }

    /// Counts one simulation step of `frame_time` seconds.
    pub(crate) fn record_tick(&mut self, frame_time: f32) {
        self.ticks = self.ticks.saturating_add(1);
        let frame_dt = Duration::try_from_secs_f32(frame_time).unwrap_or(Duration::ZERO);
        self.frame_time_sum = self.frame_time_sum.saturating_add(frame_dt);
    }

    pub(crate) fn record_frame(&mut self, outcome: FrameOutcome) {
        match outcome {
            FrameOutcome::Presented => self.presented = self.presented.saturating_add(1),
            FrameOutcome::Skipped(_) => self.skipped = self.skipped.saturating_add(1),
        }
    }

    pub(crate) fn maybe_snapshot(
        &mut self,
        now: Instant,
        smoothed_fps: f32,
        recoveries: u64,
    ) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let frame_time_ms = if self.ticks == 0 {
            0.0
        } else {
            (self.frame_time_sum.as_secs_f32() / self.ticks as f32) * 1000.0
        };

        let snapshot = LoopMetricsSnapshot {
            fps: self.presented as f32 / elapsed_seconds,
            tps: self.ticks as f32 / elapsed_seconds,
            frame_time_ms,
            smoothed_fps,
            skipped_frames: self.skipped,
            recoveries,
        };

        self.interval_start = now;
        self.presented = 0;
        self.skipped = 0;
        self.ticks = 0;
        self.frame_time_sum = Duration::ZERO;

        Some(snapshot)
    }
}
