use std::thread;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::SetupError;

const FPS_SMOOTHING: f32 = 0.99;
const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Monotonic counter the frame clock reads every iteration.
pub trait TimeSource {
    /// Current counter value in ticks.
    fn now(&self) -> u64;

    /// Ticks per second. Zero means the counter is unusable.
    fn frequency(&self) -> u64;

    fn sleep(&self, duration: Duration) {
        if duration.is_zero() {
            thread::yield_now();
        } else {
            thread::sleep(duration);
        }
    }
}

/// Nanosecond counter anchored at construction.
#[derive(Debug, Clone, Copy)]
pub struct PerformanceCounter {
    origin: Instant,
}

impl PerformanceCounter {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for PerformanceCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for PerformanceCounter {
    fn now(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    fn frequency(&self) -> u64 {
        NANOS_PER_SECOND
    }
}

/// Frame-time band derived from the target and minimum acceptable frame rates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePacing {
    pub min_frame_time: f32,
    pub max_frame_time: f32,
}

impl FramePacing {
    pub fn from_rates(target_fps: f32, min_fps: f32) -> Self {
        let min_fps = normalize_rate(min_fps, 1.0);
        let mut target_fps = normalize_rate(target_fps, min_fps);
        if target_fps < min_fps {
            warn!(target_fps, min_fps, "target rate below minimum rate; raising target");
            target_fps = min_fps;
        }

        Self {
            min_frame_time: 1.0 / target_fps,
            max_frame_time: 1.0 / min_fps,
        }
    }
}

fn normalize_rate(rate: f32, fallback: f32) -> f32 {
    if rate.is_finite() && rate >= 1.0 {
        rate
    } else {
        warn!(rate, fallback, "invalid frame rate; using fallback");
        fallback
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickResult {
    /// Not enough time has passed for the target rate; the remainder was slept away.
    NotYet,
    /// Advance the simulation by this many seconds (already clamped).
    Proceed(f32),
}

#[derive(Debug)]
pub struct FrameClock<T> {
    source: T,
    pacing: FramePacing,
    frequency: u64,
    start: u64,
    end: u64,
    frame_time: f32,
    smoothed_fps: f32,
}

impl<T: TimeSource> FrameClock<T> {
    pub fn new(source: T, pacing: FramePacing) -> Result<Self, SetupError> {
        let frequency = source.frequency();
        if frequency == 0 {
            return Err(SetupError::TimerUnavailable);
        }
        let start = source.now();

        Ok(Self {
            source,
            pacing,
            frequency,
            start,
            end: start,
            frame_time: 0.0,
            smoothed_fps: 0.0,
        })
    }

    pub fn tick(&mut self) -> TickResult {
        self.end = self.source.now();
        let elapsed =
            (self.end.saturating_sub(self.start) as f64 / self.frequency as f64) as f32;

        if elapsed < self.pacing.min_frame_time {
            let sleep_ms = ((self.pacing.min_frame_time - elapsed) * 1000.0) as u64;
            self.source.sleep(Duration::from_millis(sleep_ms));
            return TickResult::NotYet;
        }

        if elapsed > 0.0 {
            self.smoothed_fps = self.smoothed_fps * FPS_SMOOTHING + (1.0 - FPS_SMOOTHING) / elapsed;
        }

        self.frame_time = elapsed.clamp(0.0, self.pacing.max_frame_time);
        self.start = self.end;
        TickResult::Proceed(self.frame_time)
    }

    /// Seconds handed to the simulation by the last `Proceed`.
    pub fn frame_time(&self) -> f32 {
        self.frame_time
    }

    pub fn smoothed_fps(&self) -> f32 {
        self.smoothed_fps
    }

    pub fn pacing(&self) -> FramePacing {
        self.pacing
    }

    pub fn frequency(&self) -> u64 {
        self.frequency
    }

    pub fn start(&self) -> u64 {
        self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_support::ManualTimeSource;

    const MICROS: u64 = 1_000_000;

    fn scenario_pacing() -> FramePacing {
        FramePacing::from_rates(200.0, 10.0)
    }

    #[test]
    fn pacing_for_200hz_and_10hz() {
        let pacing = scenario_pacing();
        assert!((pacing.min_frame_time - 0.005).abs() < 1e-6);
        assert!((pacing.max_frame_time - 0.1).abs() < 1e-6);
    }

    #[test]
    fn pacing_normalizes_zero_and_inverted_rates() {
        let zero_min = FramePacing::from_rates(60.0, 0.0);
        assert_eq!(zero_min.max_frame_time, 1.0);

        let inverted = FramePacing::from_rates(5.0, 30.0);
        assert_eq!(inverted.min_frame_time, inverted.max_frame_time);
    }

    #[test]
    fn zero_frequency_is_a_setup_error() {
        let source = ManualTimeSource::new(0);
        let result = FrameClock::new(source, scenario_pacing());
        assert!(matches!(result, Err(SetupError::TimerUnavailable)));
    }

    #[test]
    fn short_frame_is_not_yet_and_keeps_start() {
        let source = ManualTimeSource::new(MICROS);
        let mut clock = FrameClock::new(source.clone(), scenario_pacing()).expect("clock");
        let start = clock.start();

        source.set_seconds(0.001);
        assert_eq!(clock.tick(), TickResult::NotYet);
        assert_eq!(clock.start(), start);

        source.set_seconds(0.004);
        assert_eq!(clock.tick(), TickResult::NotYet);
        assert_eq!(clock.start(), start);
    }

    #[test]
    fn not_yet_sleeps_the_remainder_in_whole_milliseconds() {
        let source = ManualTimeSource::new(MICROS);
        let mut clock = FrameClock::new(source.clone(), scenario_pacing()).expect("clock");

        source.set_seconds(0.001);
        clock.tick();

        let sleeps = source.sleeps();
        assert_eq!(sleeps.len(), 1);
        assert!(sleeps[0] >= Duration::from_millis(3));
        assert!(sleeps[0] <= Duration::from_millis(4));
    }

    #[test]
    fn long_stall_is_clamped_to_max_frame_time() {
        let source = ManualTimeSource::new(MICROS);
        let mut clock = FrameClock::new(source.clone(), scenario_pacing()).expect("clock");

        source.set_seconds(12.0);
        assert_eq!(clock.tick(), TickResult::Proceed(scenario_pacing().max_frame_time));
        assert_eq!(clock.frame_time(), scenario_pacing().max_frame_time);
    }

    #[test]
    fn elapsed_sequence_matches_pacing_band() {
        let source = ManualTimeSource::new(MICROS);
        let mut clock = FrameClock::new(source.clone(), scenario_pacing()).expect("clock");

        source.set_seconds(0.001);
        let first = clock.tick();
        source.set_seconds(0.020);
        let second = clock.tick();
        source.set_seconds(0.320);
        let third = clock.tick();

        assert_eq!(first, TickResult::NotYet);
        match second {
            TickResult::Proceed(dt) => assert!((dt - 0.02).abs() < 1e-6),
            other => panic!("expected proceed, got {other:?}"),
        }
        assert_eq!(third, TickResult::Proceed(0.1));
    }

    #[test]
    fn smoothed_fps_moves_toward_frame_rate() {
        let source = ManualTimeSource::new(MICROS);
        let mut clock = FrameClock::new(source.clone(), scenario_pacing()).expect("clock");

        for frame in 1..=2000u64 {
            source.set_seconds(frame as f64 * 0.01);
            clock.tick();
        }

        assert!((clock.smoothed_fps() - 100.0).abs() < 1.0);
    }

    #[test]
    fn smoothed_fps_stays_finite_with_zero_elapsed() {
        let source = ManualTimeSource::new(MICROS);
        let pacing = FramePacing {
            min_frame_time: 0.0,
            max_frame_time: 0.1,
        };
        let mut clock = FrameClock::new(source.clone(), pacing).expect("clock");

        assert_eq!(clock.tick(), TickResult::Proceed(0.0));
        assert!(clock.smoothed_fps().is_finite());
        assert!(clock.smoothed_fps() >= 0.0);
    }
}
