use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::clock::{FrameClock, TickResult, TimeSource};
use super::device::DeviceSurface;
use super::game::Game;
use super::input::InputDevice;
use super::metrics::{MetricsAccumulator, MetricsHandle};
use super::render_cycle::{FrameOutcome, RenderCycle};

/// Source of OS/window messages, drained before any tick runs.
pub trait MessagePump<I> {
    type Message;

    /// Removes and returns the next pending message without blocking.
    fn peek_message(&mut self) -> Option<Self::Message>;

    /// `Some(exit_code)` when the message asks the loop to stop.
    fn shutdown_code(&self, message: &Self::Message) -> Option<i32>;

    fn dispatch(&mut self, message: Self::Message, context: DispatchContext<'_, I>);
}

/// Loop state handed to message dispatch. Replaces any process-wide flags.
pub struct DispatchContext<'a, I> {
    pub control: &'a mut LoopControl,
    pub input: &'a mut I,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopControl {
    running: bool,
    paused: bool,
    exit_code: i32,
}

impl Default for LoopControl {
    fn default() -> Self {
        Self {
            running: true,
            paused: false,
            exit_code: 0,
        }
    }
}

impl LoopControl {
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        if self.paused != paused {
            info!(paused, "pause_changed");
        }
        self.paused = paused;
    }

    pub fn toggle_pause(&mut self) {
        self.set_paused(!self.paused);
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub(crate) fn stop(&mut self, exit_code: i32) {
        self.running = false;
        self.exit_code = exit_code;
    }
}

/// What one loop iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Iteration {
    Dispatched,
    /// The frame clock said not yet; nothing ran.
    Idle,
    Ticked(FrameOutcome),
}

pub struct GameLoop<T: TimeSource> {
    clock: FrameClock<T>,
    control: LoopControl,
    render: RenderCycle,
    metrics: MetricsAccumulator,
    metrics_handle: MetricsHandle,
}

impl<T: TimeSource> GameLoop<T> {
    pub fn new(clock: FrameClock<T>, metrics_log_interval: Duration) -> Self {
        Self {
            clock,
            control: LoopControl::default(),
            render: RenderCycle::new(),
            metrics: MetricsAccumulator::new(metrics_log_interval),
            metrics_handle: MetricsHandle::default(),
        }
    }

    pub fn with_metrics_handle(mut self, metrics_handle: MetricsHandle) -> Self {
        self.metrics_handle = metrics_handle;
        self
    }

    pub fn control(&self) -> &LoopControl {
        &self.control
    }

    pub fn control_mut(&mut self) -> &mut LoopControl {
        &mut self.control
    }

    pub fn clock(&self) -> &FrameClock<T> {
        &self.clock
    }

    pub fn render_cycle(&self) -> &RenderCycle {
        &self.render
    }

    pub fn metrics_handle(&self) -> &MetricsHandle {
        &self.metrics_handle
    }

    /// Runs until a shutdown message is dispatched and returns its exit code.
    pub fn run<P, G>(
        &mut self,
        pump: &mut P,
        surface: &mut DeviceSurface<G::Backend>,
        game: &mut G,
        input: &mut G::Input,
    ) -> Result<i32, G::Error>
    where
        P: MessagePump<G::Input>,
        G: Game,
    {
        let pacing = self.clock.pacing();
        info!(
            min_frame_time_ms = pacing.min_frame_time * 1000.0,
            max_frame_time_ms = pacing.max_frame_time * 1000.0,
            timer_frequency = self.clock.frequency(),
            "loop_config"
        );

        while self.control.is_running() {
            self.step(pump, surface, game, input)?;
        }

        info!(
            exit_code = self.control.exit_code(),
            frames_presented = self.render.frames_presented(),
            frames_skipped = self.render.frames_skipped(),
            "shutdown"
        );
        Ok(self.control.exit_code())
    }

    /// One iteration: dispatch a pending message, or else try to tick.
    pub fn step<P, G>(
        &mut self,
        pump: &mut P,
        surface: &mut DeviceSurface<G::Backend>,
        game: &mut G,
        input: &mut G::Input,
    ) -> Result<Iteration, G::Error>
    where
        P: MessagePump<G::Input>,
        G: Game,
    {
        if let Some(message) = pump.peek_message() {
            let shutdown = pump.shutdown_code(&message);
            pump.dispatch(
                message,
                DispatchContext {
                    control: &mut self.control,
                    input,
                },
            );
            if let Some(exit_code) = shutdown {
                info!(exit_code, "shutdown_requested");
                self.control.stop(exit_code);
            }
            return Ok(Iteration::Dispatched);
        }

        self.tick(surface, game, input)
    }

    fn tick<G>(
        &mut self,
        surface: &mut DeviceSurface<G::Backend>,
        game: &mut G,
        input: &mut G::Input,
    ) -> Result<Iteration, G::Error>
    where
        G: Game,
    {
        let frame_time = match self.clock.tick() {
            TickResult::NotYet => return Ok(Iteration::Idle),
            TickResult::Proceed(frame_time) => frame_time,
        };

        if !self.control.is_paused() {
            game.update(frame_time, input)?;
            game.ai()?;
            game.collisions()?;
            input.vibrate_controllers(frame_time);
        }

        let outcome = self.render.render_frame(surface, game)?;
        if let FrameOutcome::Skipped(health) = outcome {
            debug!(health = ?health, "frame_skipped");
        }

        input.read_controllers();
        input.clear_pressed();

        self.metrics.record_tick(frame_time);
        self.metrics.record_frame(outcome);
        if let Some(snapshot) = self.metrics.maybe_snapshot(
            Instant::now(),
            self.clock.smoothed_fps(),
            surface.recoveries(),
        ) {
            self.metrics_handle.publish(snapshot);
            info!(
                fps = snapshot.fps,
                tps = snapshot.tps,
                frame_time_ms = snapshot.frame_time_ms,
                smoothed_fps = snapshot.smoothed_fps,
                skipped_frames = snapshot.skipped_frames,
                recoveries = snapshot.recoveries,
                paused = self.control.is_paused(),
                "loop_metrics"
            );
        }

        Ok(Iteration::Ticked(outcome))
    }
}
