//! Scripted doubles for the timer, backend, host game, input and message pump.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use thiserror::Error;

use super::clock::TimeSource;
use super::device::{
    BackBufferFormat, DeviceBackend, DeviceCaps, DeviceHealth, DeviceResources, DisplayMode,
    PresentConfig, StatusCode, VertexProcessing,
};
use super::game::Game;
use super::input::InputDevice;
use super::loop_runner::{DispatchContext, MessagePump};

#[derive(Debug)]
struct ManualClockState {
    now: Cell<u64>,
    advance_per_read: Cell<u64>,
    sleeps: RefCell<Vec<Duration>>,
}

/// Counter under test control. Clones share the same state.
#[derive(Debug, Clone)]
pub(crate) struct ManualTimeSource {
    frequency: u64,
    state: Rc<ManualClockState>,
}

impl ManualTimeSource {
    pub(crate) fn new(frequency: u64) -> Self {
        Self {
            frequency,
            state: Rc::new(ManualClockState {
                now: Cell::new(0),
                advance_per_read: Cell::new(0),
                sleeps: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Every `now()` read moves the counter forward by `seconds` first.
    pub(crate) fn advancing_by(self, seconds: f64) -> Self {
        self.state.advance_per_read.set(self.ticks(seconds));
        self
    }

    pub(crate) fn set_seconds(&self, seconds: f64) {
        self.state.now.set(self.ticks(seconds));
    }

    pub(crate) fn sleeps(&self) -> Vec<Duration> {
        self.state.sleeps.borrow().clone()
    }

    fn ticks(&self, seconds: f64) -> u64 {
        (seconds * self.frequency as f64).round() as u64
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> u64 {
        let next = self.state.now.get() + self.state.advance_per_read.get();
        self.state.now.set(next);
        next
    }

    fn frequency(&self) -> u64 {
        self.frequency
    }

    fn sleep(&self, duration: Duration) {
        self.state.sleeps.borrow_mut().push(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScriptedStatus {
    Ok,
    Lost,
    NotReset,
    Error,
}

impl StatusCode for ScriptedStatus {
    fn classify(&self) -> DeviceHealth {
        match self {
            ScriptedStatus::Ok => DeviceHealth::Healthy,
            ScriptedStatus::Lost => DeviceHealth::Lost,
            ScriptedStatus::NotReset => DeviceHealth::LostNotReset,
            ScriptedStatus::Error => DeviceHealth::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BackendCall {
    Initialize,
    CreateDevice,
    QueryState,
    Reset,
    BeginScene,
    EndScene,
    Present,
    Release,
}

#[derive(Debug, Default)]
struct BackendLogState {
    calls: Vec<BackendCall>,
    yields: Vec<Duration>,
    reset_configs: Vec<PresentConfig>,
}

/// Read side of a [`ScriptedBackend`]'s call log; survives the backend being dropped.
#[derive(Debug, Clone, Default)]
pub(crate) struct BackendLog {
    state: Rc<RefCell<BackendLogState>>,
}

impl BackendLog {
    pub(crate) fn calls(&self) -> Vec<BackendCall> {
        self.state.borrow().calls.clone()
    }

    pub(crate) fn count(&self, call: BackendCall) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|logged| **logged == call)
            .count()
    }

    pub(crate) fn yields(&self) -> Vec<Duration> {
        self.state.borrow().yields.clone()
    }

    pub(crate) fn last_reset_config(&self) -> Option<PresentConfig> {
        self.state.borrow().reset_configs.last().cloned()
    }

    fn push(&self, call: BackendCall) {
        self.state.borrow_mut().calls.push(call);
    }
}

/// Backend whose status codes come from per-operation queues. An empty queue answers `Ok`.
#[derive(Debug)]
pub(crate) struct ScriptedBackend {
    log: BackendLog,
    fail_initialize: bool,
    fail_create: bool,
    modes: Vec<DisplayMode>,
    caps: DeviceCaps,
    surface_size: (u32, u32),
    states: RefCell<VecDeque<ScriptedStatus>>,
    resets: VecDeque<ScriptedStatus>,
    begins: VecDeque<ScriptedStatus>,
    presents: VecDeque<ScriptedStatus>,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        Self {
            log: BackendLog::default(),
            fail_initialize: false,
            fail_create: false,
            modes: Vec::new(),
            caps: DeviceCaps {
                hardware_transform_lighting: true,
                vertex_shader_version: (2, 0),
            },
            surface_size: (640, 480),
            states: RefCell::new(VecDeque::new()),
            resets: VecDeque::new(),
            begins: VecDeque::new(),
            presents: VecDeque::new(),
        }
    }

    pub(crate) fn failing_initialize(mut self) -> Self {
        self.fail_initialize = true;
        self
    }

    pub(crate) fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub(crate) fn with_modes(mut self, modes: Vec<DisplayMode>) -> Self {
        self.modes = modes;
        self
    }

    pub(crate) fn with_caps(mut self, caps: DeviceCaps) -> Self {
        self.caps = caps;
        self
    }

    pub(crate) fn with_states(self, states: impl IntoIterator<Item = ScriptedStatus>) -> Self {
        self.states.borrow_mut().extend(states);
        self
    }

    pub(crate) fn with_resets(mut self, resets: impl IntoIterator<Item = ScriptedStatus>) -> Self {
        self.resets.extend(resets);
        self
    }

    pub(crate) fn with_begins(mut self, begins: impl IntoIterator<Item = ScriptedStatus>) -> Self {
        self.begins.extend(begins);
        self
    }

    pub(crate) fn with_presents(
        mut self,
        presents: impl IntoIterator<Item = ScriptedStatus>,
    ) -> Self {
        self.presents.extend(presents);
        self
    }

    pub(crate) fn set_surface_size(&mut self, width: u32, height: u32) {
        self.surface_size = (width, height);
    }

    pub(crate) fn log(&self) -> BackendLog {
        self.log.clone()
    }
}

impl DeviceBackend for ScriptedBackend {
    type Status = ScriptedStatus;

    fn initialize(&mut self) -> Result<(), ScriptedStatus> {
        self.log.push(BackendCall::Initialize);
        if self.fail_initialize {
            return Err(ScriptedStatus::Error);
        }
        Ok(())
    }

    fn display_modes(&self, _format: BackBufferFormat) -> Vec<DisplayMode> {
        self.modes.clone()
    }

    fn capabilities(&self) -> DeviceCaps {
        self.caps
    }

    fn surface_size(&self) -> (u32, u32) {
        self.surface_size
    }

    fn create_device(
        &mut self,
        _config: &PresentConfig,
        _processing: VertexProcessing,
    ) -> Result<(), ScriptedStatus> {
        self.log.push(BackendCall::CreateDevice);
        if self.fail_create {
            return Err(ScriptedStatus::Error);
        }
        Ok(())
    }

    fn query_state(&self) -> ScriptedStatus {
        self.log.push(BackendCall::QueryState);
        self.states
            .borrow_mut()
            .pop_front()
            .unwrap_or(ScriptedStatus::Ok)
    }

    fn reset(&mut self, config: &PresentConfig) -> ScriptedStatus {
        self.log.push(BackendCall::Reset);
        self.log
            .state
            .borrow_mut()
            .reset_configs
            .push(config.clone());
        self.resets.pop_front().unwrap_or(ScriptedStatus::Ok)
    }

    fn begin_scene(&mut self) -> ScriptedStatus {
        self.log.push(BackendCall::BeginScene);
        self.begins.pop_front().unwrap_or(ScriptedStatus::Ok)
    }

    fn end_scene(&mut self) -> ScriptedStatus {
        self.log.push(BackendCall::EndScene);
        ScriptedStatus::Ok
    }

    fn present(&mut self) -> ScriptedStatus {
        self.log.push(BackendCall::Present);
        self.presents.pop_front().unwrap_or(ScriptedStatus::Ok)
    }

    fn release(&mut self) {
        self.log.push(BackendCall::Release);
    }

    fn yield_while_lost(&self, duration: Duration) {
        self.log.state.borrow_mut().yields.push(duration);
    }
}

/// Everything a host observes, in the order it observed it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum HostEvent {
    Update(f32),
    Ai,
    Collisions,
    Render,
    Release,
    Reset,
    ReadControllers,
    Vibrate(f32),
    ClearPressed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub(crate) struct TestError(pub &'static str);

#[derive(Debug, Default)]
pub(crate) struct RecordingResources {
    pub(crate) events: Vec<HostEvent>,
    pub(crate) fail_release: bool,
}

impl DeviceResources for RecordingResources {
    type Error = TestError;

    fn on_device_release(&mut self) -> Result<(), TestError> {
        if self.fail_release {
            return Err(TestError("release failed"));
        }
        self.events.push(HostEvent::Release);
        Ok(())
    }

    fn on_device_reset(&mut self) -> Result<(), TestError> {
        self.events.push(HostEvent::Reset);
        Ok(())
    }
}

type EventLog = Rc<RefCell<Vec<HostEvent>>>;

#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingInput {
    events: EventLog,
    pub(crate) key_presses: u32,
}

impl InputDevice for RecordingInput {
    fn read_controllers(&mut self) {
        self.events.borrow_mut().push(HostEvent::ReadControllers);
    }

    fn vibrate_controllers(&mut self, frame_time: f32) {
        self.events.borrow_mut().push(HostEvent::Vibrate(frame_time));
    }

    fn clear_pressed(&mut self) {
        self.events.borrow_mut().push(HostEvent::ClearPressed);
    }
}

/// Host game that records every callback into a log shared with its input.
#[derive(Debug, Default)]
pub(crate) struct RecordingGame {
    events: EventLog,
    fail_update: bool,
    fail_render: bool,
}

impl RecordingGame {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_update(mut self) -> Self {
        self.fail_update = true;
        self
    }

    pub(crate) fn failing_render(mut self) -> Self {
        self.fail_render = true;
        self
    }

    pub(crate) fn input(&self) -> RecordingInput {
        RecordingInput {
            events: Rc::clone(&self.events),
            key_presses: 0,
        }
    }

    pub(crate) fn events(&self) -> Vec<HostEvent> {
        self.events.borrow().clone()
    }

    fn record(&self, event: HostEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl DeviceResources for RecordingGame {
    type Error = TestError;

    fn on_device_release(&mut self) -> Result<(), TestError> {
        self.record(HostEvent::Release);
        Ok(())
    }

    fn on_device_reset(&mut self) -> Result<(), TestError> {
        self.record(HostEvent::Reset);
        Ok(())
    }
}

impl Game for RecordingGame {
    type Backend = ScriptedBackend;
    type Input = RecordingInput;

    fn update(&mut self, frame_time: f32, _input: &mut RecordingInput) -> Result<(), TestError> {
        if self.fail_update {
            return Err(TestError("update failed"));
        }
        self.record(HostEvent::Update(frame_time));
        Ok(())
    }

    fn ai(&mut self) -> Result<(), TestError> {
        self.record(HostEvent::Ai);
        Ok(())
    }

    fn collisions(&mut self) -> Result<(), TestError> {
        self.record(HostEvent::Collisions);
        Ok(())
    }

    fn render(&mut self, _device: &mut ScriptedBackend) -> Result<(), TestError> {
        if self.fail_render {
            return Err(TestError("render failed"));
        }
        self.record(HostEvent::Render);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TestMessage {
    KeyPress,
    Pause,
    Resume,
    Quit(i32),
}

/// Replays one script entry per `peek_message`; `None` means nothing pending.
/// Once the script runs out it posts `Quit(0)` so `run` terminates.
#[derive(Debug)]
pub(crate) struct ScriptedPump {
    script: VecDeque<Option<TestMessage>>,
    dispatched: Vec<TestMessage>,
}

impl ScriptedPump {
    pub(crate) fn new(script: impl IntoIterator<Item = Option<TestMessage>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            dispatched: Vec::new(),
        }
    }

    pub(crate) fn dispatched(&self) -> Vec<TestMessage> {
        self.dispatched.clone()
    }
}

impl MessagePump<RecordingInput> for ScriptedPump {
    type Message = TestMessage;

    fn peek_message(&mut self) -> Option<TestMessage> {
        match self.script.pop_front() {
            Some(entry) => entry,
            None => Some(TestMessage::Quit(0)),
        }
    }

    fn shutdown_code(&self, message: &TestMessage) -> Option<i32> {
        match message {
            TestMessage::Quit(code) => Some(*code),
            _ => None,
        }
    }

    fn dispatch(&mut self, message: TestMessage, context: DispatchContext<'_, RecordingInput>) {
        match message {
            TestMessage::KeyPress => context.input.key_presses += 1,
            TestMessage::Pause => context.control.set_paused(true),
            TestMessage::Resume => context.control.set_paused(false),
            TestMessage::Quit(_) => {}
        }
        self.dispatched.push(message);
    }
}
