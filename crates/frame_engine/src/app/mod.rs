mod clock;
mod device;
mod game;
mod input;
mod loop_runner;
mod metrics;
mod render_cycle;
#[cfg(test)]
pub(crate) mod test_support;

pub use clock::{FrameClock, FramePacing, PerformanceCounter, TickResult, TimeSource};
pub use device::{
    find_compatible_mode, BackBufferFormat, DeviceBackend, DeviceCaps, DeviceHealth,
    DeviceResources, DeviceSurface, DisplayMode, HealthCheck, PresentConfig, PresentInterval,
    StatusCode, SurfaceSettings, SwapEffect, VertexProcessing, DEFAULT_LOST_DEVICE_BACKOFF,
};
pub use game::Game;
pub use input::{ControllerButton, ControllerState, InputDevice, InputState, Vibration, MAX_CONTROLLERS};
pub use loop_runner::{DispatchContext, GameLoop, Iteration, LoopControl, MessagePump};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use render_cycle::{FrameOutcome, RenderCycle};
