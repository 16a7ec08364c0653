use thiserror::Error;

pub mod app;
pub mod config;
pub mod platform;

pub use app::{
    find_compatible_mode, BackBufferFormat, ControllerButton, ControllerState, DeviceBackend,
    DeviceCaps, DeviceHealth, DeviceResources, DeviceSurface, DispatchContext, DisplayMode,
    FrameClock, FrameOutcome, FramePacing, Game, GameLoop, HealthCheck, InputDevice, InputState,
    Iteration, LoopControl, LoopMetricsSnapshot, MessagePump, MetricsHandle, PerformanceCounter,
    PresentConfig, PresentInterval, RenderCycle, StatusCode, SurfaceSettings, SwapEffect,
    TickResult, TimeSource, VertexProcessing, Vibration, DEFAULT_LOST_DEVICE_BACKOFF,
    MAX_CONTROLLERS,
};
pub use config::{load_config, ConfigError, EngineConfig, CONFIG_ENV_VAR, TARGET_FPS_ENV_VAR};
pub use platform::{
    run_app, run_app_with_metrics, AppError, HostMessage, PixelsBackend, PixelsStatus,
    PlatformError, WinitPump,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Fatal,
    Warning,
}

/// Unrecoverable problems found while bringing up the timer or the render device.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("high resolution timer is unavailable (counter frequency is zero)")]
    TimerUnavailable,
    #[error("failed to initialize graphics backend: {detail}")]
    BackendInit { detail: String },
    #[error(
        "the graphics device does not support {width}x{height} at {refresh_rate_hz} Hz or better \
in {format:?}"
    )]
    IncompatibleDisplayMode {
        width: u32,
        height: u32,
        refresh_rate_hz: u32,
        format: BackBufferFormat,
    },
    #[error("failed to create graphics device: {detail}")]
    DeviceCreation { detail: String },
}

impl SetupError {
    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Fatal
    }
}
