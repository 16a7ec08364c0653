//! winit window, message pump and `pixels` device backend wired into [`GameLoop`].

mod pixels_backend;
mod winit_pump;

use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event_loop::EventLoop;
use winit::window::WindowBuilder;

use crate::app::{
    DeviceSurface, FrameClock, Game, GameLoop, InputState, MetricsHandle, PerformanceCounter,
};
use crate::config::{ConfigError, EngineConfig};
use crate::{ErrorSeverity, SetupError};

pub use pixels_backend::{PixelsBackend, PixelsStatus};
pub use winit_pump::{HostMessage, WinitPump};

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error("game callback failed: {0}")]
    Game(#[source] Box<dyn StdError + Send + Sync>),
}

impl AppError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AppError::Config(error) => error.severity(),
            AppError::Setup(error) => error.severity(),
            AppError::Platform(_) | AppError::Game(_) => ErrorSeverity::Fatal,
        }
    }
}

/// Opens the window, brings up the device and runs `game` until it quits.
/// Returns the exit code carried by the quit message.
pub fn run_app<G>(config: &EngineConfig, game: &mut G) -> Result<i32, AppError>
where
    G: Game<Backend = PixelsBackend, Input = InputState>,
    G::Error: StdError + Send + Sync + 'static,
{
    run_app_with_metrics(config, game, MetricsHandle::default())
}

pub fn run_app_with_metrics<G>(
    config: &EngineConfig,
    game: &mut G,
    metrics_handle: MetricsHandle,
) -> Result<i32, AppError>
where
    G: Game<Backend = PixelsBackend, Input = InputState>,
    G::Error: StdError + Send + Sync + 'static,
{
    let clock = FrameClock::new(PerformanceCounter::new(), config.pacing())?;

    let event_loop = EventLoop::new().map_err(PlatformError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(config.width as f64, config.height as f64))
            .build(&event_loop)
            .map_err(PlatformError::CreateWindow)?,
    );
    info!(
        title = %config.window_title,
        window_class = %config.window_class,
        width = config.width,
        height = config.height,
        "window_created"
    );

    let backend = PixelsBackend::new(Arc::clone(&window), config.force_software_vertex);
    let mut surface = DeviceSurface::initialize(backend, config.surface_settings())?
        .with_lost_backoff(config.lost_device_backoff());
    let mut pump = WinitPump::new(event_loop, window.id());
    let mut input = InputState::new();
    let mut game_loop =
        GameLoop::new(clock, config.metrics_log_interval()).with_metrics_handle(metrics_handle);

    game_loop
        .run(&mut pump, &mut surface, game, &mut input)
        .map_err(|error| AppError::Game(Box::new(error)))
}
