use std::fmt;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::SetupError;

pub const DEFAULT_LOST_DEVICE_BACKOFF: Duration = Duration::from_millis(100);

/// Closed set of states the core tracks for the render device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceHealth {
    Healthy,
    /// Lost and not yet resettable; wait.
    Lost,
    /// Lost but resettable now.
    LostNotReset,
    Failed,
}

/// Backend-specific status code. Classified into [`DeviceHealth`] as soon as it is received.
pub trait StatusCode: fmt::Debug {
    fn classify(&self) -> DeviceHealth;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackBufferFormat {
    /// Whatever the desktop is using; windowed mode only.
    Desktop,
    X8R8G8B8,
}

impl BackBufferFormat {
    pub fn bits_per_pixel(self) -> Option<u16> {
        match self {
            BackBufferFormat::Desktop => None,
            BackBufferFormat::X8R8G8B8 => Some(24),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapEffect {
    Discard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentInterval {
    Immediate,
    /// Wait for one vertical blank.
    One,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexProcessing {
    Hardware,
    Software,
}

/// What the application asked for. Presentation configuration is always derived from this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSettings {
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
    /// Minimum fullscreen refresh rate; 0 accepts any.
    pub refresh_rate_hz: u32,
    pub vsync: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentConfig {
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
    pub back_buffer_format: BackBufferFormat,
    pub back_buffer_count: u32,
    pub swap_effect: SwapEffect,
    pub interval: PresentInterval,
    /// 0 in windowed mode.
    pub refresh_rate_hz: u32,
}

impl PresentConfig {
    /// Builds a complete configuration. There is no partial update path on purpose:
    /// create and reset both go through here.
    pub fn build(settings: &SurfaceSettings, fullscreen_refresh_hz: u32) -> Self {
        let back_buffer_format = if settings.fullscreen {
            BackBufferFormat::X8R8G8B8
        } else {
            BackBufferFormat::Desktop
        };
        let interval = if settings.vsync {
            PresentInterval::One
        } else {
            PresentInterval::Immediate
        };

        Self {
            width: settings.width,
            height: settings.height,
            fullscreen: settings.fullscreen,
            back_buffer_format,
            back_buffer_count: 1,
            swap_effect: SwapEffect::Discard,
            interval,
            refresh_rate_hz: if settings.fullscreen {
                fullscreen_refresh_hz
            } else {
                0
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayMode {
    pub width: u32,
    pub height: u32,
    pub refresh_rate_hz: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCaps {
    pub hardware_transform_lighting: bool,
    pub vertex_shader_version: (u8, u8),
}

impl DeviceCaps {
    pub fn vertex_processing(&self) -> VertexProcessing {
        if self.hardware_transform_lighting && self.vertex_shader_version >= (1, 1) {
            VertexProcessing::Hardware
        } else {
            VertexProcessing::Software
        }
    }
}

/// First mode with the exact size and a refresh rate at or above the request.
pub fn find_compatible_mode(
    modes: &[DisplayMode],
    width: u32,
    height: u32,
    min_refresh_hz: u32,
) -> Option<DisplayMode> {
    modes
        .iter()
        .copied()
        .find(|mode| {
            mode.width == width && mode.height == height && mode.refresh_rate_hz >= min_refresh_hz
        })
}

/// The graphics API underneath a [`DeviceSurface`].
pub trait DeviceBackend {
    type Status: StatusCode;

    /// Brings up the API itself. Runs once, before anything else.
    fn initialize(&mut self) -> Result<(), Self::Status>;
    fn display_modes(&self, format: BackBufferFormat) -> Vec<DisplayMode>;
    fn capabilities(&self) -> DeviceCaps;
    /// Current size of the window the surface presents into.
    fn surface_size(&self) -> (u32, u32);
    fn create_device(
        &mut self,
        config: &PresentConfig,
        processing: VertexProcessing,
    ) -> Result<(), Self::Status>;
    fn query_state(&self) -> Self::Status;
    fn reset(&mut self, config: &PresentConfig) -> Self::Status;
    fn begin_scene(&mut self) -> Self::Status;
    fn end_scene(&mut self) -> Self::Status;
    fn present(&mut self) -> Self::Status;
    fn release(&mut self);

    fn yield_while_lost(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Host hooks for resources that live in device memory.
pub trait DeviceResources {
    type Error;

    /// Drop everything that must not survive a reset.
    fn on_device_release(&mut self) -> Result<(), Self::Error>;
    /// Recreate what `on_device_release` dropped.
    fn on_device_reset(&mut self) -> Result<(), Self::Error>;
}

/// Result of one health evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthCheck {
    Ready,
    /// Lost and not resettable yet; the CPU was yielded.
    Waiting,
    /// Reset attempted and refused; resources stay released.
    ResetFailed,
    /// Released, reset, and recreated this tick.
    Restored,
    Failed,
}

impl HealthCheck {
    pub fn health(self) -> DeviceHealth {
        match self {
            HealthCheck::Ready | HealthCheck::Restored => DeviceHealth::Healthy,
            HealthCheck::Waiting => DeviceHealth::Lost,
            HealthCheck::ResetFailed => DeviceHealth::LostNotReset,
            HealthCheck::Failed => DeviceHealth::Failed,
        }
    }
}

pub struct DeviceSurface<B: DeviceBackend> {
    backend: B,
    settings: SurfaceSettings,
    config: PresentConfig,
    fullscreen_refresh_hz: u32,
    processing: VertexProcessing,
    health: DeviceHealth,
    resources_released: bool,
    lost_backoff: Duration,
    recoveries: u64,
}

impl<B: DeviceBackend> DeviceSurface<B> {
    pub fn initialize(mut backend: B, settings: SurfaceSettings) -> Result<Self, SetupError> {
        backend
            .initialize()
            .map_err(|status| SetupError::BackendInit {
                detail: format!("{status:?}"),
            })?;

        let mut fullscreen_refresh_hz = 0;
        if settings.fullscreen {
            let format = PresentConfig::build(&settings, 0).back_buffer_format;
            let modes = backend.display_modes(format);
            let mode = find_compatible_mode(
                &modes,
                settings.width,
                settings.height,
                settings.refresh_rate_hz,
            )
            .ok_or(SetupError::IncompatibleDisplayMode {
                width: settings.width,
                height: settings.height,
                refresh_rate_hz: settings.refresh_rate_hz,
                format,
            })?;
            fullscreen_refresh_hz = mode.refresh_rate_hz;
        }

        let config = PresentConfig::build(&settings, fullscreen_refresh_hz);
        let processing = backend.capabilities().vertex_processing();
        backend
            .create_device(&config, processing)
            .map_err(|status| SetupError::DeviceCreation {
                detail: format!("{status:?}"),
            })?;

        info!(
            width = config.width,
            height = config.height,
            fullscreen = config.fullscreen,
            refresh_rate_hz = config.refresh_rate_hz,
            processing = ?processing,
            interval = ?config.interval,
            "device_created"
        );

        Ok(Self {
            backend,
            settings,
            config,
            fullscreen_refresh_hz,
            processing,
            health: DeviceHealth::Healthy,
            resources_released: false,
            lost_backoff: DEFAULT_LOST_DEVICE_BACKOFF,
            recoveries: 0,
        })
    }

    pub fn with_lost_backoff(mut self, backoff: Duration) -> Self {
        self.lost_backoff = backoff;
        self
    }

    pub fn health(&self) -> DeviceHealth {
        self.health
    }

    pub fn config(&self) -> &PresentConfig {
        &self.config
    }

    pub fn settings(&self) -> &SurfaceSettings {
        &self.settings
    }

    pub fn vertex_processing(&self) -> VertexProcessing {
        self.processing
    }

    /// Completed release/reset/recreate cycles.
    pub fn recoveries(&self) -> u64 {
        self.recoveries
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Healthy, with every host resource released during a loss recreated.
    pub fn is_drawable(&self) -> bool {
        self.health == DeviceHealth::Healthy && !self.resources_released
    }

    pub fn begin_scene(&mut self) -> DeviceHealth {
        self.backend.begin_scene().classify()
    }

    pub fn end_scene(&mut self) -> DeviceHealth {
        self.backend.end_scene().classify()
    }

    pub fn present(&mut self) -> B::Status {
        self.backend.present()
    }

    /// Folds a status seen outside the health check (e.g. from present) into the
    /// tracked state. Recovery itself waits for the next health check.
    pub fn record_status(&mut self, status: &B::Status) -> DeviceHealth {
        let observed = status.classify();
        if observed != DeviceHealth::Healthy {
            debug!(status = ?status, health = ?observed, "device_status_reported");
        }
        self.transition(observed);
        observed
    }

    /// Queries the device and runs whatever recovery its state allows.
    pub fn check_health<R>(&mut self, resources: &mut R) -> Result<HealthCheck, R::Error>
    where
        R: DeviceResources + ?Sized,
    {
        let status = self.backend.query_state();
        match status.classify() {
            DeviceHealth::Healthy if self.resources_released => {
                // Came back without a successful reset of ours; the host still has to recreate.
                resources.on_device_reset()?;
                self.finish_recovery();
                Ok(HealthCheck::Restored)
            }
            DeviceHealth::Healthy => {
                self.transition(DeviceHealth::Healthy);
                Ok(HealthCheck::Ready)
            }
            DeviceHealth::Lost => {
                self.transition(DeviceHealth::Lost);
                self.backend.yield_while_lost(self.lost_backoff);
                Ok(HealthCheck::Waiting)
            }
            DeviceHealth::LostNotReset => {
                self.transition(DeviceHealth::LostNotReset);
                self.recover(resources)
            }
            DeviceHealth::Failed => {
                if self.health != DeviceHealth::Failed {
                    warn!(status = ?status, "device_failed");
                }
                self.transition(DeviceHealth::Failed);
                Ok(HealthCheck::Failed)
            }
        }
    }

    fn recover<R>(&mut self, resources: &mut R) -> Result<HealthCheck, R::Error>
    where
        R: DeviceResources + ?Sized,
    {
        if !self.resources_released {
            resources.on_device_release()?;
            self.resources_released = true;
        }

        let status = self.reset_device();
        if status.classify() != DeviceHealth::Healthy {
            debug!(status = ?status, "device_reset_failed");
            return Ok(HealthCheck::ResetFailed);
        }

        resources.on_device_reset()?;
        self.finish_recovery();
        Ok(HealthCheck::Restored)
    }

    fn finish_recovery(&mut self) {
        self.resources_released = false;
        self.recoveries = self.recoveries.saturating_add(1);
        self.transition(DeviceHealth::Healthy);
        info!(
            width = self.config.width,
            height = self.config.height,
            recoveries = self.recoveries,
            "device_restored"
        );
    }

    fn reset_device(&mut self) -> B::Status {
        let (width, height) = self.backend.surface_size();
        self.settings.width = width;
        self.settings.height = height;
        self.config = PresentConfig::build(&self.settings, self.fullscreen_refresh_hz);
        self.backend.reset(&self.config)
    }

    fn transition(&mut self, next: DeviceHealth) {
        if next == self.health {
            return;
        }
        match next {
            DeviceHealth::Healthy => info!(from = ?self.health, "device_healthy"),
            DeviceHealth::Lost => warn!(from = ?self.health, "device_lost"),
            DeviceHealth::LostNotReset => warn!(from = ?self.health, "device_needs_reset"),
            DeviceHealth::Failed => {}
        }
        self.health = next;
    }
}

impl<B: DeviceBackend> Drop for DeviceSurface<B> {
    fn drop(&mut self) {
        self.backend.release();
    }
}
