use std::sync::Arc;

use pixels::wgpu;
use pixels::{Pixels, PixelsBuilder, SurfaceTexture};
use tracing::{debug, info, warn};
use winit::window::{Fullscreen, Window};

use crate::app::{
    BackBufferFormat, DeviceBackend, DeviceCaps, DeviceHealth, DisplayMode, PresentConfig,
    PresentInterval, StatusCode, VertexProcessing,
};

/// Raw status codes reported by [`PixelsBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PixelsStatus {
    Ok,
    /// Nothing to present into (e.g. minimized window); wait.
    DeviceLost,
    /// Surface no longer matches the window; resize it.
    DeviceNotReset,
    NoAdapter,
    NoDevice,
    Driver(String),
}

impl StatusCode for PixelsStatus {
    fn classify(&self) -> DeviceHealth {
        match self {
            PixelsStatus::Ok => DeviceHealth::Healthy,
            PixelsStatus::DeviceLost => DeviceHealth::Lost,
            PixelsStatus::DeviceNotReset => DeviceHealth::LostNotReset,
            PixelsStatus::NoAdapter | PixelsStatus::NoDevice | PixelsStatus::Driver(_) => {
                DeviceHealth::Failed
            }
        }
    }
}

impl From<pixels::Error> for PixelsStatus {
    fn from(error: pixels::Error) -> Self {
        match error {
            pixels::Error::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                PixelsStatus::DeviceNotReset
            }
            pixels::Error::Surface(wgpu::SurfaceError::Timeout) => PixelsStatus::DeviceLost,
            pixels::Error::AdapterNotFound => PixelsStatus::NoAdapter,
            pixels::Error::DeviceNotFound(_) => PixelsStatus::NoDevice,
            other => PixelsStatus::Driver(other.to_string()),
        }
    }
}

/// Software framebuffer presented through `pixels`/`wgpu` into a winit window.
pub struct PixelsBackend {
    window: Arc<Window>,
    pixels: Option<Pixels<'static>>,
    buffer_size: (u32, u32),
    surface_outdated: bool,
    caps: DeviceCaps,
    force_software: bool,
}

impl PixelsBackend {
    pub fn new(window: Arc<Window>, force_software: bool) -> Self {
        Self {
            window,
            pixels: None,
            buffer_size: (0, 0),
            surface_outdated: false,
            caps: DeviceCaps {
                hardware_transform_lighting: false,
                vertex_shader_version: (0, 0),
            },
            force_software,
        }
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// RGBA8 framebuffer of `buffer_size()`; `None` while the device is released.
    pub fn frame_mut(&mut self) -> Option<&mut [u8]> {
        self.pixels.as_mut().map(|pixels| pixels.frame_mut())
    }

    pub fn buffer_size(&self) -> (u32, u32) {
        self.buffer_size
    }

    fn enter_fullscreen(&self, config: &PresentConfig) {
        let Some(monitor) = self.window.current_monitor() else {
            warn!("fullscreen_requested_without_monitor");
            return;
        };
        let refresh_millihertz = config.refresh_rate_hz.saturating_mul(1000);
        let mode = monitor.video_modes().find(|mode| {
            let size = mode.size();
            size.width == config.width
                && size.height == config.height
                && mode.refresh_rate_millihertz() >= refresh_millihertz
        });
        match mode {
            Some(mode) => self.window.set_fullscreen(Some(Fullscreen::Exclusive(mode))),
            None => warn!(
                width = config.width,
                height = config.height,
                "fullscreen_mode_vanished"
            ),
        }
    }
}

impl DeviceBackend for PixelsBackend {
    type Status = PixelsStatus;

    fn initialize(&mut self) -> Result<(), PixelsStatus> {
        let instance = wgpu::Instance::default();
        let adapters = instance.enumerate_adapters(wgpu::Backends::all());
        if adapters.is_empty() {
            return Err(PixelsStatus::NoAdapter);
        }

        let hardware = adapters
            .iter()
            .any(|adapter| adapter.get_info().device_type != wgpu::DeviceType::Cpu);
        self.caps = if hardware && !self.force_software {
            DeviceCaps {
                hardware_transform_lighting: true,
                vertex_shader_version: (3, 0),
            }
        } else {
            DeviceCaps {
                hardware_transform_lighting: false,
                vertex_shader_version: (0, 0),
            }
        };
        debug!(adapters = adapters.len(), hardware, "graphics_adapters_enumerated");
        Ok(())
    }

    fn display_modes(&self, format: BackBufferFormat) -> Vec<DisplayMode> {
        let Some(monitor) = self.window.current_monitor() else {
            return Vec::new();
        };
        let min_bits = format.bits_per_pixel().unwrap_or(0);
        monitor
            .video_modes()
            .filter(|mode| mode.bit_depth() >= min_bits)
            .map(|mode| DisplayMode {
                width: mode.size().width,
                height: mode.size().height,
                refresh_rate_hz: mode.refresh_rate_millihertz() / 1000,
            })
            .collect()
    }

    fn capabilities(&self) -> DeviceCaps {
        self.caps
    }

    fn surface_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    fn create_device(
        &mut self,
        config: &PresentConfig,
        processing: VertexProcessing,
    ) -> Result<(), PixelsStatus> {
        if config.fullscreen {
            self.enter_fullscreen(config);
        }

        let (surface_width, surface_height) = self.surface_size();
        let surface = SurfaceTexture::new(surface_width, surface_height, Arc::clone(&self.window));
        let pixels = PixelsBuilder::new(config.width, config.height, surface)
            .enable_vsync(config.interval == PresentInterval::One)
            .request_adapter_options(wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: processing == VertexProcessing::Software,
                compatible_surface: None,
            })
            .build()?;

        self.pixels = Some(pixels);
        self.buffer_size = (config.width, config.height);
        self.surface_outdated = false;
        Ok(())
    }

    fn query_state(&self) -> PixelsStatus {
        if self.pixels.is_none() {
            return PixelsStatus::NoDevice;
        }
        let (width, height) = self.surface_size();
        if width == 0 || height == 0 {
            return PixelsStatus::DeviceLost;
        }
        if self.surface_outdated || (width, height) != self.buffer_size {
            return PixelsStatus::DeviceNotReset;
        }
        PixelsStatus::Ok
    }

    fn reset(&mut self, config: &PresentConfig) -> PixelsStatus {
        let Some(pixels) = self.pixels.as_mut() else {
            return PixelsStatus::NoDevice;
        };
        if config.width == 0 || config.height == 0 {
            return PixelsStatus::DeviceLost;
        }

        let (surface_width, surface_height) = {
            let size = self.window.inner_size();
            (size.width, size.height)
        };
        if let Err(error) = pixels.resize_surface(surface_width, surface_height) {
            return PixelsStatus::Driver(error.to_string());
        }
        if let Err(error) = pixels.resize_buffer(config.width, config.height) {
            return PixelsStatus::Driver(error.to_string());
        }

        self.buffer_size = (config.width, config.height);
        self.surface_outdated = false;
        info!(width = config.width, height = config.height, "surface_resized");
        PixelsStatus::Ok
    }

    fn begin_scene(&mut self) -> PixelsStatus {
        match self.pixels.as_mut() {
            Some(pixels) => {
                pixels.frame_mut().fill(0);
                PixelsStatus::Ok
            }
            None => PixelsStatus::NoDevice,
        }
    }

    fn end_scene(&mut self) -> PixelsStatus {
        PixelsStatus::Ok
    }

    fn present(&mut self) -> PixelsStatus {
        let Some(pixels) = self.pixels.as_mut() else {
            return PixelsStatus::NoDevice;
        };
        match pixels.render() {
            Ok(()) => PixelsStatus::Ok,
            Err(error) => {
                let status = PixelsStatus::from(error);
                if status == PixelsStatus::DeviceNotReset {
                    self.surface_outdated = true;
                }
                status
            }
        }
    }

    fn release(&mut self) {
        if self.pixels.take().is_some() {
            debug!("graphics_device_released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_classify_into_health_states() {
        assert_eq!(PixelsStatus::Ok.classify(), DeviceHealth::Healthy);
        assert_eq!(PixelsStatus::DeviceLost.classify(), DeviceHealth::Lost);
        assert_eq!(
            PixelsStatus::DeviceNotReset.classify(),
            DeviceHealth::LostNotReset
        );
        assert_eq!(PixelsStatus::NoAdapter.classify(), DeviceHealth::Failed);
        assert_eq!(
            PixelsStatus::Driver("validation".to_string()).classify(),
            DeviceHealth::Failed
        );
    }

    #[test]
    fn surface_errors_map_to_lost_states() {
        let outdated = PixelsStatus::from(pixels::Error::Surface(wgpu::SurfaceError::Outdated));
        let lost = PixelsStatus::from(pixels::Error::Surface(wgpu::SurfaceError::Lost));
        let timeout = PixelsStatus::from(pixels::Error::Surface(wgpu::SurfaceError::Timeout));
        let oom = PixelsStatus::from(pixels::Error::Surface(wgpu::SurfaceError::OutOfMemory));

        assert_eq!(outdated, PixelsStatus::DeviceNotReset);
        assert_eq!(lost, PixelsStatus::DeviceNotReset);
        assert_eq!(timeout, PixelsStatus::DeviceLost);
        assert_eq!(oom.classify(), DeviceHealth::Failed);
    }
}
