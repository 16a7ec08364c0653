use tracing::debug;

use super::device::{DeviceHealth, DeviceSurface, HealthCheck};
use super::game::Game;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The host's frame reached the display.
    Presented,
    /// The host's frame did not reach the display; carries the device state after the tick.
    Skipped(DeviceHealth),
}

/// Runs begin → draw → end → health check → present for one tick.
#[derive(Debug, Default)]
pub struct RenderCycle {
    frames_presented: u64,
    frames_skipped: u64,
}

impl RenderCycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render_frame<G>(
        &mut self,
        surface: &mut DeviceSurface<G::Backend>,
        game: &mut G,
    ) -> Result<FrameOutcome, G::Error>
    where
        G: Game + ?Sized,
    {
        // Never hand an unusable device, or one whose host resources are released, to the host.
        let mut drawn = false;
        if surface.is_drawable() {
            if surface.begin_scene() == DeviceHealth::Healthy {
                game.render(surface.backend_mut())?;
                let end = surface.end_scene();
                if end != DeviceHealth::Healthy {
                    debug!(health = ?end, "end_scene_reported");
                }
                drawn = true;
            } else {
                debug!("begin_scene_refused");
            }
        }

        // Present whenever the check leaves the device healthy, drawn or not. A lost or
        // failed device is left untouched.
        let check = surface.check_health(game)?;
        if check.health() != DeviceHealth::Healthy {
            self.frames_skipped = self.frames_skipped.saturating_add(1);
            return Ok(FrameOutcome::Skipped(check.health()));
        }

        let status = surface.present();
        let health = surface.record_status(&status);
        if !drawn || check != HealthCheck::Ready || health != DeviceHealth::Healthy {
            self.frames_skipped = self.frames_skipped.saturating_add(1);
            return Ok(FrameOutcome::Skipped(health));
        }

        self.frames_presented = self.frames_presented.saturating_add(1);
        Ok(FrameOutcome::Presented)
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped
    }
}
