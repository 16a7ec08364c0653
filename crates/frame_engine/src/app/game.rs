use super::device::{DeviceBackend, DeviceResources};
use super::input::InputDevice;

/// Callbacks a concrete game provides to the loop.
///
/// `update`, `ai` and `collisions` run in that order and only while unpaused.
/// `render` runs every tick the device allows it, after the simulation for the
/// same tick. Errors are returned to whoever called `GameLoop::run`.
pub trait Game: DeviceResources {
    type Backend: DeviceBackend;
    type Input: InputDevice;

    fn update(&mut self, frame_time: f32, input: &mut Self::Input) -> Result<(), Self::Error>;
    fn ai(&mut self) -> Result<(), Self::Error>;
    fn collisions(&mut self) -> Result<(), Self::Error>;
    fn render(&mut self, device: &mut Self::Backend) -> Result<(), Self::Error>;
}
