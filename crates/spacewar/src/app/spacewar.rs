use std::f32::consts::TAU;

use frame_engine::{
    ControllerButton, DeviceResources, Game, InputState, PixelsBackend,
};
use thiserror::Error;
use tracing::{debug, info};
use winit::keyboard::KeyCode;

const TURN_RATE: f32 = 3.5;
const THRUST: f32 = 140.0;
const MAX_SPEED: f32 = 260.0;
const GRAVITY: f32 = 400_000.0;
const PLANET_RADIUS: f32 = 36.0;
const SHIP_RADIUS: f32 = 6.0;
const BOUNCE_DAMPING: f32 = 0.6;
const RUMBLE_SECONDS: f32 = 0.3;
const RUMBLE_STRENGTH: u16 = 40_000;
const STICK_DEADZONE: f32 = 0.2;
const HUD_HEIGHT: u32 = 4;
/// Frame time that fills the HUD bar.
const HUD_FULL_SCALE_SECONDS: f32 = 0.1;
const STAR_COUNT: usize = 160;

const PLANET_COLOR: [u8; 4] = [0x3a, 0x7b, 0xd5, 0xff];
const SHIP_COLOR: [u8; 4] = [0xf2, 0xf2, 0xf2, 0xff];
const HUD_COLOR: [u8; 4] = [0x4c, 0xd1, 0x37, 0xff];
const STAR_COLOR: [u8; 4] = [0x90, 0x90, 0xa0, 0xff];

#[derive(Debug, Error)]
pub(crate) enum SpacewarError {
    #[error("framebuffer holds {actual} bytes but a {width}x{height} RGBA frame needs {expected}")]
    FramebufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Ship {
    position: (f32, f32),
    velocity: (f32, f32),
    heading: f32,
}

/// Pre-rendered star layer. Lives in device memory as far as the loop is concerned.
#[derive(Debug)]
struct Starfield {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl Starfield {
    fn generate(width: u32, height: u32) -> Self {
        let mut rgba = vec![0; width as usize * height as usize * 4];
        let mut seed: u32 = 0x9e37_79b9;
        for _ in 0..STAR_COUNT {
            if width == 0 || height == 0 {
                break;
            }
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let x = (seed >> 8) % width;
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let y = (seed >> 8) % height;
            let offset = (y as usize * width as usize + x as usize) * 4;
            rgba[offset..offset + 4].copy_from_slice(&STAR_COLOR);
        }
        Self {
            width,
            height,
            rgba,
        }
    }
}

pub(crate) struct Spacewar {
    world: (f32, f32),
    ship: Ship,
    planet: (f32, f32),
    frame_time: f32,
    bounces: u32,
    pending_rumble: bool,
    background: Option<Starfield>,
    background_size: (u32, u32),
}

impl Spacewar {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        let world = (width.max(1) as f32, height.max(1) as f32);
        Self {
            world,
            ship: Ship {
                position: (world.0 * 0.2, world.1 * 0.5),
                velocity: (0.0, -60.0),
                heading: 0.0,
            },
            planet: (world.0 * 0.5, world.1 * 0.5),
            frame_time: 0.0,
            bounces: 0,
            pending_rumble: false,
            background: Some(Starfield::generate(width, height)),
            background_size: (width, height),
        }
    }

    fn steering(input: &InputState) -> (f32, bool) {
        let mut turn = 0.0;
        if input.is_key_down(KeyCode::ArrowLeft) {
            turn -= 1.0;
        }
        if input.is_key_down(KeyCode::ArrowRight) {
            turn += 1.0;
        }
        let mut thrust = input.is_key_down(KeyCode::ArrowUp);

        if let Some(pad) = input.controller(0).filter(|pad| pad.connected) {
            if pad.left_stick.0.abs() > STICK_DEADZONE {
                turn += pad.left_stick.0;
            }
            if pad.is_down(ControllerButton::DPadLeft) {
                turn -= 1.0;
            }
            if pad.is_down(ControllerButton::DPadRight) {
                turn += 1.0;
            }
            thrust |= pad.is_down(ControllerButton::South) || pad.right_trigger > 0.5;
        }
        (turn.clamp(-1.0, 1.0), thrust)
    }

    fn draw(&mut self, frame: &mut [u8], width: u32, height: u32) -> Result<(), SpacewarError> {
        let expected = width as usize * height as usize * 4;
        if frame.len() != expected {
            return Err(SpacewarError::FramebufferSize {
                width,
                height,
                expected,
                actual: frame.len(),
            });
        }

        if let Some(background) = &self.background {
            if (background.width, background.height) != (width, height) {
                debug!(width, height, "starfield_regenerated");
                self.background = Some(Starfield::generate(width, height));
                self.background_size = (width, height);
            }
        }
        if let Some(background) = &self.background {
            frame.copy_from_slice(&background.rgba);
        }

        let scale = (width as f32 / self.world.0, height as f32 / self.world.1);
        let to_screen = |(x, y): (f32, f32)| (x * scale.0, y * scale.1);

        let planet = to_screen(self.planet);
        fill_circle(frame, width, height, planet, PLANET_RADIUS * scale.0, PLANET_COLOR);

        let ship = to_screen(self.ship.position);
        fill_circle(frame, width, height, ship, SHIP_RADIUS * scale.0, SHIP_COLOR);
        let nose = (
            ship.0 + self.ship.heading.cos() * SHIP_RADIUS * 2.0 * scale.0,
            ship.1 + self.ship.heading.sin() * SHIP_RADIUS * 2.0 * scale.0,
        );
        fill_circle(frame, width, height, nose, 1.5, SHIP_COLOR);

        let fill = (self.frame_time / HUD_FULL_SCALE_SECONDS).clamp(0.0, 1.0);
        let bar_width = (fill * width as f32) as u32;
        for y in 0..HUD_HEIGHT.min(height) {
            for x in 0..bar_width {
                put_pixel(frame, width, height, x as i64, y as i64, HUD_COLOR);
            }
        }
        Ok(())
    }
}

fn put_pixel(frame: &mut [u8], width: u32, height: u32, x: i64, y: i64, color: [u8; 4]) {
    if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
        return;
    }
    let offset = (y as usize * width as usize + x as usize) * 4;
    frame[offset..offset + 4].copy_from_slice(&color);
}

fn fill_circle(
    frame: &mut [u8],
    width: u32,
    height: u32,
    center: (f32, f32),
    radius: f32,
    color: [u8; 4],
) {
    let r = radius.max(0.5);
    let (min_x, max_x) = ((center.0 - r).floor() as i64, (center.0 + r).ceil() as i64);
    let (min_y, max_y) = ((center.1 - r).floor() as i64, (center.1 + r).ceil() as i64);
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let dx = x as f32 + 0.5 - center.0;
            let dy = y as f32 + 0.5 - center.1;
            if dx * dx + dy * dy <= r * r {
                put_pixel(frame, width, height, x, y, color);
            }
        }
    }
}

impl DeviceResources for Spacewar {
    type Error = SpacewarError;

    fn on_device_release(&mut self) -> Result<(), SpacewarError> {
        if self.background.take().is_some() {
            info!("starfield_released");
        }
        Ok(())
    }

    fn on_device_reset(&mut self) -> Result<(), SpacewarError> {
        let (width, height) = self.background_size;
        self.background = Some(Starfield::generate(width, height));
        info!(width, height, "starfield_rebuilt");
        Ok(())
    }
}

impl Game for Spacewar {
    type Backend = PixelsBackend;
    type Input = InputState;

    fn update(&mut self, frame_time: f32, input: &mut InputState) -> Result<(), SpacewarError> {
        self.frame_time = frame_time;
        if self.pending_rumble {
            input.vibrate(0, RUMBLE_STRENGTH, RUMBLE_STRENGTH, RUMBLE_SECONDS);
            self.pending_rumble = false;
        }

        let (turn, thrust) = Self::steering(input);
        let ship = &mut self.ship;
        ship.heading = (ship.heading + turn * TURN_RATE * frame_time).rem_euclid(TAU);
        if thrust {
            ship.velocity.0 += ship.heading.cos() * THRUST * frame_time;
            ship.velocity.1 += ship.heading.sin() * THRUST * frame_time;
        }

        let speed = (ship.velocity.0 * ship.velocity.0 + ship.velocity.1 * ship.velocity.1).sqrt();
        if speed > MAX_SPEED {
            let scale = MAX_SPEED / speed;
            ship.velocity = (ship.velocity.0 * scale, ship.velocity.1 * scale);
        }

        ship.position = (
            (ship.position.0 + ship.velocity.0 * frame_time).rem_euclid(self.world.0),
            (ship.position.1 + ship.velocity.1 * frame_time).rem_euclid(self.world.1),
        );
        Ok(())
    }

    /// The planet pulls the ship in.
    fn ai(&mut self) -> Result<(), SpacewarError> {
        let dx = self.planet.0 - self.ship.position.0;
        let dy = self.planet.1 - self.ship.position.1;
        let distance_sq = (dx * dx + dy * dy).max(PLANET_RADIUS * PLANET_RADIUS);
        let distance = distance_sq.sqrt();
        let pull = GRAVITY / distance_sq * self.frame_time;
        self.ship.velocity.0 += dx / distance * pull;
        self.ship.velocity.1 += dy / distance * pull;
        Ok(())
    }

    fn collisions(&mut self) -> Result<(), SpacewarError> {
        let dx = self.ship.position.0 - self.planet.0;
        let dy = self.ship.position.1 - self.planet.1;
        let distance = (dx * dx + dy * dy).sqrt();
        let contact = PLANET_RADIUS + SHIP_RADIUS;
        if distance >= contact {
            return Ok(());
        }

        let normal = if distance > f32::EPSILON {
            (dx / distance, dy / distance)
        } else {
            (1.0, 0.0)
        };
        self.ship.position = (
            self.planet.0 + normal.0 * contact,
            self.planet.1 + normal.1 * contact,
        );
        let along = self.ship.velocity.0 * normal.0 + self.ship.velocity.1 * normal.1;
        if along < 0.0 {
            self.ship.velocity.0 = (self.ship.velocity.0 - 2.0 * along * normal.0) * BOUNCE_DAMPING;
            self.ship.velocity.1 = (self.ship.velocity.1 - 2.0 * along * normal.1) * BOUNCE_DAMPING;
        }
        self.bounces = self.bounces.saturating_add(1);
        self.pending_rumble = true;
        debug!(bounces = self.bounces, "ship_bounced");
        Ok(())
    }

    fn render(&mut self, device: &mut PixelsBackend) -> Result<(), SpacewarError> {
        let (width, height) = device.buffer_size();
        match device.frame_mut() {
            Some(frame) => self.draw(frame, width, height),
            None => Ok(()),
        }
    }
}
