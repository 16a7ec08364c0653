use std::collections::{HashMap, HashSet};

use gilrs::ff::{BaseEffect, BaseEffectType, Effect, EffectBuilder, Replay, Ticks};
use gilrs::{Axis, Button, EventType, GamepadId, Gilrs};
use tracing::{info, warn};
use winit::event::MouseButton;
use winit::keyboard::KeyCode;

pub const MAX_CONTROLLERS: usize = 4;

/// Per-tick input duties the loop performs on the host's behalf.
pub trait InputDevice {
    fn read_controllers(&mut self);
    /// Counts active vibration down by `frame_time` seconds.
    fn vibrate_controllers(&mut self, frame_time: f32);
    /// Forget edge-triggered state once the tick has consumed it.
    fn clear_pressed(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerButton {
    South,
    East,
    West,
    North,
    Start,
    Select,
    LeftShoulder,
    RightShoulder,
    DPadUp,
    DPadDown,
    DPadLeft,
    DPadRight,
}

const BUTTON_COUNT: usize = 12;

impl ControllerButton {
    const ALL: [ControllerButton; BUTTON_COUNT] = [
        ControllerButton::South,
        ControllerButton::East,
        ControllerButton::West,
        ControllerButton::North,
        ControllerButton::Start,
        ControllerButton::Select,
        ControllerButton::LeftShoulder,
        ControllerButton::RightShoulder,
        ControllerButton::DPadUp,
        ControllerButton::DPadDown,
        ControllerButton::DPadLeft,
        ControllerButton::DPadRight,
    ];

    const fn index(self) -> usize {
        match self {
            ControllerButton::South => 0,
            ControllerButton::East => 1,
            ControllerButton::West => 2,
            ControllerButton::North => 3,
            ControllerButton::Start => 4,
            ControllerButton::Select => 5,
            ControllerButton::LeftShoulder => 6,
            ControllerButton::RightShoulder => 7,
            ControllerButton::DPadUp => 8,
            ControllerButton::DPadDown => 9,
            ControllerButton::DPadLeft => 10,
            ControllerButton::DPadRight => 11,
        }
    }

    const fn gilrs_button(self) -> Button {
        match self {
            ControllerButton::South => Button::South,
            ControllerButton::East => Button::East,
            ControllerButton::West => Button::West,
            ControllerButton::North => Button::North,
            ControllerButton::Start => Button::Start,
            ControllerButton::Select => Button::Select,
            ControllerButton::LeftShoulder => Button::LeftTrigger,
            ControllerButton::RightShoulder => Button::RightTrigger,
            ControllerButton::DPadUp => Button::DPadUp,
            ControllerButton::DPadDown => Button::DPadDown,
            ControllerButton::DPadLeft => Button::DPadLeft,
            ControllerButton::DPadRight => Button::DPadRight,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControllerState {
    pub connected: bool,
    buttons: [bool; BUTTON_COUNT],
    pub left_stick: (f32, f32),
    pub right_stick: (f32, f32),
    pub left_trigger: f32,
    pub right_trigger: f32,
}

impl ControllerState {
    pub fn is_down(&self, button: ControllerButton) -> bool {
        self.buttons[button.index()]
    }

    fn set(&mut self, button: ControllerButton, is_down: bool) {
        self.buttons[button.index()] = is_down;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vibration {
    pub left_motor: u16,
    pub right_motor: u16,
    pub remaining_seconds: f32,
}

impl Vibration {
    pub fn is_active(&self) -> bool {
        self.remaining_seconds > 0.0
    }
}

/// Keyboard, mouse and controller state collected from dispatched messages and polling.
pub struct InputState {
    gilrs: Option<Gilrs>,
    gamepad_to_slot: HashMap<GamepadId, usize>,
    keys_down: HashSet<KeyCode>,
    keys_pressed: HashSet<KeyCode>,
    text_in: String,
    mouse_position: (f64, f64),
    mouse_buttons: HashSet<MouseButton>,
    controllers: [ControllerState; MAX_CONTROLLERS],
    vibrations: [Vibration; MAX_CONTROLLERS],
    rumble_effects: [Option<Effect>; MAX_CONTROLLERS],
}

impl InputState {
    pub fn new() -> Self {
        let gilrs = match Gilrs::new() {
            Ok(gilrs) => Some(gilrs),
            Err(error) => {
                warn!(error = %error, "gamepad_support_unavailable");
                None
            }
        };
        Self::with_gilrs(gilrs)
    }

    /// Keyboard and mouse only.
    pub fn without_gamepads() -> Self {
        Self::with_gilrs(None)
    }

    fn with_gilrs(gilrs: Option<Gilrs>) -> Self {
        // Pads already attached at startup take slots in enumeration order.
        let gamepad_to_slot: HashMap<GamepadId, usize> = gilrs
            .iter()
            .flat_map(|gilrs| gilrs.gamepads().map(|(id, _)| id))
            .take(MAX_CONTROLLERS)
            .enumerate()
            .map(|(slot, id)| (id, slot))
            .collect();
        for (id, slot) in &gamepad_to_slot {
            info!(gamepad = %id, slot, "controller_connected");
        }

        Self {
            gilrs,
            gamepad_to_slot,
            keys_down: HashSet::new(),
            keys_pressed: HashSet::new(),
            text_in: String::new(),
            mouse_position: (0.0, 0.0),
            mouse_buttons: HashSet::new(),
            controllers: [ControllerState::default(); MAX_CONTROLLERS],
            vibrations: [Vibration::default(); MAX_CONTROLLERS],
            rumble_effects: Default::default(),
        }
    }

    pub fn key_down(&mut self, key: KeyCode) {
        if self.keys_down.insert(key) {
            self.keys_pressed.insert(key);
        }
    }

    pub fn key_up(&mut self, key: KeyCode) {
        self.keys_down.remove(&key);
    }

    pub fn key_in(&mut self, text: &str) {
        self.text_in.push_str(text);
    }

    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys_down.contains(&key)
    }

    /// True only on the tick the key went down.
    pub fn was_key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }

    pub fn any_key_pressed(&self) -> bool {
        !self.keys_pressed.is_empty()
    }

    pub fn text_in(&self) -> &str {
        &self.text_in
    }

    pub fn clear_text_in(&mut self) {
        self.text_in.clear();
    }

    pub fn mouse_moved(&mut self, x: f64, y: f64) {
        self.mouse_position = (x, y);
    }

    pub fn mouse_position(&self) -> (f64, f64) {
        self.mouse_position
    }

    pub fn set_mouse_button(&mut self, button: MouseButton, is_down: bool) {
        if is_down {
            self.mouse_buttons.insert(button);
        } else {
            self.mouse_buttons.remove(&button);
        }
    }

    pub fn is_mouse_down(&self, button: MouseButton) -> bool {
        self.mouse_buttons.contains(&button)
    }

    /// Drops held state, e.g. when focus moves to another window.
    pub fn release_all(&mut self) {
        self.keys_down.clear();
        self.mouse_buttons.clear();
    }

    pub fn controller(&self, slot: usize) -> Option<&ControllerState> {
        self.controllers.get(slot)
    }

    pub fn vibration(&self, slot: usize) -> Option<&Vibration> {
        self.vibrations.get(slot)
    }

    /// Runs both motors on `slot` for `seconds`. Ignored for out-of-range slots.
    pub fn vibrate(&mut self, slot: usize, left_motor: u16, right_motor: u16, seconds: f32) {
        if slot >= MAX_CONTROLLERS || seconds <= 0.0 {
            return;
        }
        self.vibrations[slot] = Vibration {
            left_motor,
            right_motor,
            remaining_seconds: seconds,
        };
        self.rumble_effects[slot] = self.start_rumble(slot, left_motor, right_motor, seconds);
    }

    fn start_rumble(
        &mut self,
        slot: usize,
        left_motor: u16,
        right_motor: u16,
        seconds: f32,
    ) -> Option<Effect> {
        let id = self
            .gamepad_to_slot
            .iter()
            .find_map(|(id, mapped)| (*mapped == slot).then_some(*id))?;
        let gilrs = self.gilrs.as_mut()?;
        if !gilrs.gamepad(id).is_ff_supported() {
            return None;
        }

        let scheduling = Replay {
            play_for: Ticks::from_ms((seconds * 1000.0) as u32),
            ..Default::default()
        };
        let effect = EffectBuilder::new()
            .add_effect(BaseEffect {
                kind: BaseEffectType::Strong {
                    magnitude: left_motor,
                },
                scheduling,
                ..Default::default()
            })
            .add_effect(BaseEffect {
                kind: BaseEffectType::Weak {
                    magnitude: right_motor,
                },
                scheduling,
                ..Default::default()
            })
            .gamepads(&[id])
            .finish(gilrs);

        match effect.and_then(|effect| effect.play().map(|()| effect)) {
            Ok(effect) => Some(effect),
            Err(error) => {
                warn!(slot, error = %error, "rumble_failed");
                None
            }
        }
    }

    fn stop_rumble(&mut self, slot: usize) {
        if let Some(effect) = self.rumble_effects[slot].take() {
            if let Err(error) = effect.stop() {
                warn!(slot, error = %error, "rumble_stop_failed");
            }
        }
    }

    fn poll_gamepad_events(&mut self) {
        let Some(gilrs) = self.gilrs.as_mut() else {
            return;
        };
        let events: Vec<_> = std::iter::from_fn(|| gilrs.next_event())
            .map(|event| (event.id, event.event))
            .collect();

        for (id, event) in events {
            match event {
                EventType::Connected if self.gamepad_to_slot.contains_key(&id) => {}
                EventType::Connected => {
                    let free_slot = (0..MAX_CONTROLLERS)
                        .find(|slot| !self.gamepad_to_slot.values().any(|used| used == slot));
                    match free_slot {
                        Some(slot) => {
                            self.gamepad_to_slot.insert(id, slot);
                            info!(gamepad = %id, slot, "controller_connected");
                        }
                        None => warn!(gamepad = %id, "controller_connected_without_free_slot"),
                    }
                }
                EventType::Disconnected => {
                    if let Some(slot) = self.gamepad_to_slot.remove(&id) {
                        info!(gamepad = %id, slot, "controller_disconnected");
                        self.controllers[slot] = ControllerState::default();
                        self.vibrations[slot] = Vibration::default();
                        self.rumble_effects[slot] = None;
                    }
                }
                _ => {}
            }
        }
    }
}

impl Default for InputState {
    fn default() -> Self {
        Self::without_gamepads()
    }
}

impl InputDevice for InputState {
    fn read_controllers(&mut self) {
        self.poll_gamepad_events();
        let Some(gilrs) = self.gilrs.as_ref() else {
            return;
        };

        for (id, slot) in &self.gamepad_to_slot {
            let gamepad = gilrs.gamepad(*id);
            let state = &mut self.controllers[*slot];
            state.connected = gamepad.is_connected();
            for button in ControllerButton::ALL {
                state.set(button, gamepad.is_pressed(button.gilrs_button()));
            }
            state.left_stick = (
                gamepad.value(Axis::LeftStickX),
                gamepad.value(Axis::LeftStickY),
            );
            state.right_stick = (
                gamepad.value(Axis::RightStickX),
                gamepad.value(Axis::RightStickY),
            );
            state.left_trigger = gamepad
                .button_data(Button::LeftTrigger2)
                .map(|data| data.value())
                .unwrap_or(0.0);
            state.right_trigger = gamepad
                .button_data(Button::RightTrigger2)
                .map(|data| data.value())
                .unwrap_or(0.0);
        }
    }

    fn vibrate_controllers(&mut self, frame_time: f32) {
        for slot in 0..MAX_CONTROLLERS {
            if !self.vibrations[slot].is_active() {
                continue;
            }
            self.vibrations[slot].remaining_seconds -= frame_time;
            if !self.vibrations[slot].is_active() {
                self.vibrations[slot] = Vibration::default();
                self.stop_rumble(slot);
            }
        }
    }

    fn clear_pressed(&mut self) {
        self.keys_pressed.clear();
    }
}
