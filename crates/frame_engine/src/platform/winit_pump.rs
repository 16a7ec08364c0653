use std::collections::VecDeque;
use std::time::Duration;

use tracing::{debug, info};
use winit::event::{ElementState, Event, MouseButton, WindowEvent};
use winit::event_loop::EventLoop;
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::WindowId;

use crate::app::{DispatchContext, InputState, MessagePump};

const PAUSE_KEY: KeyCode = KeyCode::KeyP;
const CLOSE_KEY: KeyCode = KeyCode::Escape;

/// Window messages as the loop sees them.
#[derive(Debug, Clone, PartialEq)]
pub enum HostMessage {
    /// Ends the loop with this exit code.
    Quit(i32),
    CloseRequested,
    KeyDown(KeyCode),
    KeyUp(KeyCode),
    Text(String),
    Focused(bool),
    Resized { width: u32, height: u32 },
    MouseMoved { x: f64, y: f64 },
    MouseButton { button: MouseButton, pressed: bool },
}

/// Non-blocking message source over a winit event loop.
pub struct WinitPump {
    event_loop: EventLoop<()>,
    window_id: WindowId,
    pending: VecDeque<HostMessage>,
    exited: bool,
}

impl WinitPump {
    pub fn new(event_loop: EventLoop<()>, window_id: WindowId) -> Self {
        Self {
            event_loop,
            window_id,
            pending: VecDeque::new(),
            exited: false,
        }
    }

    fn pump(&mut self) {
        let window_id = self.window_id;
        let pending = &mut self.pending;
        let status = self
            .event_loop
            .pump_events(Some(Duration::ZERO), |event, _target| {
                translate_event(window_id, event, pending);
            });
        if let PumpStatus::Exit(code) = status {
            self.exited = true;
            self.pending.push_back(HostMessage::Quit(code));
        }
    }
}

impl MessagePump<InputState> for WinitPump {
    type Message = HostMessage;

    fn peek_message(&mut self) -> Option<HostMessage> {
        if self.pending.is_empty() && !self.exited {
            self.pump();
        }
        self.pending.pop_front()
    }

    fn shutdown_code(&self, message: &HostMessage) -> Option<i32> {
        match message {
            HostMessage::Quit(code) => Some(*code),
            _ => None,
        }
    }

    fn dispatch(&mut self, message: HostMessage, context: DispatchContext<'_, InputState>) {
        apply_message(message, &mut self.pending, context);
    }
}

fn translate_event(window_id: WindowId, event: Event<()>, out: &mut VecDeque<HostMessage>) {
    let Event::WindowEvent {
        window_id: event_window,
        event,
    } = event
    else {
        return;
    };
    if event_window != window_id {
        return;
    }

    match event {
        WindowEvent::CloseRequested => out.push_back(HostMessage::CloseRequested),
        WindowEvent::Focused(focused) => out.push_back(HostMessage::Focused(focused)),
        WindowEvent::Resized(size) => out.push_back(HostMessage::Resized {
            width: size.width,
            height: size.height,
        }),
        WindowEvent::CursorMoved { position, .. } => out.push_back(HostMessage::MouseMoved {
            x: position.x,
            y: position.y,
        }),
        WindowEvent::MouseInput { state, button, .. } => {
            out.push_back(HostMessage::MouseButton {
                button,
                pressed: state == ElementState::Pressed,
            })
        }
        WindowEvent::KeyboardInput { event, .. } => {
            if let PhysicalKey::Code(code) = event.physical_key {
                out.push_back(match event.state {
                    ElementState::Pressed => HostMessage::KeyDown(code),
                    ElementState::Released => HostMessage::KeyUp(code),
                });
            }
            if event.state == ElementState::Pressed {
                let printable = event
                    .text
                    .as_ref()
                    .filter(|text| !text.is_empty() && !text.chars().any(char::is_control));
                if let Some(text) = printable {
                    out.push_back(HostMessage::Text(text.to_string()));
                }
            }
        }
        _ => {}
    }
}

/// Applies one message to loop and input state. Follow-up messages go to the back of `pending`.
fn apply_message(
    message: HostMessage,
    pending: &mut VecDeque<HostMessage>,
    context: DispatchContext<'_, InputState>,
) {
    let DispatchContext { control, input } = context;
    match message {
        HostMessage::Quit(_) => {}
        HostMessage::CloseRequested => {
            info!(reason = "window_close", "shutdown_requested");
            pending.push_back(HostMessage::Quit(0));
        }
        HostMessage::KeyDown(code) => {
            let newly_down = !input.is_key_down(code);
            input.key_down(code);
            if code == PAUSE_KEY && newly_down {
                control.toggle_pause();
            }
            if code == CLOSE_KEY {
                info!(reason = "escape_key", "close_requested");
                pending.push_back(HostMessage::CloseRequested);
            }
        }
        HostMessage::KeyUp(code) => input.key_up(code),
        HostMessage::Text(text) => input.key_in(&text),
        HostMessage::Focused(focused) => {
            if !focused {
                input.release_all();
            }
            control.set_paused(!focused);
        }
        HostMessage::Resized { width, height } => {
            debug!(width, height, "window_resized");
        }
        HostMessage::MouseMoved { x, y } => input.mouse_moved(x, y),
        HostMessage::MouseButton { button, pressed } => input.set_mouse_button(button, pressed),
    }
}
