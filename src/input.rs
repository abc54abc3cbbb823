//! Input system with action-based mapping
//!
//! Translates raw winit events into the handful of actions the demo reacts to.

use std::collections::{HashMap, HashSet};

use glam::Vec2;
use serde::{Deserialize, Serialize};
use winit::event::{ElementState, MouseButton};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Demo actions that can be triggered by input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DemoAction {
    /// Move forward (W by default)
    MoveForward,
    /// Move backward (S by default)
    MoveBackward,
    /// Move left (A by default)
    MoveLeft,
    /// Move right (D by default)
    MoveRight,
    /// Move straight up (Space by default)
    Ascend,
    /// Move straight down (Left Shift by default)
    Descend,
    /// Slow movement modifier (Left Ctrl by default)
    Slow,
    /// Place the tool's start pose at the camera (left mouse button)
    CaptureBefore,
    /// Place the tool's end pose at the camera (right mouse button)
    CaptureAfter,
    /// Freeze or unfreeze the sweep (P by default)
    Pause,
    /// Halve the time scale ([ by default)
    SlowerTime,
    /// Double the time scale (] by default)
    FasterTime,
    /// Leave the demo (Escape by default)
    Quit,
}

/// Current state of all inputs for a frame
#[derive(Debug, Clone, Default)]
pub struct InputState {
    /// Actions currently held down
    pub held: HashSet<DemoAction>,
    /// Actions pressed this frame
    pub just_pressed: HashSet<DemoAction>,
    /// Mouse movement delta for this frame
    pub mouse_delta: Vec2,
    /// Whether mouse motion should turn the camera
    pub cursor_captured: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, action: DemoAction) -> bool {
        self.held.contains(&action)
    }

    pub fn is_just_pressed(&self, action: DemoAction) -> bool {
        self.just_pressed.contains(&action)
    }

    /// Clear frame-specific data (call at end of frame)
    pub fn clear_frame(&mut self) {
        self.just_pressed.clear();
        self.mouse_delta = Vec2::ZERO;
    }

    /// Drop everything, e.g. when the window loses focus
    pub fn clear_all(&mut self) {
        self.held.clear();
        self.clear_frame();
    }
}

/// Binding of a physical input to an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputBinding {
    Key(KeyCode),
    Mouse(u32), // 0 = left, 1 = right, 2 = middle
}

/// Maps physical inputs to demo actions
#[derive(Debug, Clone)]
pub struct InputBindings {
    bindings: HashMap<InputBinding, DemoAction>,
}

impl Default for InputBindings {
    fn default() -> Self {
        let mut bindings = Self {
            bindings: HashMap::new(),
        };

        bindings.bind(KeyCode::KeyW, DemoAction::MoveForward);
        bindings.bind(KeyCode::KeyS, DemoAction::MoveBackward);
        bindings.bind(KeyCode::KeyA, DemoAction::MoveLeft);
        bindings.bind(KeyCode::KeyD, DemoAction::MoveRight);
        bindings.bind(KeyCode::Space, DemoAction::Ascend);
        bindings.bind(KeyCode::ShiftLeft, DemoAction::Descend);
        bindings.bind(KeyCode::ControlLeft, DemoAction::Slow);
        bindings.bind(KeyCode::KeyP, DemoAction::Pause);
        bindings.bind(KeyCode::BracketLeft, DemoAction::SlowerTime);
        bindings.bind(KeyCode::BracketRight, DemoAction::FasterTime);
        bindings.bind(KeyCode::Escape, DemoAction::Quit);

        bindings.bind_mouse(0, DemoAction::CaptureBefore);
        bindings.bind_mouse(1, DemoAction::CaptureAfter);

        bindings
    }
}

impl InputBindings {
    pub fn bind(&mut self, key: KeyCode, action: DemoAction) {
        self.bindings.insert(InputBinding::Key(key), action);
    }

    pub fn bind_mouse(&mut self, button: u32, action: DemoAction) {
        self.bindings.insert(InputBinding::Mouse(button), action);
    }

    pub fn get_action(&self, binding: &InputBinding) -> Option<DemoAction> {
        self.bindings.get(binding).copied()
    }
}

/// Processes raw events and updates [`InputState`]
#[derive(Debug, Default)]
pub struct InputHandler {
    pub state: InputState,
    pub bindings: InputBindings,
}

impl InputHandler {
    pub fn new() -> Self {
        Self::default()
    }

    fn apply(&mut self, binding: InputBinding, element_state: ElementState) {
        let Some(action) = self.bindings.get_action(&binding) else {
            return;
        };
        match element_state {
            ElementState::Pressed => {
                if self.state.held.insert(action) {
                    self.state.just_pressed.insert(action);
                }
            }
            ElementState::Released => {
                self.state.held.remove(&action);
            }
        }
    }

    pub fn handle_keyboard(&mut self, physical_key: PhysicalKey, element_state: ElementState) {
        if let PhysicalKey::Code(key_code) = physical_key {
            self.apply(InputBinding::Key(key_code), element_state);
        }
    }

    pub fn handle_mouse_button(&mut self, button: MouseButton, element_state: ElementState) {
        let button_id = match button {
            MouseButton::Left => 0,
            MouseButton::Right => 1,
            MouseButton::Middle => 2,
            MouseButton::Back => 3,
            MouseButton::Forward => 4,
            MouseButton::Other(id) => id as u32,
        };
        self.apply(InputBinding::Mouse(button_id), element_state);
    }

    /// Accumulate raw mouse motion; ignored while the cursor is free
    pub fn handle_mouse_motion(&mut self, delta: (f64, f64)) {
        if self.state.cursor_captured {
            self.state.mouse_delta += Vec2::new(delta.0 as f32, delta.1 as f32);
        }
    }

    pub fn set_cursor_captured(&mut self, captured: bool) {
        self.state.cursor_captured = captured;
        if !captured {
            self.state.clear_all();
        }
    }

    pub fn end_frame(&mut self) {
        self.state.clear_frame();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bindings() {
        let bindings = InputBindings::default();
        assert_eq!(
            bindings.get_action(&InputBinding::Key(KeyCode::KeyW)),
            Some(DemoAction::MoveForward)
        );
        assert_eq!(
            bindings.get_action(&InputBinding::Mouse(1)),
            Some(DemoAction::CaptureAfter)
        );
        assert_eq!(bindings.get_action(&InputBinding::Key(KeyCode::KeyQ)), None);
    }

    #[test]
    fn test_press_and_release() {
        let mut handler = InputHandler::new();
        handler.handle_mouse_button(MouseButton::Left, ElementState::Pressed);
        assert!(handler.state.is_held(DemoAction::CaptureBefore));

        // Held actions survive the end of the frame.
        handler.end_frame();
        assert!(handler.state.is_held(DemoAction::CaptureBefore));

        handler.handle_mouse_button(MouseButton::Left, ElementState::Released);
        assert!(!handler.state.is_held(DemoAction::CaptureBefore));
    }

    #[test]
    fn test_just_pressed_lasts_one_frame() {
        let mut handler = InputHandler::new();
        handler.handle_keyboard(PhysicalKey::Code(KeyCode::KeyP), ElementState::Pressed);
        assert!(handler.state.is_just_pressed(DemoAction::Pause));

        handler.end_frame();
        assert!(!handler.state.is_just_pressed(DemoAction::Pause));

        // A second press event while still held is not a new press.
        handler.handle_keyboard(PhysicalKey::Code(KeyCode::KeyP), ElementState::Pressed);
        assert!(!handler.state.is_just_pressed(DemoAction::Pause));
        assert!(handler.state.is_held(DemoAction::Pause));
    }

    #[test]
    fn test_mouse_motion_needs_capture() {
        let mut handler = InputHandler::new();
        handler.handle_mouse_motion((3.0, -2.0));
        assert_eq!(handler.state.mouse_delta, Vec2::ZERO);

        handler.set_cursor_captured(true);
        handler.handle_mouse_motion((3.0, -2.0));
        handler.handle_mouse_motion((1.0, 0.0));
        assert_eq!(handler.state.mouse_delta, Vec2::new(4.0, -2.0));

        handler.end_frame();
        assert_eq!(handler.state.mouse_delta, Vec2::ZERO);
    }

    #[test]
    fn test_losing_capture_releases_everything() {
        let mut handler = InputHandler::new();
        handler.set_cursor_captured(true);
        handler.handle_keyboard(PhysicalKey::Code(KeyCode::KeyW), ElementState::Pressed);
        assert!(handler.state.is_held(DemoAction::MoveForward));

        handler.set_cursor_captured(false);
        assert!(!handler.state.is_held(DemoAction::MoveForward));
    }
}
