// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Backend-agnostic input state and the input-source contract.
//!
//! A concrete windowing layer implements [`InputSource`]; the engine polls it
//! once per frame into an [`InputSnapshot`] that systems read.

/// A physical keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
#[rustfmt::skip]
pub enum KeyCode {
    A, B, C, D, E, F, G, H, I, J, K, L, M,
    N, O, P, Q, R, S, T, U, V, W, X, Y, Z,
    Digit0, Digit1, Digit2, Digit3, Digit4,
    Digit5, Digit6, Digit7, Digit8, Digit9,
    F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12,
    Escape, Enter, Space, Tab, Backspace, Delete, Insert, Home, End, PageUp, PageDown,
    ArrowLeft, ArrowRight, ArrowUp, ArrowDown,
    ShiftLeft, ShiftRight, ControlLeft, ControlRight, AltLeft, AltRight,
    Backquote, Minus, Equal,
}

/// A mouse button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    /// The left mouse button.
    Left,
    /// The right mouse button.
    Right,
    /// The middle mouse button.
    Middle,
    /// The back mouse button (typically on the side).
    Back,
    /// The forward mouse button (typically on the side).
    Forward,
}

impl MouseButton {
    const fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// Events that are not plain state changes and must be dispatched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// The drawable surface changed size.
    Resized {
        /// New width in pixels.
        width: u32,
        /// New height in pixels.
        height: u32,
    },
    /// The user asked to close the window.
    CloseRequested,
}

/// The input state for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InputSnapshot {
    /// Drawable size in pixels.
    pub screen_size: (u32, u32),
    /// Cursor position in pixels, origin top-left.
    pub cursor: (f32, f32),
    /// Scroll accumulated since the previous poll.
    pub scroll_delta: (f32, f32),
    keys: u128,
    mouse_buttons: u8,
}

impl InputSnapshot {
    /// Creates an empty snapshot for a surface of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            screen_size: (width, height),
            ..Default::default()
        }
    }

    /// Returns `true` while `key` is held.
    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys & (1u128 << key as u8) != 0
    }

    /// Records a key transition.
    pub fn set_key(&mut self, key: KeyCode, down: bool) {
        let bit = 1u128 << key as u8;
        if down {
            self.keys |= bit;
        } else {
            self.keys &= !bit;
        }
    }

    /// Returns `true` while `button` is held.
    pub fn is_mouse_down(&self, button: MouseButton) -> bool {
        self.mouse_buttons & button.bit() != 0
    }

    /// Records a mouse button transition.
    pub fn set_mouse_button(&mut self, button: MouseButton, down: bool) {
        if down {
            self.mouse_buttons |= button.bit();
        } else {
            self.mouse_buttons &= !button.bit();
        }
    }
}

/// A source of window and input state, such as a windowing library adapter.
pub trait InputSource: Send {
    /// Folds all input received since the last call into `snapshot` and appends
    /// dispatchable events to `events`.
    ///
    /// Implementations reset `snapshot.scroll_delta` before accumulating.
    fn poll(&mut self, snapshot: &mut InputSnapshot, events: &mut Vec<InputEvent>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_state_tracks_transitions() {
        let mut snapshot = InputSnapshot::new(640, 480);
        assert!(!snapshot.is_key_down(KeyCode::Equal));
        snapshot.set_key(KeyCode::Equal, true);
        snapshot.set_key(KeyCode::A, true);
        assert!(snapshot.is_key_down(KeyCode::Equal));
        snapshot.set_key(KeyCode::Equal, false);
        assert!(!snapshot.is_key_down(KeyCode::Equal));
        assert!(snapshot.is_key_down(KeyCode::A));
    }

    #[test]
    fn mouse_buttons_are_independent() {
        let mut snapshot = InputSnapshot::default();
        snapshot.set_mouse_button(MouseButton::Right, true);
        assert!(snapshot.is_mouse_down(MouseButton::Right));
        assert!(!snapshot.is_mouse_down(MouseButton::Left));
    }
}
