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

//! An input source fed programmatically, for servers, tests and demos.

use ember_core::platform::{InputEvent, InputSnapshot, InputSource, KeyCode, MouseButton};

/// A single change pushed into a [`HeadlessInput`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputChange {
    /// A key went down (`true`) or up.
    Key(KeyCode, bool),
    /// A mouse button went down (`true`) or up.
    MouseButton(MouseButton, bool),
    /// The cursor moved to an absolute position.
    CursorMoved(f32, f32),
    /// The wheel scrolled.
    Scrolled(f32, f32),
    /// The surface changed size.
    Resized(u32, u32),
    /// Shutdown was requested.
    CloseRequested,
}

/// The sending half of a [`HeadlessInput`]; cloneable and usable from any thread.
#[derive(Debug, Clone)]
pub struct InputFeed {
    sender: flume::Sender<InputChange>,
}

impl InputFeed {
    /// Queues a change for the next poll. Changes sent after the input source
    /// was dropped are discarded.
    pub fn send(&self, change: InputChange) {
        if self.sender.send(change).is_err() {
            log::debug!("Input change {change:?} dropped: the input source is gone");
        }
    }
}

/// An [`InputSource`] that applies the changes queued through its [`InputFeed`].
#[derive(Debug)]
pub struct HeadlessInput {
    receiver: flume::Receiver<InputChange>,
}

impl HeadlessInput {
    /// Creates a source and the feed that drives it.
    pub fn new() -> (Self, InputFeed) {
        let (sender, receiver) = flume::unbounded();
        (Self { receiver }, InputFeed { sender })
    }
}

impl InputSource for HeadlessInput {
    fn poll(&mut self, snapshot: &mut InputSnapshot, events: &mut Vec<InputEvent>) {
        snapshot.scroll_delta = (0.0, 0.0);
        for change in self.receiver.try_iter() {
            match change {
                InputChange::Key(key, down) => snapshot.set_key(key, down),
                InputChange::MouseButton(button, down) => snapshot.set_mouse_button(button, down),
                InputChange::CursorMoved(x, y) => snapshot.cursor = (x, y),
                InputChange::Scrolled(dx, dy) => {
                    snapshot.scroll_delta.0 += dx;
                    snapshot.scroll_delta.1 += dy;
                }
                InputChange::Resized(width, height) => {
                    snapshot.screen_size = (width, height);
                    events.push(InputEvent::Resized { width, height });
                }
                InputChange::CloseRequested => events.push(InputEvent::CloseRequested),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_folds_changes_into_the_snapshot() {
        let (mut input, feed) = HeadlessInput::new();
        let mut snapshot = InputSnapshot::new(800, 600);
        let mut events = Vec::new();

        feed.send(InputChange::Key(KeyCode::W, true));
        feed.send(InputChange::Scrolled(0.0, 1.0));
        feed.send(InputChange::Scrolled(0.0, 2.0));
        feed.send(InputChange::Resized(1024, 768));
        input.poll(&mut snapshot, &mut events);

        assert!(snapshot.is_key_down(KeyCode::W));
        assert_eq!(snapshot.scroll_delta, (0.0, 3.0));
        assert_eq!(snapshot.screen_size, (1024, 768));
        assert_eq!(events, vec![InputEvent::Resized { width: 1024, height: 768 }]);

        events.clear();
        input.poll(&mut snapshot, &mut events);
        assert_eq!(snapshot.scroll_delta, (0.0, 0.0));
        assert!(snapshot.is_key_down(KeyCode::W));
        assert!(events.is_empty());
    }
}
