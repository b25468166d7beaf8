//! Input events delivered to a game.
use serde::{Deserialize, Serialize};

/// Direction of a key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyEventKind {
    /// The key went down.
    Down,
    /// The key was released.
    Up,
}

/// Kind of a mouse event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseEventKind {
    /// A button was pressed.
    Pressed,
    /// A button was released.
    Released,
    /// The cursor moved.
    Moved,
}

/// Mouse button attached to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseButton {
    /// No button is involved, e.g. a plain move.
    None,
    /// The left button.
    Left,
}

/// A mouse event in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseEvent {
    /// Kind of the event.
    pub kind: MouseEventKind,
    /// Horizontal position in pixels.
    pub x: i32,
    /// Vertical position in pixels.
    pub y: i32,
    /// Button held or toggled by the event.
    pub button: MouseButton,
    /// Click count; `1` for presses and releases, `0` for moves.
    pub click_count: u32,
}

impl MouseEvent {
    /// A left-button press or release at `(x, y)`.
    pub fn click(kind: MouseEventKind, x: i32, y: i32) -> Self {
        Self {
            kind,
            x,
            y,
            button: MouseButton::Left,
            click_count: 1,
        }
    }

    /// A cursor move to `(x, y)`, dragging the left button when `held`.
    pub fn moved(x: i32, y: i32, held: bool) -> Self {
        Self {
            kind: MouseEventKind::Moved,
            x,
            y,
            button: if held {
                MouseButton::Left
            } else {
                MouseButton::None
            },
            click_count: 0,
        }
    }
}

/// A single input event applied to the game during one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputEvent {
    /// A keyboard event. `code` is the key name, e.g. `"ArrowLeft"`.
    Key {
        /// Direction of the event.
        kind: KeyEventKind,
        /// Key name.
        code: String,
    },

    /// A mouse event.
    Mouse(MouseEvent),
}

impl InputEvent {
    /// Key-down event for `code`.
    pub fn key_down(code: impl Into<String>) -> Self {
        Self::Key {
            kind: KeyEventKind::Down,
            code: code.into(),
        }
    }

    /// Key-up event for `code`.
    pub fn key_up(code: impl Into<String>) -> Self {
        Self::Key {
            kind: KeyEventKind::Up,
            code: code.into(),
        }
    }
}
