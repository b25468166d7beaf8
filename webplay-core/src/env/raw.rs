use crate::{error::WebplayError, events::InputEvent};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A screenshot as packed 8-bit RGB, row major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawObs {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// `width * height * 3` bytes.
    pub rgb: Vec<u8>,
}

impl RawObs {
    /// An image of a single color.
    pub fn filled(width: usize, height: usize, color: [u8; 3]) -> Self {
        Self {
            width,
            height,
            rgb: color.repeat(width * height),
        }
    }

    /// Returns the pixel buffer after checking it against the expected size.
    pub fn rgb_checked(&self, width: usize, height: usize) -> Result<&[u8], WebplayError> {
        let expected = width * height * 3;
        if self.width != width || self.height != height || self.rgb.len() != expected {
            return Err(WebplayError::ShapeMismatch {
                expected,
                actual: self.rgb.len(),
            });
        }
        Ok(&self.rgb)
    }
}

/// A running game instance of the harness.
///
/// Implementations may block on the game process. Errors are fatal to the
/// caller; they are never retried.
pub trait RawEnv: Send {
    /// Restarts the game.
    fn reset(&mut self) -> Result<()>;

    /// Captures the current screen.
    fn observe(&mut self) -> Result<RawObs>;

    /// Applies `events` and advances the game by `frame_time`.
    ///
    /// Returns the reward earned during the step and whether the game ended.
    fn step(&mut self, frame_time: Duration, events: &[InputEvent]) -> Result<(f32, bool)>;

    /// Shuts the game down.
    fn close(&mut self) -> Result<()>;
}

/// Static description of a game provided by the harness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameInfo {
    /// Identifier, e.g. `"Knightower-v0"`.
    pub name: String,
    /// Screen width in pixels.
    pub width: u32,
    /// Screen height in pixels.
    pub height: u32,
    /// Keys the game reacts to.
    pub key_whitelist: Vec<String>,
}

/// Lookup of the games known to the harness.
pub trait GameCatalog {
    /// Returns the description of the named game, if any.
    fn game(&self, name: &str) -> Option<GameInfo>;
}

/// Launches game instances.
pub trait RawEnvFactory: Send + Sync {
    /// Starts a fresh instance of the game.
    fn make(&self, game: &GameInfo) -> Result<Box<dyn RawEnv>>;
}
