use super::{RawEnv, RawObs};
use crate::events::InputEvent;
use anyhow::Result;
use std::time::Duration;

/// Pixels of the cursor glyph relative to the hot spot.
const GLYPH: [(i32, i32); 9] = [
    (0, 0),
    (-1, 0),
    (-2, 0),
    (1, 0),
    (2, 0),
    (0, -1),
    (0, -2),
    (0, 1),
    (0, 2),
];

/// Draws the mouse cursor into the screenshots of a wrapped game.
///
/// Headless games do not render the cursor, so a policy controlling the mouse
/// could not see where it points. The position is tracked from the mouse
/// events passed to [`RawEnv::step`] and starts at `start` after every reset.
pub struct CursorEnv {
    inner: Box<dyn RawEnv>,
    start: (i32, i32),
    pos: (i32, i32),
}

impl CursorEnv {
    /// Wraps `inner` with a cursor starting at `(x, y)`.
    pub fn new(inner: Box<dyn RawEnv>, x: i32, y: i32) -> Self {
        Self {
            inner,
            start: (x, y),
            pos: (x, y),
        }
    }

    /// Current cursor position.
    pub fn position(&self) -> (i32, i32) {
        self.pos
    }
}

impl RawEnv for CursorEnv {
    fn reset(&mut self) -> Result<()> {
        self.pos = self.start;
        self.inner.reset()
    }

    fn observe(&mut self) -> Result<RawObs> {
        let mut obs = self.inner.observe()?;
        for (dx, dy) in GLYPH {
            let (x, y) = (self.pos.0 + dx, self.pos.1 + dy);
            if x < 0 || y < 0 || x as usize >= obs.width || y as usize >= obs.height {
                continue;
            }
            let idx = (y as usize * obs.width + x as usize) * 3;
            if let Some(px) = obs.rgb.get_mut(idx..idx + 3) {
                px.copy_from_slice(&[0, 0, 0]);
            }
        }
        Ok(obs)
    }

    fn step(&mut self, frame_time: Duration, events: &[InputEvent]) -> Result<(f32, bool)> {
        for event in events {
            if let InputEvent::Mouse(m) = event {
                self.pos = (m.x, m.y);
            }
        }
        self.inner.step(frame_time, events)
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        dummy::{DummyConfig, DummyEnv},
        events::MouseEvent,
    };

    #[test]
    fn test_draws_cursor_at_last_position() -> Result<()> {
        let inner = DummyEnv::new(DummyConfig::default().size(16, 16));
        let mut env = CursorEnv::new(Box::new(inner), 8, 8);
        env.reset()?;
        let obs = env.observe()?;
        assert_eq!(&obs.rgb[(8 * 16 + 8) * 3..(8 * 16 + 8) * 3 + 3], &[0, 0, 0]);

        let moved = InputEvent::Mouse(MouseEvent::moved(0, 0, false));
        env.step(Duration::from_millis(100), &[moved])?;
        assert_eq!(env.position(), (0, 0));
        let obs = env.observe()?;
        assert_eq!(&obs.rgb[0..3], &[0, 0, 0]);

        env.reset()?;
        assert_eq!(env.position(), (8, 8));
        Ok(())
    }
}
