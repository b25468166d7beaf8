use super::{pressed, Actor};
use crate::{
    events::{InputEvent, MouseEvent, MouseEventKind},
    space::{one_hot, ActionSpace},
};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Cursor displacement per unit of Gaussian output, as a fraction of the
/// screen width (horizontal) or height (vertical).
pub const MOVE_FRACTION: f32 = 0.1;

/// Radii of the rings of the discrete motion menu, in pixels.
const RING_RADII: [f32; 3] = [10.0, 40.0, 80.0];

/// Points per ring of the discrete motion menu.
const RING_POINTS: usize = 5;

/// Number of options of the discrete motion menu.
pub const NUM_MOTIONS: usize = 1 + RING_RADII.len() * RING_POINTS;

/// How cursor motion is parameterized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseMotion {
    /// Continuous 2D displacement drawn from a Gaussian.
    Gaussian,
    /// One of [`NUM_MOTIONS`] fixed pixel offsets: no motion, then three rings
    /// of five points.
    Discrete,
}

impl MouseMotion {
    /// Tuple space of a press bit and the motion sub-space.
    pub fn action_space(&self) -> ActionSpace {
        let motion = match self {
            Self::Gaussian => ActionSpace::Gaussian { dim: 2 },
            Self::Discrete => ActionSpace::Categorical {
                options: NUM_MOTIONS,
            },
        };
        ActionSpace::Tuple {
            spaces: vec![ActionSpace::Bernoulli { dim: 1 }, motion],
        }
    }
}

/// Pixel offsets of the discrete motion menu in enumeration order.
pub fn motion_offsets() -> Vec<(f32, f32)> {
    let mut offsets = vec![(0.0, 0.0)];
    for r in RING_RADII {
        for k in 0..RING_POINTS {
            let angle = 2.0 * PI * k as f32 / RING_POINTS as f32;
            offsets.push((r * angle.cos(), r * angle.sin()));
        }
    }
    offsets
}

/// Index of the menu option closest to `(dx, dy)`; the first one wins ties.
pub fn nearest_motion(dx: f32, dy: f32) -> usize {
    let mut best = 0;
    let mut best_dist = f32::INFINITY;
    for (i, (ox, oy)) in motion_offsets().into_iter().enumerate() {
        let dist = (dx - ox).powi(2) + (dy - oy).powi(2);
        if dist < best_dist {
            best = i;
            best_dist = dist;
        }
    }
    best
}

/// Moves the cursor and clicks the left button.
///
/// Motion is relative: each step displaces the cursor from its last position,
/// which starts at the screen center after [`Actor::reset`]. The displaced
/// position is rounded to whole pixels and then clamped into the screen. A move
/// event is emitted only when the position changes; the press bit follows the
/// same hold rules as [`TapActor`](super::TapActor) and clicks at the new
/// position.
pub struct MouseActor {
    width: u32,
    height: u32,
    no_hold: bool,
    motion: MouseMotion,
    offsets: Vec<(f32, f32)>,
    held: bool,
    last: (i32, i32),
}

impl MouseActor {
    /// Creates an actor for a screen of the given size.
    pub fn new(width: u32, height: u32, no_hold: bool, motion: MouseMotion) -> Self {
        Self {
            width,
            height,
            no_hold,
            motion,
            offsets: motion_offsets(),
            held: false,
            last: ((width / 2) as i32, (height / 2) as i32),
        }
    }

    /// Current cursor position.
    pub fn cursor(&self) -> (i32, i32) {
        self.last
    }

    fn displacement(&self, motion: &[f32]) -> (f32, f32) {
        match self.motion {
            MouseMotion::Gaussian => (
                motion[0] * MOVE_FRACTION * self.width as f32,
                motion[1] * MOVE_FRACTION * self.height as f32,
            ),
            MouseMotion::Discrete => {
                let choice = motion
                    .iter()
                    .enumerate()
                    .fold((0, f32::NEG_INFINITY), |best, (i, &x)| {
                        if x > best.1 {
                            (i, x)
                        } else {
                            best
                        }
                    })
                    .0;
                self.offsets[choice]
            }
        }
    }

    fn clamp(&self, x: f32, y: f32) -> (i32, i32) {
        let x = (x.round() as i32).clamp(0, self.width as i32 - 1);
        let y = (y.round() as i32).clamp(0, self.height as i32 - 1);
        (x, y)
    }
}

impl Actor for MouseActor {
    fn action_space(&self) -> ActionSpace {
        self.motion.action_space()
    }

    fn reset(&mut self) {
        self.held = false;
        self.last = ((self.width / 2) as i32, (self.height / 2) as i32);
    }

    fn events(&mut self, action: &[f32]) -> Vec<InputEvent> {
        let mut events = vec![];
        let press = pressed(action[0]);
        let (dx, dy) = self.displacement(&action[1..]);
        let (x, y) = self.clamp(self.last.0 as f32 + dx, self.last.1 as f32 + dy);

        if (x, y) != self.last {
            self.last = (x, y);
            events.push(InputEvent::Mouse(MouseEvent::moved(x, y, self.held)));
        }

        let click = |kind| InputEvent::Mouse(MouseEvent::click(kind, x, y));
        if self.no_hold {
            if press {
                events.push(click(MouseEventKind::Pressed));
                events.push(click(MouseEventKind::Released));
            }
        } else if press != self.held {
            self.held = press;
            events.push(click(if press {
                MouseEventKind::Pressed
            } else {
                MouseEventKind::Released
            }));
        }
        events
    }

    fn vectorize(&mut self, events: &[InputEvent]) -> Vec<f32> {
        let start = self.last;
        if self.no_hold {
            self.held = false;
        }
        for event in events {
            let m = match event {
                InputEvent::Mouse(m) => m,
                _ => continue,
            };
            self.last = (m.x, m.y);
            match m.kind {
                MouseEventKind::Pressed => {
                    self.held = true;
                    if self.no_hold {
                        break;
                    }
                }
                MouseEventKind::Released if !self.no_hold => self.held = false,
                _ => {}
            }
        }

        let dx = (self.last.0 - start.0) as f32;
        let dy = (self.last.1 - start.1) as f32;
        let mut vec = vec![if self.held { 1.0 } else { 0.0 }];
        match self.motion {
            MouseMotion::Gaussian => {
                vec.push(dx / (MOVE_FRACTION * self.width as f32));
                vec.push(dy / (MOVE_FRACTION * self.height as f32));
            }
            MouseMotion::Discrete => vec.extend(one_hot(NUM_MOTIONS, nearest_motion(dx, dy))),
        }
        vec
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn discrete_action(press: f32, choice: usize) -> Vec<f32> {
        let mut v = vec![press];
        v.extend(one_hot(NUM_MOTIONS, choice));
        v
    }

    #[test]
    fn test_menu_layout() {
        let offsets = motion_offsets();
        assert_eq!(offsets.len(), 16);
        assert_eq!(offsets[0], (0.0, 0.0));
        for (i, r) in RING_RADII.iter().enumerate() {
            for k in 0..RING_POINTS {
                let (x, y) = offsets[1 + i * RING_POINTS + k];
                assert!(((x * x + y * y).sqrt() - r).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_discrete_round_trip_selects_option() {
        let mut actor = MouseActor::new(400, 400, false, MouseMotion::Discrete);
        let mut inverse = MouseActor::new(400, 400, false, MouseMotion::Discrete);
        for choice in 0..NUM_MOTIONS {
            actor.reset();
            inverse.reset();
            let events = actor.events(&discrete_action(0.0, choice));
            let v = inverse.vectorize(&events);
            assert_eq!(v, discrete_action(0.0, choice), "option {}", choice);
        }
    }

    #[test]
    fn test_nearest_motion_ties_pick_first() {
        // Equidistant from no motion and from the first point of the inner ring.
        assert_eq!(nearest_motion(5.0, 0.0), 0);
        assert_eq!(nearest_motion(6.0, 0.0), 1);
        assert_eq!(nearest_motion(75.0, 2.0), 11);
    }

    #[test]
    fn test_gaussian_motion_is_relative_and_clamped() {
        let mut actor = MouseActor::new(100, 200, false, MouseMotion::Gaussian);
        actor.reset();
        assert_eq!(actor.cursor(), (50, 100));

        let events = actor.events(&[0.0, 1.0, -0.5]);
        assert_eq!(events, vec![InputEvent::Mouse(MouseEvent::moved(60, 90, false))]);

        // No motion, no move event.
        assert!(actor.events(&[0.0, 0.0, 0.0]).is_empty());

        // Far off screen ends at the border.
        actor.events(&[0.0, 100.0, 100.0]);
        assert_eq!(actor.cursor(), (99, 199));
    }

    #[test]
    fn test_press_after_move() {
        let mut actor = MouseActor::new(100, 100, true, MouseMotion::Gaussian);
        actor.reset();
        let events = actor.events(&[1.0, 1.0, 0.0]);
        assert_eq!(
            events,
            vec![
                InputEvent::Mouse(MouseEvent::moved(60, 50, false)),
                InputEvent::Mouse(MouseEvent::click(MouseEventKind::Pressed, 60, 50)),
                InputEvent::Mouse(MouseEvent::click(MouseEventKind::Released, 60, 50)),
            ]
        );
    }

    #[test]
    fn test_vectorize_first_press_wins_without_hold() {
        let mut actor = MouseActor::new(100, 100, true, MouseMotion::Gaussian);
        actor.reset();
        let events = vec![
            InputEvent::Mouse(MouseEvent::click(MouseEventKind::Pressed, 60, 50)),
            InputEvent::Mouse(MouseEvent::moved(90, 90, true)),
        ];
        let v = actor.vectorize(&events);
        assert_eq!(v, vec![1.0, 1.0, 0.0]);
        assert_eq!(actor.cursor(), (60, 50));
    }

    #[test]
    fn test_vectorize_last_event_wins_with_hold() {
        let mut actor = MouseActor::new(100, 100, false, MouseMotion::Gaussian);
        actor.reset();
        let events = vec![
            InputEvent::Mouse(MouseEvent::click(MouseEventKind::Pressed, 50, 50)),
            InputEvent::Mouse(MouseEvent::click(MouseEventKind::Released, 50, 50)),
            InputEvent::Mouse(MouseEvent::moved(40, 50, false)),
        ];
        assert_eq!(actor.vectorize(&events), vec![0.0, -1.0, 0.0]);
    }
}
