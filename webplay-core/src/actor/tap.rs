use super::{pressed, Actor};
use crate::{
    events::{InputEvent, MouseEvent, MouseEventKind},
    space::ActionSpace,
};

/// Taps the center of the screen, controlled by a single Bernoulli variable.
///
/// Follows the same hold rules as [`KeyActor`](super::KeyActor).
pub struct TapActor {
    x: i32,
    y: i32,
    no_hold: bool,
    held: bool,
}

impl TapActor {
    /// Creates an actor for a screen of the given size.
    pub fn new(width: u32, height: u32, no_hold: bool) -> Self {
        Self {
            x: (width / 2) as i32,
            y: (height / 2) as i32,
            no_hold,
            held: false,
        }
    }

    fn click(&self, kind: MouseEventKind) -> InputEvent {
        InputEvent::Mouse(MouseEvent::click(kind, self.x, self.y))
    }
}

impl Actor for TapActor {
    fn action_space(&self) -> ActionSpace {
        ActionSpace::Bernoulli { dim: 1 }
    }

    fn reset(&mut self) {
        self.held = false;
    }

    fn events(&mut self, action: &[f32]) -> Vec<InputEvent> {
        let press = pressed(action[0]);
        if self.no_hold {
            if press {
                vec![
                    self.click(MouseEventKind::Pressed),
                    self.click(MouseEventKind::Released),
                ]
            } else {
                vec![]
            }
        } else if press != self.held {
            self.held = press;
            if press {
                vec![self.click(MouseEventKind::Pressed)]
            } else {
                vec![self.click(MouseEventKind::Released)]
            }
        } else {
            vec![]
        }
    }

    fn vectorize(&mut self, events: &[InputEvent]) -> Vec<f32> {
        if self.no_hold {
            self.held = false;
        }
        for event in events {
            if let InputEvent::Mouse(m) = event {
                match m.kind {
                    MouseEventKind::Pressed => self.held = true,
                    MouseEventKind::Released if !self.no_hold => self.held = false,
                    _ => {}
                }
            }
        }
        vec![if self.held { 1.0 } else { 0.0 }]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_taps_center() {
        let mut actor = TapActor::new(320, 480, true);
        actor.reset();
        let events = actor.events(&[1.0]);
        assert_eq!(events.len(), 2);
        match &events[0] {
            InputEvent::Mouse(m) => {
                assert_eq!((m.x, m.y), (160, 240));
                assert_eq!(m.kind, MouseEventKind::Pressed);
            }
            _ => panic!("expected a mouse event"),
        }
        assert!(actor.events(&[0.2]).is_empty());
    }

    #[test]
    fn test_hold_and_vectorize() {
        let mut actor = TapActor::new(100, 100, false);
        actor.reset();
        assert_eq!(actor.events(&[1.0]).len(), 1);
        assert!(actor.events(&[1.0]).is_empty());
        assert_eq!(actor.events(&[0.0]).len(), 1);

        actor.reset();
        let press = InputEvent::Mouse(MouseEvent::click(MouseEventKind::Pressed, 1, 1));
        assert_eq!(actor.vectorize(&[press]), vec![1.0]);
        assert_eq!(actor.vectorize(&[]), vec![1.0]);
    }
}
