use super::{pressed, Actor};
use crate::{
    events::{InputEvent, KeyEventKind},
    space::ActionSpace,
};

/// Produces keyboard events, one Bernoulli variable per key.
///
/// With `no_hold`, a press emits a key-down immediately followed by a key-up in
/// the same step. Otherwise an event is emitted only when the pressed state of
/// a key changes from the previous step.
pub struct KeyActor {
    keys: Vec<String>,
    no_hold: bool,
    held: Vec<bool>,
}

impl KeyActor {
    /// Creates an actor over the given key names.
    pub fn new(keys: Vec<String>, no_hold: bool) -> Self {
        let held = vec![false; keys.len()];
        Self {
            keys,
            no_hold,
            held,
        }
    }
}

impl Actor for KeyActor {
    fn action_space(&self) -> ActionSpace {
        ActionSpace::Bernoulli {
            dim: self.keys.len(),
        }
    }

    fn reset(&mut self) {
        self.held.iter_mut().for_each(|h| *h = false);
    }

    fn events(&mut self, action: &[f32]) -> Vec<InputEvent> {
        let mut events = vec![];
        for (i, key) in self.keys.iter().enumerate() {
            let press = pressed(action[i]);
            if self.no_hold {
                if press {
                    events.push(InputEvent::key_down(key.as_str()));
                    events.push(InputEvent::key_up(key.as_str()));
                }
            } else if press != self.held[i] {
                self.held[i] = press;
                events.push(if press {
                    InputEvent::key_down(key.as_str())
                } else {
                    InputEvent::key_up(key.as_str())
                });
            }
        }
        events
    }

    fn vectorize(&mut self, events: &[InputEvent]) -> Vec<f32> {
        if self.no_hold {
            self.reset();
        }
        for event in events {
            if let InputEvent::Key { kind, code } = event {
                let i = match self.keys.iter().position(|k| k == code) {
                    Some(i) => i,
                    None => continue,
                };
                match kind {
                    KeyEventKind::Down => self.held[i] = true,
                    KeyEventKind::Up if !self.no_hold => self.held[i] = false,
                    KeyEventKind::Up => {}
                }
            }
        }
        self.held.iter().map(|&h| if h { 1.0 } else { 0.0 }).collect()
    }
}
