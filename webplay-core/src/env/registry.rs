use super::{EnvSpec, GameCatalog};
use crate::error::WebplayError;
use log::debug;
use std::time::Duration;

#[derive(Clone, Copy)]
enum Control {
    Key,
    Tap,
    Mouse,
}

/// One row of the standard table.
struct Entry {
    name: &'static str,
    control: Control,
    no_hold: bool,
    discount: f32,
    /// Steps per second of game time.
    fps: u32,
    batch_size: usize,
    reward_scale: Option<f32>,
    color: bool,
}

const fn entry(
    name: &'static str,
    control: Control,
    no_hold: bool,
    discount: f32,
    fps: u32,
    batch_size: usize,
) -> Entry {
    Entry {
        name,
        control,
        no_hold,
        discount,
        fps,
        batch_size,
        reward_scale: None,
        color: false,
    }
}

const fn scaled(mut e: Entry, scale: f32) -> Entry {
    e.reward_scale = Some(scale);
    e
}

const fn color(mut e: Entry) -> Entry {
    e.color = true;
    e
}

use Control::{Key, Mouse, Tap};

const STANDARD: [Entry; 36] = [
    entry("Knightower-v0", Key, true, 0.9, 8, 512),
    entry("KumbaKarate-v0", Key, true, 0.7, 10, 512),
    entry("PenguinSkip-v0", Key, true, 0.7, 5, 512),
    entry("TRexRunner-v0", Key, true, 0.98, 10, 512),
    entry("DontCrash-v0", Tap, true, 0.9, 10, 512),
    entry("RabbitPunch-v0", Tap, true, 0.9, 8, 512),
    entry("Babel-v0", Tap, true, 0.98, 10, 1024),
    entry("Lectro-v0", Tap, true, 0.99, 10, 512),
    entry("PineapplePen-v0", Tap, true, 0.98, 10, 512),
    entry("SushiNinjaDash-v0", Tap, true, 0.98, 10, 512),
    entry("PopUp-v0", Tap, true, 0.98, 10, 2048),
    color(entry("ColorCircles-v0", Tap, true, 0.98, 10, 512)),
    entry("PanicDrop-v0", Tap, true, 0.98, 10, 512),
    entry("TapTapDash-v0", Tap, true, 0.98, 10, 512),
    scaled(entry("NinjaRun-v0", Tap, true, 0.98, 10, 512), 1.0 / 100.0),
    scaled(entry("KibaKumbaShadowRun-v0", Tap, true, 0.98, 10, 512), 1.0 / 250.0),
    entry("FlappyBird-v0", Tap, true, 0.99, 10, 512),
    entry("StickFreak-v0", Tap, false, 0.98, 10, 512),
    entry("Basketball-v0", Tap, false, 0.95, 10, 512),
    entry("TowerMania-v0", Tap, false, 0.99, 10, 512),
    entry("StackTowerClassic-v0", Tap, false, 0.99, 10, 1024),
    entry("Twins-v0", Key, false, 0.98, 10, 512),
    entry("RedHead-v0", Key, false, 0.98, 10, 2048),
    entry("CartoonFlight-v0", Key, false, 0.95, 8, 512),
    entry("CartoonFlight-v1", Key, false, 0.95, 8, 512),
    entry("TRex-v0", Key, false, 0.98, 10, 512),
    entry("Cars-v0", Key, false, 0.98, 10, 512),
    entry("MeatBoyClicker-v0", Key, false, 0.98, 10, 512),
    scaled(entry("DoodleJump-v0", Key, false, 0.98, 10, 2048), 1.0 / 500.0),
    scaled(entry("HopDontStop-v0", Key, false, 0.98, 10, 512), 1.0 / 250.0),
    scaled(entry("UfoRun-v0", Tap, false, 0.99, 10, 512), 1.0 / 100.0),
    color(entry("ColorTease-v0", Key, true, 0.98, 10, 1024)),
    entry("PizzaNinja3-v0", Mouse, false, 0.99, 10, 2048),
    entry("SoccerGirl-v1", Mouse, false, 0.98, 10, 512),
    scaled(entry("ClickThemAll-v0", Mouse, false, 0.98, 10, 2048), 1.0 / 1000.0),
    color(entry("Colorpop-v0", Mouse, false, 0.99, 10, 512)),
];

/// Immutable lookup table of [`EnvSpec`]s by game name.
///
/// Built once at startup and passed to whatever needs to resolve a game.
#[derive(Debug, Clone, Default)]
pub struct EnvRegistry {
    specs: Vec<EnvSpec>,
}

impl EnvRegistry {
    /// Builds a registry from explicit specs.
    pub fn new(specs: Vec<EnvSpec>) -> Self {
        Self { specs }
    }

    /// The standard table of supported games.
    ///
    /// Games unknown to `catalog` are left out.
    pub fn standard(catalog: &dyn GameCatalog) -> Self {
        let specs = STANDARD
            .iter()
            .filter_map(|e| {
                let game = match catalog.game(e.name) {
                    Some(game) => game,
                    None => {
                        debug!("skipping {}: not provided by the harness", e.name);
                        return None;
                    }
                };
                let frame_time = Duration::from_secs(1) / e.fps;
                let spec = match e.control {
                    Control::Key => {
                        EnvSpec::standard_key(game, e.no_hold, e.discount, frame_time, e.batch_size)
                    }
                    Control::Tap => {
                        EnvSpec::standard_tap(game, e.no_hold, e.discount, frame_time, e.batch_size)
                    }
                    Control::Mouse => EnvSpec::standard_mouse(
                        game,
                        e.no_hold,
                        e.discount,
                        frame_time,
                        e.batch_size,
                    ),
                };
                let spec = match e.reward_scale {
                    Some(scale) => spec.with_reward_scale(scale),
                    None => spec,
                };
                Some(if e.color { spec.colorize() } else { spec })
            })
            .collect();
        Self { specs }
    }

    /// Names of all games in the table.
    pub fn names() -> impl Iterator<Item = &'static str> {
        STANDARD.iter().map(|e| e.name)
    }

    /// Looks up the spec of a game.
    pub fn get(&self, name: &str) -> Result<&EnvSpec, WebplayError> {
        self.specs
            .iter()
            .find(|s| s.name() == name)
            .ok_or_else(|| WebplayError::UnknownEnv(name.to_string()))
    }

    /// Iterates over the registered specs.
    pub fn iter(&self) -> std::slice::Iter<EnvSpec> {
        self.specs.iter()
    }

    /// Number of registered specs.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Returns `true` if no spec is registered.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{actor::ActorConfig, dummy::DummyCatalog, env::EnvWrapper, observer::Observer};
    use test_log::test;

    #[test]
    fn test_standard_registry() {
        let registry = EnvRegistry::standard(&DummyCatalog::new(64, 64));
        assert_eq!(registry.len(), 36);

        let spec = registry.get("Knightower-v0").unwrap();
        assert_eq!(spec.frame_time, Duration::from_millis(125));
        assert_eq!(spec.batch_size, 512);
        assert_eq!(spec.history_size, 1);
        assert_eq!(spec.observer.obs_size(), (16, 16, 1));
        assert!(matches!(spec.actor, ActorConfig::Key { no_hold: true, .. }));

        let spec = registry.get("DoodleJump-v0").unwrap();
        assert_eq!(spec.reward_scale, Some(1.0 / 500.0));

        let spec = registry.get("Colorpop-v0").unwrap();
        assert_eq!(spec.observer.obs_size(), (16, 16, 3));
        assert_eq!(spec.wrap, Some(EnvWrapper::Cursor));
        assert_eq!(spec.action_space().param_len(), 1 + 16);
    }

    #[test]
    fn test_unknown_env() {
        let registry = EnvRegistry::standard(&DummyCatalog::new(64, 64));
        match registry.get("Pong-v0") {
            Err(WebplayError::UnknownEnv(name)) => assert_eq!(name, "Pong-v0"),
            other => panic!("unexpected result: {:?}", other.map(|s| s.name().to_string())),
        }
    }

    #[test]
    fn test_catalog_filters_games() {
        let catalog = DummyCatalog::new(64, 64).only(&["FlappyBird-v0"]);
        let registry = EnvRegistry::standard(&catalog);
        assert_eq!(registry.len(), 1);
        assert!(registry.get("Knightower-v0").is_err());
    }
}
