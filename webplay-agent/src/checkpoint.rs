//! Saving and loading trained networks.
use crate::{
    agent::{Agent, AgentConfig},
    mlp::Mlp,
};
use anyhow::{Context, Result};
use log::{info, warn};
use rand::Rng;
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};
use webplay_core::{ActionSpace, DiffFn};

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Serializes `value` to `path`, replacing any previous file only once the
/// new one is fully written.
pub fn save<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    let tmp = tmp_path(path);
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        bincode::serialize_into(&mut writer, value)?;
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Deserializes a value saved with [`save`].
pub fn load<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let reader = BufReader::new(File::open(path)?);
    Ok(bincode::deserialize_from(reader)?)
}

/// Loads `path` if it holds a value accepted by `valid`, otherwise creates a
/// new one with `create`. `what` names the value in the log.
pub fn load_or_create<T, V, F>(path: impl AsRef<Path>, what: &str, valid: V, create: F) -> Result<T>
where
    T: DeserializeOwned,
    V: FnOnce(&T) -> bool,
    F: FnOnce() -> Result<T>,
{
    let path = path.as_ref();
    if path.exists() {
        match load::<T>(path) {
            Ok(value) if valid(&value) => {
                info!("Loaded {}.", what);
                return Ok(value);
            }
            Ok(_) => warn!("{} in {:?} does not fit the environment", what, path),
            Err(e) => warn!("could not read {} from {:?}: {}", what, path, e),
        }
    }
    info!("Creating new {}...", what);
    create()
}

/// Loads the policy at `path` or creates one for the given observation
/// length and action space.
pub fn load_or_make_policy<R: Rng + ?Sized>(
    path: impl AsRef<Path>,
    config: &AgentConfig,
    obs_len: usize,
    space: &ActionSpace,
    rng: &mut R,
) -> Result<Mlp> {
    load_or_create(
        path,
        "policy",
        |p: &Mlp| p.in_len() == obs_len && p.out_len() == space.param_len(),
        || config.new_policy(obs_len, space, rng),
    )
    .context("load policy")
}

/// Loads or creates a policy and a critic and assembles them into an agent.
pub fn load_or_make_agent<R: Rng + ?Sized>(
    policy_path: impl AsRef<Path>,
    critic_path: impl AsRef<Path>,
    config: &AgentConfig,
    obs_len: usize,
    space: &ActionSpace,
    rng: &mut R,
) -> Result<Agent> {
    let policy = load_or_make_policy(policy_path, config, obs_len, space, rng)?;
    let features = policy.split_last()?.0.out_len();
    let critic = load_or_create(
        critic_path,
        "critic",
        |c: &Mlp| c.in_len() == features && c.out_len() == 1,
        || config.clone().units(vec![features]).new_critic(rng),
    )
    .context("load critic")?;
    Agent::from_parts(&policy, critic, space.clone())
}

/// Saves the policy and critic of an agent.
pub fn save_agent(
    agent: &Agent,
    policy_path: impl AsRef<Path>,
    critic_path: impl AsRef<Path>,
) -> Result<()> {
    let (policy, critic) = agent.decompose()?;
    save(policy_path, &policy).context("save policy")?;
    save(critic_path, &critic).context("save critic")?;
    Ok(())
}
