//! Shared parameters of asynchronous training.
use crate::SyncModel;
use anyhow::Result;
use std::sync::Mutex;
use webplay_agent::{Optimizer, OptimizerConfig};
use webplay_core::DiffFn;

struct State<M> {
    model: M,
    opt: Optimizer,
    version: usize,
}

/// Versioned holder of the parameters shared by actor-learner threads.
///
/// Gradients from any thread are applied one at a time under a single lock,
/// in whatever order they arrive. The server keeps its own copy of the model;
/// workers only ever see clones or synchronized local copies.
pub struct ParamServer<M> {
    state: Mutex<State<M>>,
}

impl<M> ParamServer<M>
where
    M: DiffFn + SyncModel + Clone,
{
    /// Creates a server holding `model`, updated by an optimizer built from
    /// `opt_config`.
    pub fn new(model: M, opt_config: &OptimizerConfig) -> Self {
        let opt = opt_config.build(model.num_params());
        Self {
            state: Mutex::new(State {
                model,
                opt,
                version: 0,
            }),
        }
    }

    /// Number of updates applied so far.
    pub fn version(&self) -> usize {
        self.state.lock().unwrap().version
    }

    /// Applies a gradient and returns the new version.
    pub fn apply(&self, grad: &[f32]) -> Result<usize> {
        let mut state = self.state.lock().unwrap();
        let State { model, opt, .. } = &mut *state;
        let mut params = model.params();
        opt.step(&mut params, grad)?;
        model.set_params(&params)?;
        state.version += 1;
        Ok(state.version)
    }

    /// Brings `local` up to date and returns the version it now holds.
    pub fn sync(&self, local: &mut M) -> Result<usize> {
        let state = self.state.lock().unwrap();
        local.sync_model(&state.model.model_info())?;
        Ok(state.version)
    }

    /// Clones the current model together with its version.
    pub fn snapshot(&self) -> (usize, M) {
        let state = self.state.lock().unwrap();
        (state.version, state.model.clone())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::{rngs::SmallRng, SeedableRng};
    use std::sync::Arc;
    use test_log::test;
    use webplay_agent::{AgentConfig, Mlp};
    use webplay_core::ActionSpace;

    fn policy() -> Mlp {
        AgentConfig::default()
            .units(vec![3])
            .new_policy(2, &ActionSpace::Bernoulli { dim: 1 }, &mut SmallRng::seed_from_u64(0))
            .unwrap()
    }

    #[test]
    fn test_concurrent_updates_are_all_applied() -> Result<()> {
        let policy = policy();
        let n = policy.num_params();
        let lr = 0.5;
        // Plain gradient steps of a constant gradient commute.
        let server = Arc::new(ParamServer::new(
            policy.clone(),
            &OptimizerConfig::RmsProp {
                lr,
                decay: 0.0,
                eps: 0.0,
            },
        ));

        std::thread::scope(|s| {
            for _ in 0..4 {
                let server = server.clone();
                s.spawn(move || {
                    for _ in 0..25 {
                        server.apply(&vec![1.0; n]).unwrap();
                    }
                });
            }
        });

        let (version, model) = server.snapshot();
        assert_eq!(version, 100);
        for (p, p0) in model.params().iter().zip(policy.params()) {
            assert!((p - (p0 - 100.0 * lr)).abs() < 1e-3);
        }
        Ok(())
    }

    #[test]
    fn test_sync_copies_parameters() -> Result<()> {
        let server = ParamServer::new(policy(), &OptimizerConfig::adam(1e-2));
        let n = server.snapshot().1.num_params();
        server.apply(&vec![0.3; n])?;

        let mut local = policy();
        assert_eq!(server.sync(&mut local)?, 1);
        assert_eq!(local, server.snapshot().1);
        assert!(server.apply(&[0.0]).is_err());
        assert_eq!(server.version(), 1);
        Ok(())
    }
}
