//! Optimizers.
use anyhow::Result;
use serde::{Deserialize, Serialize};
use webplay_core::error::WebplayError;

/// Configures a first-order optimizer over a flat parameter vector.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum OptimizerConfig {
    /// Adam optimizer.
    Adam {
        /// Learning rate.
        lr: f32,
        beta1: f32,
        beta2: f32,
        eps: f32,
    },

    /// RMSProp optimizer.
    RmsProp {
        /// Learning rate.
        lr: f32,
        /// Decay of the running mean of squared gradients.
        decay: f32,
        eps: f32,
    },
}

impl OptimizerConfig {
    /// Adam with the usual betas.
    pub fn adam(lr: f32) -> Self {
        Self::Adam {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
        }
    }

    /// RMSProp with the given decay.
    pub fn rms_prop(lr: f32, decay: f32) -> Self {
        Self::RmsProp {
            lr,
            decay,
            eps: 1e-8,
        }
    }

    /// Learning rate.
    pub fn lr(&self) -> f32 {
        match self {
            Self::Adam { lr, .. } | Self::RmsProp { lr, .. } => *lr,
        }
    }

    /// Returns a copy with another learning rate.
    pub fn with_lr(&self, v: f32) -> Self {
        let mut config = self.clone();
        match &mut config {
            Self::Adam { lr, .. } | Self::RmsProp { lr, .. } => *lr = v,
        }
        config
    }

    /// Constructs an optimizer for `num_params` parameters.
    pub fn build(&self, num_params: usize) -> Optimizer {
        let state = match self {
            Self::Adam { .. } => State::Adam {
                m: vec![0.0; num_params],
                v: vec![0.0; num_params],
                t: 0,
            },
            Self::RmsProp { .. } => State::RmsProp {
                s: vec![0.0; num_params],
            },
        };
        Optimizer {
            config: self.clone(),
            state,
        }
    }
}

#[derive(Debug, Clone)]
enum State {
    Adam { m: Vec<f32>, v: Vec<f32>, t: i32 },
    RmsProp { s: Vec<f32> },
}

/// Optimizer holding its running statistics.
#[derive(Debug, Clone)]
pub struct Optimizer {
    config: OptimizerConfig,
    state: State,
}

impl Optimizer {
    /// Configuration of the optimizer.
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Number of parameters the optimizer was built for.
    pub fn num_params(&self) -> usize {
        match &self.state {
            State::Adam { m, .. } => m.len(),
            State::RmsProp { s } => s.len(),
        }
    }

    /// Applies one descent step along `grad`, the gradient of a loss.
    pub fn step(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()> {
        let n = self.num_params();
        for len in [params.len(), grad.len()] {
            if len != n {
                return Err(WebplayError::ParamLen {
                    expected: n,
                    actual: len,
                }
                .into());
            }
        }

        match (&self.config, &mut self.state) {
            (
                OptimizerConfig::Adam {
                    lr,
                    beta1,
                    beta2,
                    eps,
                },
                State::Adam { m, v, t },
            ) => {
                *t += 1;
                let c1 = 1.0 - beta1.powi(*t);
                let c2 = 1.0 - beta2.powi(*t);
                for i in 0..n {
                    m[i] = beta1 * m[i] + (1.0 - beta1) * grad[i];
                    v[i] = beta2 * v[i] + (1.0 - beta2) * grad[i] * grad[i];
                    let m_hat = m[i] / c1;
                    let v_hat = v[i] / c2;
                    params[i] -= lr * m_hat / (v_hat.sqrt() + eps);
                }
            }
            (OptimizerConfig::RmsProp { lr, decay, eps }, State::RmsProp { s }) => {
                for i in 0..n {
                    s[i] = decay * s[i] + (1.0 - decay) * grad[i] * grad[i];
                    params[i] -= lr * grad[i] / (s[i].sqrt() + eps);
                }
            }
            _ => unreachable!("optimizer state does not match its configuration"),
        }
        Ok(())
    }
}
