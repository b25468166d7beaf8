//! Parametric action distributions.
//!
//! A policy outputs a parameter vector; an [`ActionSpace`] turns it into a
//! distribution over action vectors. Every family provides sampling,
//! log-likelihood, KL divergence and entropy, together with their derivatives
//! with respect to the parameters, which is all a policy-gradient optimizer
//! needs from the distribution.
//!
//! Parameter conventions:
//!
//! * `Bernoulli { dim }`: one logit per dimension; samples are `0.0` or `1.0`.
//! * `Categorical { options }`: one logit per option; samples are one-hot.
//! * `Gaussian { dim }`: `dim` means followed by `dim` log standard deviations.
//! * `Tuple { spaces }`: concatenation of the sub-spaces' parameters and samples.
use crate::error::WebplayError;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// A parametric distribution family over action vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionSpace {
    /// Independent binary variables.
    Bernoulli {
        /// Number of binary variables.
        dim: usize,
    },

    /// A single choice among mutually exclusive options.
    Categorical {
        /// Number of options.
        options: usize,
    },

    /// Diagonal Gaussian.
    Gaussian {
        /// Dimension of the samples.
        dim: usize,
    },

    /// Independent composite of heterogeneous sub-spaces.
    Tuple {
        /// Sub-spaces in the order their parameters and samples are laid out.
        spaces: Vec<ActionSpace>,
    },
}

impl ActionSpace {
    /// Length of a parameter vector.
    pub fn param_len(&self) -> usize {
        match self {
            Self::Bernoulli { dim } => *dim,
            Self::Categorical { options } => *options,
            Self::Gaussian { dim } => 2 * dim,
            Self::Tuple { spaces } => spaces.iter().map(|s| s.param_len()).sum(),
        }
    }

    /// Length of a sample vector.
    pub fn sample_len(&self) -> usize {
        match self {
            Self::Bernoulli { dim } => *dim,
            Self::Categorical { options } => *options,
            Self::Gaussian { dim } => *dim,
            Self::Tuple { spaces } => spaces.iter().map(|s| s.sample_len()).sum(),
        }
    }

    /// Parameter sizes of the sub-spaces of a tuple, or of the space itself.
    pub fn param_sizes(&self) -> Vec<usize> {
        match self {
            Self::Tuple { spaces } => spaces.iter().map(|s| s.param_len()).collect(),
            _ => vec![self.param_len()],
        }
    }

    /// Sample sizes of the sub-spaces of a tuple, or of the space itself.
    pub fn sample_sizes(&self) -> Vec<usize> {
        match self {
            Self::Tuple { spaces } => spaces.iter().map(|s| s.sample_len()).collect(),
            _ => vec![self.sample_len()],
        }
    }

    /// Checks the length of a parameter vector.
    pub fn check_params(&self, params: &[f32]) -> Result<(), WebplayError> {
        check_len(self.param_len(), params.len())
    }

    /// Checks the length of a sample vector.
    pub fn check_sample(&self, sample: &[f32]) -> Result<(), WebplayError> {
        check_len(self.sample_len(), sample.len())
    }

    /// Draws an action from the distribution.
    pub fn sample<R: Rng + ?Sized>(&self, params: &[f32], rng: &mut R) -> Vec<f32> {
        debug_assert_eq!(params.len(), self.param_len());
        match self {
            Self::Bernoulli { .. } => params
                .iter()
                .map(|&l| {
                    if rng.gen::<f32>() < sigmoid(l) {
                        1.0
                    } else {
                        0.0
                    }
                })
                .collect(),
            Self::Categorical { options } => {
                let probs = softmax(params);
                let u = rng.gen::<f32>();
                let mut acc = 0.0;
                let mut choice = options - 1;
                for (i, p) in probs.iter().enumerate() {
                    acc += p;
                    if u < acc {
                        choice = i;
                        break;
                    }
                }
                one_hot(*options, choice)
            }
            Self::Gaussian { dim } => (0..*dim)
                .map(|i| {
                    let eps: f32 = rng.sample(StandardNormal);
                    params[i] + params[dim + i].exp() * eps
                })
                .collect(),
            Self::Tuple { spaces } => {
                let mut out = Vec::with_capacity(self.sample_len());
                for (s, p) in spaces.iter().zip(split(params, &self.param_sizes())) {
                    out.extend(s.sample(p, rng));
                }
                out
            }
        }
    }

    /// Log-likelihood of `action` under `params`.
    pub fn log_prob(&self, params: &[f32], action: &[f32]) -> f32 {
        debug_assert_eq!(params.len(), self.param_len());
        debug_assert_eq!(action.len(), self.sample_len());
        match self {
            Self::Bernoulli { .. } => params
                .iter()
                .zip(action)
                .map(|(&l, &x)| x * l - softplus(l))
                .sum(),
            Self::Categorical { .. } => {
                let lse = log_sum_exp(params);
                params.iter().zip(action).map(|(&l, &x)| x * (l - lse)).sum()
            }
            Self::Gaussian { dim } => (0..*dim)
                .map(|i| {
                    let (mean, log_std) = (params[i], params[dim + i]);
                    let z = (action[i] - mean) / log_std.exp();
                    -0.5 * z * z - log_std - 0.5 * (2.0 * PI).ln()
                })
                .sum(),
            Self::Tuple { spaces } => spaces
                .iter()
                .zip(split(params, &self.param_sizes()))
                .zip(split(action, &self.sample_sizes()))
                .map(|((s, p), a)| s.log_prob(p, a))
                .sum(),
        }
    }

    /// Gradient of [`log_prob`](Self::log_prob) with respect to `params`.
    pub fn log_prob_grad(&self, params: &[f32], action: &[f32]) -> Vec<f32> {
        match self {
            Self::Bernoulli { .. } => params
                .iter()
                .zip(action)
                .map(|(&l, &x)| x - sigmoid(l))
                .collect(),
            Self::Categorical { .. } => {
                let probs = softmax(params);
                let total: f32 = action.iter().sum();
                probs
                    .iter()
                    .zip(action)
                    .map(|(p, x)| x - total * p)
                    .collect()
            }
            Self::Gaussian { dim } => {
                let mut grad = vec![0.0; 2 * dim];
                for i in 0..*dim {
                    let (mean, log_std) = (params[i], params[dim + i]);
                    let var = (2.0 * log_std).exp();
                    let diff = action[i] - mean;
                    grad[i] = diff / var;
                    grad[dim + i] = diff * diff / var - 1.0;
                }
                grad
            }
            Self::Tuple { spaces } => spaces
                .iter()
                .zip(split(params, &self.param_sizes()))
                .zip(split(action, &self.sample_sizes()))
                .flat_map(|((s, p), a)| s.log_prob_grad(p, a))
                .collect(),
        }
    }

    /// KL divergence `KL(old || new)`.
    pub fn kl(&self, old: &[f32], new: &[f32]) -> f32 {
        debug_assert_eq!(old.len(), self.param_len());
        debug_assert_eq!(new.len(), self.param_len());
        match self {
            Self::Bernoulli { .. } => old
                .iter()
                .zip(new)
                .map(|(&l0, &l1)| {
                    let p0 = sigmoid(l0);
                    p0 * (log_sigmoid(l0) - log_sigmoid(l1))
                        + (1.0 - p0) * (log_sigmoid(-l0) - log_sigmoid(-l1))
                })
                .sum(),
            Self::Categorical { .. } => {
                let (lse0, lse1) = (log_sum_exp(old), log_sum_exp(new));
                old.iter()
                    .zip(new)
                    .map(|(&l0, &l1)| {
                        let lp0 = l0 - lse0;
                        lp0.exp() * (lp0 - (l1 - lse1))
                    })
                    .sum()
            }
            Self::Gaussian { dim } => (0..*dim)
                .map(|i| {
                    let (m0, s0) = (old[i], old[dim + i]);
                    let (m1, s1) = (new[i], new[dim + i]);
                    let var0 = (2.0 * s0).exp();
                    let var1 = (2.0 * s1).exp();
                    s1 - s0 + (var0 + (m0 - m1).powi(2)) / (2.0 * var1) - 0.5
                })
                .sum(),
            Self::Tuple { spaces } => {
                let sizes = self.param_sizes();
                spaces
                    .iter()
                    .zip(split(old, &sizes))
                    .zip(split(new, &sizes))
                    .map(|((s, o), n)| s.kl(o, n))
                    .sum()
            }
        }
    }

    /// Gradient of [`kl`](Self::kl) with respect to `new`.
    pub fn kl_grad(&self, old: &[f32], new: &[f32]) -> Vec<f32> {
        match self {
            Self::Bernoulli { .. } => old
                .iter()
                .zip(new)
                .map(|(&l0, &l1)| sigmoid(l1) - sigmoid(l0))
                .collect(),
            Self::Categorical { .. } => softmax(new)
                .iter()
                .zip(softmax(old))
                .map(|(p1, p0)| p1 - p0)
                .collect(),
            Self::Gaussian { dim } => {
                let mut grad = vec![0.0; 2 * dim];
                for i in 0..*dim {
                    let (m0, s0) = (old[i], old[dim + i]);
                    let (m1, s1) = (new[i], new[dim + i]);
                    let var0 = (2.0 * s0).exp();
                    let var1 = (2.0 * s1).exp();
                    grad[i] = (m1 - m0) / var1;
                    grad[dim + i] = 1.0 - (var0 + (m0 - m1).powi(2)) / var1;
                }
                grad
            }
            Self::Tuple { spaces } => {
                let sizes = self.param_sizes();
                spaces
                    .iter()
                    .zip(split(old, &sizes))
                    .zip(split(new, &sizes))
                    .flat_map(|((s, o), n)| s.kl_grad(o, n))
                    .collect()
            }
        }
    }

    /// Entropy of the distribution.
    pub fn entropy(&self, params: &[f32]) -> f32 {
        debug_assert_eq!(params.len(), self.param_len());
        match self {
            Self::Bernoulli { .. } => params.iter().map(|&l| softplus(l) - sigmoid(l) * l).sum(),
            Self::Categorical { .. } => {
                let lse = log_sum_exp(params);
                -params
                    .iter()
                    .map(|&l| {
                        let lp = l - lse;
                        lp.exp() * lp
                    })
                    .sum::<f32>()
            }
            Self::Gaussian { dim } => (0..*dim)
                .map(|i| params[dim + i] + 0.5 * (1.0 + (2.0 * PI).ln()))
                .sum(),
            Self::Tuple { spaces } => spaces
                .iter()
                .zip(split(params, &self.param_sizes()))
                .map(|(s, p)| s.entropy(p))
                .sum(),
        }
    }

    /// Gradient of [`entropy`](Self::entropy) with respect to `params`.
    pub fn entropy_grad(&self, params: &[f32]) -> Vec<f32> {
        match self {
            Self::Bernoulli { .. } => params
                .iter()
                .map(|&l| {
                    let p = sigmoid(l);
                    -l * p * (1.0 - p)
                })
                .collect(),
            Self::Categorical { .. } => {
                let lse = log_sum_exp(params);
                let log_probs = params.iter().map(|l| l - lse).collect::<Vec<_>>();
                let h = -log_probs.iter().map(|lp| lp.exp() * lp).sum::<f32>();
                log_probs.iter().map(|lp| -lp.exp() * (lp + h)).collect()
            }
            Self::Gaussian { dim } => {
                let mut grad = vec![0.0; 2 * dim];
                grad[*dim..].iter_mut().for_each(|g| *g = 1.0);
                grad
            }
            Self::Tuple { spaces } => spaces
                .iter()
                .zip(split(params, &self.param_sizes()))
                .flat_map(|(s, p)| s.entropy_grad(p))
                .collect(),
        }
    }

    /// Product of the Fisher information matrix at `params` with `v`.
    ///
    /// This is the Hessian of `KL(params || x)` with respect to `x` at
    /// `x == params`.
    pub fn fisher_product(&self, params: &[f32], v: &[f32]) -> Vec<f32> {
        debug_assert_eq!(v.len(), self.param_len());
        match self {
            Self::Bernoulli { .. } => params
                .iter()
                .zip(v)
                .map(|(&l, &v)| {
                    let p = sigmoid(l);
                    p * (1.0 - p) * v
                })
                .collect(),
            Self::Categorical { .. } => {
                let probs = softmax(params);
                let dot: f32 = probs.iter().zip(v).map(|(p, v)| p * v).sum();
                probs.iter().zip(v).map(|(p, v)| p * (v - dot)).collect()
            }
            Self::Gaussian { dim } => {
                let mut out = vec![0.0; 2 * dim];
                for i in 0..*dim {
                    out[i] = v[i] / (2.0 * params[dim + i]).exp();
                    out[dim + i] = 2.0 * v[dim + i];
                }
                out
            }
            Self::Tuple { spaces } => {
                let sizes = self.param_sizes();
                spaces
                    .iter()
                    .zip(split(params, &sizes))
                    .zip(split(v, &sizes))
                    .flat_map(|((s, p), v)| s.fisher_product(p, v))
                    .collect()
            }
        }
    }
}

fn check_len(expected: usize, actual: usize) -> Result<(), WebplayError> {
    if expected == actual {
        Ok(())
    } else {
        Err(WebplayError::ParamLen { expected, actual })
    }
}

/// Splits `v` into consecutive chunks of the given sizes.
fn split<'a>(v: &'a [f32], sizes: &[usize]) -> Vec<&'a [f32]> {
    let mut out = Vec::with_capacity(sizes.len());
    let mut start = 0;
    for &n in sizes {
        out.push(&v[start..start + n]);
        start += n;
    }
    out
}

/// One-hot vector of length `n` with a `1.0` at `i`.
pub(crate) fn one_hot(n: usize, i: usize) -> Vec<f32> {
    let mut v = vec![0.0; n];
    v[i] = 1.0;
    v
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// `ln(1 + e^x)`, stable for large `|x|`.
fn softplus(x: f32) -> f32 {
    if x > 0.0 {
        x + (-x).exp().ln_1p()
    } else {
        x.exp().ln_1p()
    }
}

fn log_sigmoid(x: f32) -> f32 {
    -softplus(-x)
}

fn log_sum_exp(xs: &[f32]) -> f32 {
    let max = xs.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    max + xs.iter().map(|x| (x - max).exp()).sum::<f32>().ln()
}

fn softmax(xs: &[f32]) -> Vec<f32> {
    let lse = log_sum_exp(xs);
    xs.iter().map(|x| (x - lse).exp()).collect()
}
