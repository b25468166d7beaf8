use super::Mlp;
use anyhow::Result;
use ndarray::{Array1, Array2};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`Mlp`].
pub struct MlpConfig {
    /// Input dimension.
    pub in_dim: usize,

    /// Number of units of each hidden layer.
    pub units: Vec<usize>,

    /// Output dimension.
    pub out_dim: usize,

    /// Applies ReLU on the output.
    pub activation_out: bool,

    /// Inputs are multiplied by this value before the first layer.
    pub input_scale: f32,

    /// Initializes the last layer with zeros.
    pub zero_init_last: bool,

    /// Makes the weights of every first-layer unit sum to zero, so that a
    /// uniform screen produces no activation.
    pub center_inputs: bool,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            in_dim: 0,
            units: vec![256, 256],
            out_dim: 0,
            activation_out: false,
            input_scale: 1.0,
            zero_init_last: false,
            center_inputs: false,
        }
    }
}

impl MlpConfig {
    /// Creates a configuration with identity output and no input scaling.
    pub fn new(in_dim: usize, units: Vec<usize>, out_dim: usize) -> Self {
        Self {
            in_dim,
            units,
            out_dim,
            ..Default::default()
        }
    }

    /// Sets the input dimension.
    pub fn in_dim(mut self, v: usize) -> Self {
        self.in_dim = v;
        self
    }

    /// Sets the output dimension.
    pub fn out_dim(mut self, v: usize) -> Self {
        self.out_dim = v;
        self
    }

    /// Applies ReLU on the output.
    pub fn activation_out(mut self, v: bool) -> Self {
        self.activation_out = v;
        self
    }

    /// Sets the input scale.
    pub fn input_scale(mut self, v: f32) -> Self {
        self.input_scale = v;
        self
    }

    /// Initializes the last layer with zeros.
    pub fn zero_init_last(mut self, v: bool) -> Self {
        self.zero_init_last = v;
        self
    }

    /// Centers the weights of the first layer.
    pub fn center_inputs(mut self, v: bool) -> Self {
        self.center_inputs = v;
        self
    }

    /// Builds a randomly initialized network.
    ///
    /// Weights are drawn from `N(0, 1/in)` and biases start at zero.
    pub fn build<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Mlp> {
        let mut dims = vec![self.in_dim];
        dims.extend(&self.units);
        dims.push(self.out_dim);
        let n_layers = dims.len() - 1;

        let mut ws = Vec::with_capacity(n_layers);
        let mut bs = Vec::with_capacity(n_layers);
        for (l, pair) in dims.windows(2).enumerate() {
            let (n_in, n_out) = (pair[0], pair[1]);
            let last = l == n_layers - 1;
            let mut w = if last && self.zero_init_last {
                Array2::zeros((n_out, n_in))
            } else {
                let normal = Normal::new(0.0, 1.0 / (n_in.max(1) as f32).sqrt())?;
                Array2::from_shape_simple_fn((n_out, n_in), || normal.sample(rng))
            };
            if l == 0 && self.center_inputs && n_in > 0 {
                for mut row in w.rows_mut() {
                    let mean = row.sum() / n_in as f32;
                    row.mapv_inplace(|x| x - mean);
                }
            }
            ws.push(w);
            bs.push(Array1::zeros(n_out));
        }

        Ok(Mlp {
            input_scale: self.input_scale,
            ws,
            bs,
            activation_out: self.activation_out,
        })
    }
}
