//! Differentiable functions.
use anyhow::Result;

/// A differentiable function from an observation to a vector, with
/// enumerable parameters.
///
/// Policies map observations to action-distribution parameters; critics map
/// them to a single value estimate. Gradients are accumulated into a flat
/// buffer laid out like [`DiffFn::params`].
pub trait DiffFn: Send + Sync {
    /// Input length.
    fn in_len(&self) -> usize;

    /// Output length.
    fn out_len(&self) -> usize;

    /// Number of parameters.
    fn num_params(&self) -> usize;

    /// Flat copy of the parameters.
    fn params(&self) -> Vec<f32>;

    /// Overwrites the parameters from a flat vector.
    fn set_params(&mut self, params: &[f32]) -> Result<()>;

    /// Applies the function to one input.
    fn forward(&self, input: &[f32]) -> Vec<f32>;

    /// Back-propagates `out_grad` for `input`.
    ///
    /// Adds the gradient with respect to the parameters to `grad` and returns
    /// the gradient with respect to the input.
    fn backward(&self, input: &[f32], out_grad: &[f32], grad: &mut [f32]) -> Vec<f32>;

    /// Directional derivative of the output for `input` along `tangent`, a
    /// vector in parameter space.
    fn jvp(&self, input: &[f32], tangent: &[f32]) -> Vec<f32>;

    /// Adds `delta` to the parameters.
    fn add_to_params(&mut self, delta: &[f32]) -> Result<()> {
        let params = self
            .params()
            .iter()
            .zip(delta)
            .map(|(p, d)| p + d)
            .collect::<Vec<_>>();
        self.set_params(&params)
    }
}
