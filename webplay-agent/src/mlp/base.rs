use anyhow::{bail, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use webplay_core::{error::WebplayError, DiffFn};

/// Multilayer perceptron with ReLU activation function.
///
/// Parameters are laid out layer by layer, each layer as its row-major
/// weight matrix `(out, in)` followed by its bias.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Mlp {
    pub(super) input_scale: f32,

    /// Weights of layers.
    pub(super) ws: Vec<Array2<f32>>,

    /// Biases of layers.
    pub(super) bs: Vec<Array1<f32>>,

    pub(super) activation_out: bool,
}

impl Mlp {
    /// Number of dense layers.
    pub fn num_layers(&self) -> usize {
        self.ws.len()
    }

    /// Input scale.
    pub fn input_scale(&self) -> f32 {
        self.input_scale
    }

    fn relu_at(&self, l: usize) -> bool {
        l + 1 < self.ws.len() || self.activation_out
    }

    /// Outputs of every layer, starting with the scaled input.
    fn activations(&self, input: &[f32]) -> Vec<Array1<f32>> {
        let mut acts = Vec::with_capacity(self.ws.len() + 1);
        let mut x = Array1::from(input.to_vec()) * self.input_scale;
        for (l, (w, b)) in self.ws.iter().zip(&self.bs).enumerate() {
            let mut z = w.dot(&x) + b;
            if self.relu_at(l) {
                z.mapv_inplace(|v| v.max(0.0));
            }
            acts.push(x);
            x = z;
        }
        acts.push(x);
        acts
    }

    /// Directional derivative of the output when the parameters move along
    /// `tangent` and the input moves along `input_tangent`.
    pub fn jvp_with_input(&self, input: &[f32], input_tangent: &[f32], tangent: &[f32]) -> Vec<f32> {
        let mut x = Array1::from(input.to_vec()) * self.input_scale;
        let mut dx = Array1::from(input_tangent.to_vec()) * self.input_scale;
        let mut off = 0;
        for (l, (w, b)) in self.ws.iter().zip(&self.bs).enumerate() {
            let (n_out, n_in) = w.dim();
            let dw = &tangent[off..off + n_out * n_in];
            let db = &tangent[off + n_out * n_in..off + n_out * n_in + n_out];
            off += n_out * n_in + n_out;

            let mut z = w.dot(&x) + b;
            let mut dz = w.dot(&dx);
            for i in 0..n_out {
                let row = &dw[i * n_in..(i + 1) * n_in];
                dz[i] += row.iter().zip(x.iter()).map(|(a, b)| a * b).sum::<f32>() + db[i];
            }
            if self.relu_at(l) {
                z.mapv_inplace(|v| v.max(0.0));
                dz.zip_mut_with(&z, |d, &a| {
                    if a <= 0.0 {
                        *d = 0.0
                    }
                });
            }
            x = z;
            dx = dz;
        }
        dx.to_vec()
    }

    /// Splits the network into a trunk made of all but the last layer and a
    /// head made of the last layer.
    pub fn split_last(&self) -> Result<(Mlp, Mlp)> {
        let n = self.ws.len();
        if n < 2 {
            bail!("cannot split a network of {} layer(s)", n);
        }
        let base = Mlp {
            input_scale: self.input_scale,
            ws: self.ws[..n - 1].to_vec(),
            bs: self.bs[..n - 1].to_vec(),
            activation_out: true,
        };
        let head = Mlp {
            input_scale: 1.0,
            ws: vec![self.ws[n - 1].clone()],
            bs: vec![self.bs[n - 1].clone()],
            activation_out: self.activation_out,
        };
        Ok((base, head))
    }

    /// Stacks `head` on top of `base`; the inverse of [`Mlp::split_last`].
    pub fn join(base: &Mlp, head: &Mlp) -> Result<Mlp> {
        if !base.activation_out || head.input_scale != 1.0 {
            bail!("networks cannot be joined without changing their function");
        }
        if base.out_len() != head.in_len() {
            return Err(WebplayError::LayerMismatch {
                expected: vec![base.out_len()],
                actual: vec![head.in_len()],
            }
            .into());
        }
        let mut ws = base.ws.clone();
        ws.extend(head.ws.iter().cloned());
        let mut bs = base.bs.clone();
        bs.extend(head.bs.iter().cloned());
        Ok(Mlp {
            input_scale: base.input_scale,
            ws,
            bs,
            activation_out: head.activation_out,
        })
    }
}

impl DiffFn for Mlp {
    fn in_len(&self) -> usize {
        self.ws.first().map(|w| w.ncols()).unwrap_or(0)
    }

    fn out_len(&self) -> usize {
        self.ws.last().map(|w| w.nrows()).unwrap_or(0)
    }

    fn num_params(&self) -> usize {
        self.ws.iter().map(|w| w.len()).sum::<usize>() + self.bs.iter().map(|b| b.len()).sum::<usize>()
    }

    fn params(&self) -> Vec<f32> {
        let mut params = Vec::with_capacity(self.num_params());
        for (w, b) in self.ws.iter().zip(&self.bs) {
            params.extend(w.iter());
            params.extend(b.iter());
        }
        params
    }

    fn set_params(&mut self, params: &[f32]) -> Result<()> {
        if params.len() != self.num_params() {
            return Err(WebplayError::ParamLen {
                expected: self.num_params(),
                actual: params.len(),
            }
            .into());
        }
        let mut src = params.iter();
        for (w, b) in self.ws.iter_mut().zip(self.bs.iter_mut()) {
            w.iter_mut().chain(b.iter_mut()).zip(&mut src).for_each(|(p, v)| *p = *v);
        }
        Ok(())
    }

    fn forward(&self, input: &[f32]) -> Vec<f32> {
        self.activations(input)
            .pop()
            .map(|y| y.to_vec())
            .unwrap_or_default()
    }

    fn backward(&self, input: &[f32], out_grad: &[f32], grad: &mut [f32]) -> Vec<f32> {
        let acts = self.activations(input);

        // Offset of each layer in the flat parameter vector.
        let mut offsets = Vec::with_capacity(self.ws.len());
        let mut off = 0;
        for (w, b) in self.ws.iter().zip(&self.bs) {
            offsets.push(off);
            off += w.len() + b.len();
        }

        let mut delta = Array1::from(out_grad.to_vec());
        for l in (0..self.ws.len()).rev() {
            if self.relu_at(l) {
                delta.zip_mut_with(&acts[l + 1], |d, &a| {
                    if a <= 0.0 {
                        *d = 0.0
                    }
                });
            }
            let w = &self.ws[l];
            let x = &acts[l];
            let (n_out, n_in) = w.dim();
            let off = offsets[l];
            for i in 0..n_out {
                let d = delta[i];
                if d == 0.0 {
                    continue;
                }
                let row = &mut grad[off + i * n_in..off + (i + 1) * n_in];
                row.iter_mut().zip(x.iter()).for_each(|(g, &xj)| *g += d * xj);
                grad[off + n_out * n_in + i] += d;
            }
            delta = w.t().dot(&delta);
        }
        (delta * self.input_scale).to_vec()
    }

    fn jvp(&self, input: &[f32], tangent: &[f32]) -> Vec<f32> {
        self.jvp_with_input(input, &vec![0.0; input.len()], tangent)
    }
}

#[cfg(test)]
mod test {
    use super::super::MlpConfig;
    use super::*;
    use rand::{rngs::SmallRng, SeedableRng};

    fn mlp() -> Mlp {
        let mut rng = SmallRng::seed_from_u64(7);
        MlpConfig::new(5, vec![6, 4], 3)
            .input_scale(0.5)
            .build(&mut rng)
            .unwrap()
    }

    fn loss(m: &Mlp, x: &[f32], c: &[f32]) -> f32 {
        m.forward(x).iter().zip(c).map(|(y, c)| y * c).sum()
    }

    #[test]
    fn test_backward_matches_finite_differences() {
        let mut m = mlp();
        // Biases keep the ReLUs away from their kinks.
        let mut p = m.params();
        for (i, v) in p.iter_mut().enumerate() {
            if i % 7 == 3 {
                *v += 0.1;
            }
        }
        m.set_params(&p).unwrap();

        let x = [0.3, -0.2, 1.0, 0.7, -0.9];
        let c = [1.0, -0.5, 2.0];
        let mut grad = vec![0.0; m.num_params()];
        let in_grad = m.backward(&x, &c, &mut grad);

        let eps = 1e-3;
        for i in 0..p.len() {
            let mut m1 = m.clone();
            let mut q = p.clone();
            q[i] += eps;
            m1.set_params(&q).unwrap();
            let up = loss(&m1, &x, &c);
            q[i] -= 2.0 * eps;
            m1.set_params(&q).unwrap();
            let down = loss(&m1, &x, &c);
            let fd = (up - down) / (2.0 * eps);
            assert!((fd - grad[i]).abs() < 1e-2, "param {}: {} vs {}", i, fd, grad[i]);
        }
        for j in 0..x.len() {
            let mut x1 = x;
            x1[j] += eps;
            let up = loss(&m, &x1, &c);
            x1[j] -= 2.0 * eps;
            let down = loss(&m, &x1, &c);
            let fd = (up - down) / (2.0 * eps);
            assert!((fd - in_grad[j]).abs() < 1e-2);
        }
    }

    #[test]
    fn test_jvp_is_consistent_with_backward() {
        let m = mlp();
        let x = [0.1, 0.2, -0.3, 0.4, 0.5];
        let tangent = (0..m.num_params())
            .map(|i| ((i * 37) % 11) as f32 / 11.0 - 0.5)
            .collect::<Vec<_>>();
        let jv = m.jvp(&x, &tangent);
        // <c, J v> == <J^T c, v>
        let c = [0.3, -1.0, 0.8];
        let mut jtc = vec![0.0; m.num_params()];
        m.backward(&x, &c, &mut jtc);
        let lhs: f32 = c.iter().zip(&jv).map(|(a, b)| a * b).sum();
        let rhs: f32 = jtc.iter().zip(&tangent).map(|(a, b)| a * b).sum();
        assert!((lhs - rhs).abs() < 1e-4);
    }

    #[test]
    fn test_split_then_join_preserves_function() {
        let m = mlp();
        let (base, head) = m.split_last().unwrap();
        assert_eq!(base.num_layers(), 2);
        assert_eq!(head.num_layers(), 1);
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(head.forward(&base.forward(&x)), m.forward(&x));
        assert_eq!(Mlp::join(&base, &head).unwrap(), m);
    }

    #[test]
    fn test_join_rejects_mismatched_widths() {
        let (base, _) = mlp().split_last().unwrap();
        let mut rng = SmallRng::seed_from_u64(1);
        let other = MlpConfig::new(5, vec![7], 3).build(&mut rng).unwrap();
        let (_, head) = other.split_last().unwrap();
        let err = Mlp::join(&base, &head).unwrap_err();
        match err.downcast_ref::<WebplayError>() {
            Some(WebplayError::LayerMismatch { expected, actual }) => {
                assert_eq!(expected, &vec![4]);
                assert_eq!(actual, &vec![7]);
            }
            _ => panic!("unexpected error: {}", err),
        }
    }

    #[test]
    fn test_centered_inputs_ignore_solid_screens() {
        let mut rng = SmallRng::seed_from_u64(1);
        let m = MlpConfig::new(8, vec![4], 2)
            .center_inputs(true)
            .build(&mut rng)
            .unwrap();
        let dark = m.forward(&[0.0; 8]);
        let bright = m.forward(&[200.0; 8]);
        for (a, b) in dark.iter().zip(&bright) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn test_set_params_checks_length() {
        let mut m = mlp();
        assert!(m.set_params(&[0.0; 3]).is_err());
    }
}
