//! Conjugate gradient solver and backtracking line search.
use crate::util::{axpy, dot};
use anyhow::Result;
use log::info;

/// Solves `A x = b` for a symmetric positive definite `A` given as a
/// matrix-vector product, running at most `iters` iterations.
pub fn conjugate_gradient<F>(mut mat_vec: F, b: &[f32], iters: usize, residual_tol: f32) -> Result<Vec<f32>>
where
    F: FnMut(&[f32]) -> Result<Vec<f32>>,
{
    let mut x = vec![0.0; b.len()];
    // b - Ax where x = 0
    let mut residual = b.to_vec();
    let mut step = b.to_vec();
    let mut residual_norm_sq = dot(&residual, &residual);

    for _ in 0..iters {
        if residual_norm_sq < residual_tol {
            break;
        }
        let z = mat_vec(&step)?;
        let curvature = dot(&step, &z);
        if curvature <= 0.0 || !curvature.is_finite() {
            break;
        }
        let alpha = residual_norm_sq / curvature;
        axpy(alpha, &step, &mut x);
        axpy(-alpha, &z, &mut residual);

        let new_norm_sq = dot(&residual, &residual);
        let mu = new_norm_sq / residual_norm_sq;
        step.iter_mut()
            .zip(&residual)
            .for_each(|(s, r)| *s = r + mu * *s);
        residual_norm_sq = new_norm_sq;
    }
    Ok(x)
}

/// Parameters of [`line_search`].
#[derive(Debug, Clone, PartialEq)]
pub struct LineSearch {
    /// Largest acceptable KL divergence from the current policy.
    pub max_kl: f32,

    /// Number of step sizes tried.
    pub max_backtracks: usize,

    /// Factor applied to the step between two trials.
    pub backtrack_ratio: f32,
}

/// Searches `params + ratio^k * full_step` for `k = 0, 1, ...` and stops at
/// the first candidate whose KL divergence stays within `max_kl` and whose
/// improvement of the objective is non-negative.
///
/// `eval` maps a candidate to `(kl, improvement)`. On success `params` is
/// overwritten with the accepted candidate and `true` is returned. When no
/// candidate qualifies, `params` is left untouched and `false` is returned.
pub fn line_search<F>(
    params: &mut [f32],
    full_step: &[f32],
    search: &LineSearch,
    mut eval: F,
) -> Result<bool>
where
    F: FnMut(&[f32]) -> Result<(f32, f32)>,
{
    let mut ratio = 1.0;
    for _ in 0..search.max_backtracks {
        let mut candidate = params.to_vec();
        axpy(ratio, full_step, &mut candidate);
        let (kl, improvement) = eval(&candidate)?;
        info!("line search: kl={} improvement={}", kl, improvement);
        if kl.is_finite() && kl <= search.max_kl && improvement >= 0.0 {
            params.copy_from_slice(&candidate);
            return Ok(true);
        }
        ratio *= search.backtrack_ratio;
    }
    Ok(false)
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn test_cg_solves_spd_system() {
        let a = [[4.0, 1.0, 0.0], [1.0, 3.0, 0.5], [0.0, 0.5, 2.0]];
        let b = [1.0, 2.0, 3.0];
        let mat_vec = |v: &[f32]| -> Result<Vec<f32>> {
            Ok(a.iter().map(|row| dot(row, v)).collect())
        };
        let x = conjugate_gradient(mat_vec, &b, 10, 1e-10).unwrap();
        let ax = mat_vec(&x).unwrap();
        for (l, r) in ax.iter().zip(&b) {
            assert!((l - r).abs() < 1e-4);
        }
    }

    #[test]
    fn test_line_search_backtracks() {
        let mut params = vec![0.0, 0.0];
        let search = LineSearch {
            max_kl: 0.3,
            max_backtracks: 10,
            backtrack_ratio: 0.5,
        };
        // kl grows with the squared step length.
        let ok = line_search(&mut params, &[1.0, 0.0], &search, |c| {
            Ok((c[0] * c[0], c[0]))
        })
        .unwrap();
        assert!(ok);
        assert_eq!(params, vec![0.5, 0.0]);
    }

    #[test]
    fn test_failed_line_search_leaves_params_untouched() {
        let original = vec![0.1f32, -2.5, 3.0e-7, f32::MIN_POSITIVE];
        let mut params = original.clone();
        let search = LineSearch {
            max_kl: 0.01,
            max_backtracks: 10,
            backtrack_ratio: 0.5,
        };
        let mut calls = 0;
        let ok = line_search(&mut params, &[1.0, 1.0, 1.0, 1.0], &search, |_| {
            calls += 1;
            Ok((1.0, 0.0))
        })
        .unwrap();
        assert!(!ok);
        assert_eq!(calls, 10);
        assert_eq!(
            params.iter().map(|p| p.to_bits()).collect::<Vec<_>>(),
            original.iter().map(|p| p.to_bits()).collect::<Vec<_>>()
        );
    }
}
