//! Utilities.

/// Discounted sum of future rewards at every step of an episode that ends
/// after its last reward.
pub fn discounted_returns(rewards: &[f32], discount: f32) -> Vec<f32> {
    discounted_returns_from(rewards, discount, 0.0)
}

/// Like [`discounted_returns`], bootstrapping the value after the last step.
pub fn discounted_returns_from(rewards: &[f32], discount: f32, bootstrap: f32) -> Vec<f32> {
    let mut returns = vec![0.0; rewards.len()];
    let mut acc = bootstrap;
    for t in (0..rewards.len()).rev() {
        acc = rewards[t] + discount * acc;
        returns[t] = acc;
    }
    returns
}

/// Generalized advantage estimates of an episode that ends after its last
/// reward; `values[t]` is the critic's estimate at step `t`.
pub fn gae(rewards: &[f32], values: &[f32], discount: f32, lambda: f32) -> Vec<f32> {
    debug_assert_eq!(rewards.len(), values.len());
    let mut advs = vec![0.0; rewards.len()];
    let mut acc = 0.0;
    for t in (0..rewards.len()).rev() {
        let next_value = values.get(t + 1).copied().unwrap_or(0.0);
        let delta = rewards[t] + discount * next_value - values[t];
        acc = delta + discount * lambda * acc;
        advs[t] = acc;
    }
    advs
}

/// Mean and population standard deviation.
pub fn mean_std(xs: &[f32]) -> (f32, f32) {
    if xs.is_empty() {
        return (0.0, 0.0);
    }
    let n = xs.len() as f32;
    let mean = xs.iter().sum::<f32>() / n;
    let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / n;
    (mean, var.sqrt())
}

/// Shifts and scales every value of every sequence to zero mean and unit
/// variance over the whole batch.
pub fn normalize(seqs: &mut [Vec<f32>]) {
    let all = seqs.iter().flatten().copied().collect::<Vec<_>>();
    let (mean, std) = mean_std(&all);
    let scale = if std > 1e-8 { 1.0 / std } else { 1.0 };
    for x in seqs.iter_mut().flatten() {
        *x = (*x - mean) * scale;
    }
}

pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// `y += alpha * x`
pub(crate) fn axpy(alpha: f32, x: &[f32], y: &mut [f32]) {
    y.iter_mut().zip(x).for_each(|(y, x)| *y += alpha * x);
}

pub(crate) fn scale(alpha: f32, x: &mut [f32]) {
    x.iter_mut().for_each(|x| *x *= alpha);
}
