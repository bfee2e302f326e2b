//! Multi-chain convergence diagnostics: split-Rhat, effective sample size
//! (Geyer's initial monotone sequence), and summary quantiles.

use std::collections::BTreeMap;

use crate::tree::StackedTree;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParamSummary {
    pub mean: f64,
    pub sd: f64,
    pub q05: f64,
    pub q25: f64,
    pub q50: f64,
    pub q75: f64,
    pub q95: f64,
    pub rhat: f64,
    pub ess: f64,
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

fn variance(xs: &[f64], m: f64) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (xs.len() - 1) as f64
}

/// Split-Rhat for a set of equal-length chains.
pub fn split_rhat(chains: &[Vec<f64>]) -> f64 {
    let n = chains[0].len();
    let n_half = n / 2;
    if n_half < 2 {
        return f64::NAN;
    }
    let mut sub_chains: Vec<&[f64]> = Vec::with_capacity(chains.len() * 2);
    for c in chains {
        sub_chains.push(&c[..n_half]);
        sub_chains.push(&c[n_half..2 * n_half]);
    }

    let means: Vec<f64> = sub_chains.iter().map(|c| mean(c)).collect();
    let vars: Vec<f64> = sub_chains
        .iter()
        .zip(means.iter())
        .map(|(c, &m)| variance(c, m))
        .collect();

    let w = mean(&vars);
    let grand_mean = mean(&means);
    let b = n_half as f64 * variance(&means, grand_mean);

    let var_plus = ((n_half - 1) as f64 / n_half as f64) * w + b / n_half as f64;
    if w <= 0.0 {
        return if var_plus <= 0.0 { 1.0 } else { f64::INFINITY };
    }
    (var_plus / w).sqrt()
}

fn autocovariance(x: &[f64], m: f64, lag: usize) -> f64 {
    let n = x.len();
    if lag >= n {
        return 0.0;
    }
    let sum: f64 = (0..n - lag).map(|i| (x[i] - m) * (x[i + lag] - m)).sum();
    sum / n as f64
}

/// Effective sample size via Geyer's initial monotone sequence, as described
/// in the sampler's diagnostics component: per-chain autocovariance averaged
/// across chains, normalized by mean per-chain variance, summed in adjacent
/// pairs while positive.
pub fn ess_geyer(chains: &[Vec<f64>]) -> f64 {
    let c = chains.len();
    let n = chains[0].len();
    if n < 4 {
        return (c * n) as f64;
    }
    let max_lag = n / 2;

    let means: Vec<f64> = chains.iter().map(|ch| mean(ch)).collect();
    let vars: Vec<f64> = chains
        .iter()
        .zip(means.iter())
        .map(|(ch, &m)| variance(ch, m))
        .collect();
    let w = mean(&vars);
    if w <= 0.0 {
        return (c * n) as f64;
    }

    let rho_hat: Vec<f64> = (0..=max_lag)
        .map(|t| {
            let gamma_bar: f64 = chains
                .iter()
                .zip(means.iter())
                .map(|(ch, &m)| autocovariance(ch, m, t))
                .sum::<f64>()
                / c as f64;
            gamma_bar / w
        })
        .collect();

    let mut tau_sum = 0.0;
    let mut k = 1;
    while 2 * k < rho_hat.len() {
        let pair = rho_hat[2 * k - 1] + rho_hat[2 * k];
        if pair <= 0.0 {
            break;
        }
        tau_sum += pair;
        k += 1;
    }
    let tau = 1.0 + 2.0 * tau_sum;
    let ess = (c * n) as f64 / tau.max(1e-12);
    ess.clamp(1.0, (c * n) as f64)
}

fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let idx = (p * (n - 1) as f64).round() as usize;
    sorted[idx.min(n - 1)]
}

pub fn summarize(chains: &[Vec<f64>]) -> ParamSummary {
    let pooled: Vec<f64> = chains.iter().flatten().copied().collect();
    let m = mean(&pooled);
    let sd = variance(&pooled, m).sqrt();
    let mut sorted = pooled.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

    ParamSummary {
        mean: m,
        sd,
        q05: quantile_sorted(&sorted, 0.05),
        q25: quantile_sorted(&sorted, 0.25),
        q50: quantile_sorted(&sorted, 0.50),
        q75: quantile_sorted(&sorted, 0.75),
        q95: quantile_sorted(&sorted, 0.95),
        rhat: split_rhat(chains),
        ess: ess_geyer(chains),
    }
}

/// Split a stacked `[C, N, ...]` leaf into one `Vec<Vec<f64>>` (chains × N)
/// per scalar position within the leaf's per-sample shape.
fn leaf_chain_series(shape: &[usize], data: &[f32], num_chains: usize, num_samples: usize) -> Vec<Vec<Vec<f64>>> {
    let elem_count: usize = shape.iter().skip(2).product::<usize>().max(1);
    (0..elem_count)
        .map(|pos| {
            (0..num_chains)
                .map(|c| {
                    (0..num_samples)
                        .map(|n| {
                            let offset = c * num_samples * elem_count + n * elem_count + pos;
                            data[offset] as f64
                        })
                        .collect()
                })
                .collect()
        })
        .collect()
}

/// Diagnostics for every scalar position in every leaf of a stacked draws
/// tree, i.e. the engine's top-level `summary(draws)` operation.
pub fn summarize_stacked(
    stacked: &StackedTree,
    num_chains: usize,
    num_samples: usize,
) -> BTreeMap<String, Vec<ParamSummary>> {
    stacked
        .leaves()
        .map(|(name, leaf)| {
            let per_position = leaf_chain_series(&leaf.shape, &leaf.data, num_chains, num_samples);
            let summaries = per_position.iter().map(|chains| summarize(chains)).collect();
            (name.clone(), summaries)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rhat_is_one_for_identical_chains() {
        // Build each chain as two back-to-back copies of the same random
        // half, so the first and second split-halves are literally
        // identical (equal mean *and* variance) and four chains are
        // themselves identical copies of each other — the degenerate case
        // where between-chain variance is exactly zero.
        // Split-Rhat's finite-sample correction means even perfectly
        // identical chains land at sqrt((N'-1)/N'), not exactly 1 — so this
        // checks convergence to 1 as N' grows, not bit-exact equality.
        let mut state = 12345u64;
        let half: Vec<f64> = (0..2000)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
                ((state >> 11) as f64 / (1u64 << 53) as f64) - 0.5
            })
            .collect();
        let mut chain = half.clone();
        chain.extend(half);
        let chains = vec![chain.clone(), chain.clone(), chain.clone(), chain];
        let rhat = split_rhat(&chains);
        assert!((rhat - 1.0).abs() < 1e-3, "rhat = {rhat}");
    }

    #[test]
    fn rhat_increases_with_between_chain_divergence() {
        let n = 200;
        let close: Vec<Vec<f64>> = (0..4)
            .map(|i| (0..n).map(|k| (k as f64 * 0.01) + i as f64 * 0.01).collect())
            .collect();
        let far: Vec<Vec<f64>> = (0..4)
            .map(|i| (0..n).map(|k| (k as f64 * 0.01) + i as f64 * 10.0).collect())
            .collect();
        assert!(split_rhat(&far) > split_rhat(&close));
    }

    #[test]
    fn ess_is_bounded_by_total_draws() {
        let n = 100;
        let chains: Vec<Vec<f64>> = (0..4)
            .map(|i| {
                let mut x = 0.0_f64;
                (0..n)
                    .map(|_| {
                        x = 0.9 * x + (i as f64);
                        x
                    })
                    .collect()
            })
            .collect();
        let ess = ess_geyer(&chains);
        assert!(ess >= 1.0 && ess <= (4 * n) as f64);
    }

    #[test]
    fn ess_near_total_for_independent_draws() {
        // pseudo-independent deterministic sequence with low autocorrelation
        let n = 400;
        let chains: Vec<Vec<f64>> = (0..4)
            .map(|seed| {
                let mut state = 12345u64 + seed as u64;
                (0..n)
                    .map(|_| {
                        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
                        ((state >> 11) as f64 / (1u64 << 53) as f64) - 0.5
                    })
                    .collect()
            })
            .collect();
        let ess = ess_geyer(&chains);
        assert!(ess > 0.5 * (4 * n) as f64, "ess = {ess}");
    }

    #[test]
    fn idempotent_summary() {
        let chains = vec![vec![1.0, 2.0, 3.0, 4.0], vec![2.0, 3.0, 4.0, 5.0]];
        let a = summarize(&chains);
        let b = summarize(&chains);
        assert_eq!(a, b);
    }
}
