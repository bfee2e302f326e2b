//! End-to-end scenario: the Rosenbrock-shaped "banana" posterior —
//! `x1 ~ N(0, 10)`, `x2 | x1 ~ N(0.1 x1^2, 1)` — should leave `x1^2` and
//! `x2` positively correlated in the drawn samples.

use hmc_sampler_rs::{sample, Key, ParamTree, SamplerConfig};

#[test]
fn banana_posterior_correlates_x1_squared_with_x2() {
    let _ = env_logger::try_init();
    let log_prob = |q: &ParamTree| {
        let d = &q.leaf("x").unwrap().data;
        let (x1, x2) = (d[0] as f64, d[1] as f64);
        -0.5 * x1 * x1 / 10.0 - 0.5 * (x2 - 0.1 * x1 * x1).powi(2)
    };
    let grad_log_prob = |q: &ParamTree| {
        let d = &q.leaf("x").unwrap().data;
        let (x1, x2) = (d[0] as f64, d[1] as f64);
        let resid = x2 - 0.1 * x1 * x1;
        let g1 = -x1 / 10.0 + 0.2 * x1 * resid;
        let g2 = -resid;
        ParamTree::from_vec("x", vec![g1 as f32, g2 as f32])
    };

    let config = SamplerConfig {
        num_warmup: 1000,
        num_leapfrog_steps: 25,
        num_chains: 4,
        ..SamplerConfig::default()
    };
    let output = sample(
        &log_prob,
        &grad_log_prob,
        &ParamTree::from_vec("x", vec![0.0, 0.0]),
        Key::seed(42),
        2000,
        config,
    )
    .unwrap();

    let leaf = output.draws.leaf("x").unwrap();
    let n = output.num_chains * output.num_samples;
    let x1_sq: Vec<f64> = (0..n).map(|i| (leaf.data[i * 2] as f64).powi(2)).collect();
    let x2s: Vec<f64> = (0..n).map(|i| leaf.data[i * 2 + 1] as f64).collect();

    let mean_sq = x1_sq.iter().sum::<f64>() / n as f64;
    let mean_x2 = x2s.iter().sum::<f64>() / n as f64;
    let cov = x1_sq
        .iter()
        .zip(x2s.iter())
        .map(|(a, b)| (a - mean_sq) * (b - mean_x2))
        .sum::<f64>()
        / (n - 1) as f64;
    let sd_sq = (x1_sq.iter().map(|a| (a - mean_sq).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt();
    let sd_x2 = (x2s.iter().map(|b| (b - mean_x2).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt();
    let corr = cov / (sd_sq * sd_x2);

    assert!(corr > 0.5, "corr = {corr}");
}
