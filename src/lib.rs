//! Hamiltonian Monte Carlo sampling core.
//!
//! Given a log-density and its gradient over a structured parameter tree,
//! [`sample`] draws approximately-independent samples while automatically
//! tuning the leapfrog step size (dual averaging) and a diagonal mass matrix
//! (Welford variance) during warmup. See DESIGN.md and SPEC_FULL.md for the
//! full component breakdown.

pub mod adapt;
pub mod builtin;
pub mod chain;
pub mod config;
pub mod coordinator;
pub mod diagnostics;
pub mod error;
pub mod hamiltonian;
pub mod key;
pub mod leapfrog;
pub mod transition;
pub mod tree;
pub mod warmup;

use std::collections::BTreeMap;

use log::info;

pub use chain::ChainOutput;
pub use config::SamplerConfig;
pub use diagnostics::{summarize_stacked, ParamSummary};
pub use error::{Result, SamplerError};
pub use key::Key;
pub use tree::{ParamTree, StackedTree};

/// Per-chain and pooled sampling statistics.
#[derive(Clone, Debug)]
pub struct Stats {
    pub accept_rate: Vec<f64>,
    pub accept_rate_mean: f64,
    pub step_size: Vec<f64>,
    pub step_size_mean: f64,
    pub mass_matrix: Vec<ParamTree>,
    pub mass_matrix_mean: ParamTree,
    pub divergences: Vec<u64>,
}

#[derive(Clone, Debug)]
pub struct SampleOutput {
    pub draws: StackedTree,
    pub stats: Stats,
    pub num_chains: usize,
    pub num_samples: usize,
}

impl SampleOutput {
    /// Diagnostics (Rhat, ESS, summary quantiles) for every scalar position
    /// of every leaf in `draws`.
    pub fn diagnostics(&self) -> BTreeMap<String, Vec<ParamSummary>> {
        summarize_stacked(&self.draws, self.num_chains, self.num_samples)
    }
}

/// The top-level blocking sampler entry point.
///
/// `log_prob` and `grad_log_prob` are pure callbacks over [`ParamTree`];
/// `initial_params` defines both the parameter structure and the starting
/// position; `key` is the root PRNG seed. See [`SamplerConfig`] for the
/// tunable warmup/trajectory/chain-count options.
pub fn sample(
    log_prob: &(dyn Fn(&ParamTree) -> f64 + Sync),
    grad_log_prob: &(dyn Fn(&ParamTree) -> ParamTree + Sync),
    initial_params: &ParamTree,
    key: Key,
    num_samples: usize,
    config: SamplerConfig,
) -> Result<SampleOutput> {
    let grad_at_initial = grad_log_prob(initial_params);
    config.validate(num_samples, initial_params, &grad_at_initial)?;

    info!(
        "starting sampler: {} chains, {} warmup, {} samples",
        config.num_chains, config.num_warmup, num_samples
    );

    let outputs = coordinator::run_chains(
        initial_params,
        key,
        config.num_chains,
        config.initial_step_size,
        config.num_leapfrog_steps,
        config.num_warmup,
        num_samples,
        config.adapt_mass_matrix,
        config.dual_averaging_params(),
        log_prob,
        grad_log_prob,
    );

    let draws = coordinator::stack_draws(&outputs);

    let accept_rate: Vec<f64> = outputs.iter().map(|o| o.accept_rate).collect();
    let step_size: Vec<f64> = outputs.iter().map(|o| o.final_eps).collect();
    let mass_matrix: Vec<ParamTree> = outputs.iter().map(|o| o.final_m_inv.clone()).collect();
    let divergences: Vec<u64> = outputs.iter().map(|o| o.divergences).collect();

    let accept_rate_mean = accept_rate.iter().sum::<f64>() / accept_rate.len() as f64;
    let step_size_mean = step_size.iter().sum::<f64>() / step_size.len() as f64;
    let mass_matrix_mean = mass_matrix
        .iter()
        .skip(1)
        .fold(mass_matrix[0].clone(), |acc, m| acc.add(m))
        .scale(1.0 / mass_matrix.len() as f64);

    Ok(SampleOutput {
        draws,
        stats: Stats {
            accept_rate,
            accept_rate_mean,
            step_size,
            step_size_mean,
            mass_matrix,
            mass_matrix_mean,
            divergences,
        },
        num_chains: config.num_chains,
        num_samples,
    })
}

// -----------------------------------------------------------------------------
// Module: Python Interface (PyO3)
// -----------------------------------------------------------------------------
#[cfg(feature = "python")]
mod python {
    use super::*;
    use crate::builtin::BuiltinTarget;
    use pyo3::prelude::*;

    #[pyfunction]
    #[allow(clippy::too_many_arguments)]
    fn sample(
        target: String,
        num_samples: usize,
        num_warmup: usize,
        num_leapfrog_steps: usize,
        num_chains: usize,
        initial_step_size: f64,
        seed: u64,
    ) -> PyResult<(Vec<Vec<Vec<f32>>>, f64)> {
        let target = BuiltinTarget::from_name(&target);
        let config = SamplerConfig {
            num_warmup,
            num_leapfrog_steps,
            num_chains,
            initial_step_size,
            ..SamplerConfig::default()
        };
        let log_prob = |q: &ParamTree| target.log_prob(q);
        let grad_log_prob = |q: &ParamTree| target.grad_log_prob(q);
        let output = super::sample(
            &log_prob,
            &grad_log_prob,
            &target.initial_params(),
            Key::seed(seed),
            num_samples,
            config,
        )
        .map_err(|e| pyo3::exceptions::PyValueError::new_err(e.to_string()))?;

        let draws = draws_by_chain_and_sample(&output);
        Ok((draws, output.stats.accept_rate_mean))
    }

    #[pymodule]
    fn hmc_sampler_rs(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(self::sample, m)?)?;
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Module: WebAssembly Interface (wasm-bindgen)
// -----------------------------------------------------------------------------
#[cfg(feature = "wasm")]
mod wasm {
    use super::*;
    use crate::builtin::BuiltinTarget;
    use serde::Serialize;
    use wasm_bindgen::prelude::*;

    #[derive(Serialize)]
    struct WasmSampleResult {
        draws: Vec<Vec<Vec<f32>>>,
        accept_rate: f64,
        step_size: f64,
    }

    #[wasm_bindgen]
    #[allow(clippy::too_many_arguments)]
    pub fn sample_wasm(
        target: String,
        num_samples: usize,
        num_warmup: usize,
        num_leapfrog_steps: usize,
        num_chains: usize,
        initial_step_size: f64,
        seed: u64,
    ) -> JsValue {
        let target = BuiltinTarget::from_name(&target);
        let config = SamplerConfig {
            num_warmup,
            num_leapfrog_steps,
            num_chains,
            initial_step_size,
            ..SamplerConfig::default()
        };
        let log_prob = |q: &ParamTree| target.log_prob(q);
        let grad_log_prob = |q: &ParamTree| target.grad_log_prob(q);
        let output = super::sample(
            &log_prob,
            &grad_log_prob,
            &target.initial_params(),
            Key::seed(seed),
            num_samples,
            config,
        );

        match output {
            Ok(output) => {
                let result = WasmSampleResult {
                    draws: draws_by_chain_and_sample(&output),
                    accept_rate: output.stats.accept_rate_mean,
                    step_size: output.stats.step_size_mean,
                };
                serde_wasm_bindgen::to_value(&result).unwrap()
            }
            Err(e) => serde_wasm_bindgen::to_value(&e.to_string()).unwrap(),
        }
    }
}

/// Shared helper for the demo bindings: unpack the stacked draws tree's
/// single `"x"` leaf into `[chain][sample][element]` nested vectors.
#[cfg(any(feature = "wasm", feature = "python"))]
fn draws_by_chain_and_sample(output: &SampleOutput) -> Vec<Vec<Vec<f32>>> {
    let leaf = output
        .draws
        .leaf("x")
        .expect("builtin targets use a single \"x\" leaf");
    let elem_count = leaf.shape.iter().skip(2).product::<usize>().max(1);
    (0..output.num_chains)
        .map(|c| {
            (0..output.num_samples)
                .map(|n| {
                    let start = c * output.num_samples * elem_count + n * elem_count;
                    leaf.data[start..start + elem_count].to_vec()
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structure_preservation_for_arbitrary_trees() {
        let q = ParamTree::from_vec("x", vec![1.0, 2.0, 3.0]);
        let grad = |t: &ParamTree| t.scale(-1.0);
        assert!(grad(&q).same_structure(&q));
    }

    #[test]
    fn invalid_config_surfaces_as_error_before_any_sampling() {
        let q = ParamTree::scalar(0.0);
        let log_prob = |t: &ParamTree| -0.5 * t.dot(t);
        let grad_log_prob = |t: &ParamTree| t.scale(-1.0);
        let config = SamplerConfig::default();
        let result = sample(&log_prob, &grad_log_prob, &q, Key::seed(1), 0, config);
        assert!(result.is_err());
    }

    #[test]
    fn degenerate_gradient_does_not_panic() {
        let q = ParamTree::scalar(0.0);
        let log_prob = |t: &ParamTree| -0.5 * t.dot(t);
        let called = std::sync::atomic::AtomicBool::new(false);
        let grad = |t: &ParamTree| {
            if called
                .compare_exchange(
                    false,
                    true,
                    std::sync::atomic::Ordering::SeqCst,
                    std::sync::atomic::Ordering::SeqCst,
                )
                .is_ok()
            {
                ParamTree::scalar(f32::NAN)
            } else {
                t.scale(-1.0)
            }
        };
        let config = SamplerConfig {
            num_warmup: 5,
            num_chains: 1,
            ..SamplerConfig::default()
        };
        let result = sample(&log_prob, &grad, &q, Key::seed(1), 10, config);
        assert!(result.is_ok());
    }

    #[test]
    fn single_chain_reproducibility() {
        let q = ParamTree::scalar(0.0);
        let log_prob = |t: &ParamTree| -0.5 * t.dot(t);
        let grad_log_prob = |t: &ParamTree| t.scale(-1.0);
        let config = SamplerConfig {
            num_warmup: 50,
            num_chains: 2,
            ..SamplerConfig::default()
        };
        let a = sample(&log_prob, &grad_log_prob, &q, Key::seed(42), 100, config).unwrap();
        let b = sample(&log_prob, &grad_log_prob, &q, Key::seed(42), 100, config).unwrap();
        let leaf_a = a.draws.leaf("x").unwrap();
        let leaf_b = b.draws.leaf("x").unwrap();
        assert_eq!(leaf_a.data, leaf_b.data);
        assert_eq!(a.stats.accept_rate, b.stats.accept_rate);
    }
}
