//! The sampler's typed configuration surface: defaults matching the spec's
//! table of optional inputs, plus entry-point validation.

use crate::adapt::DualAveragingParams;
use crate::error::{Result, SamplerError};
use crate::tree::ParamTree;

#[derive(Clone, Copy, Debug)]
pub struct SamplerConfig {
    pub num_warmup: usize,
    pub num_leapfrog_steps: usize,
    pub num_chains: usize,
    pub initial_step_size: f64,
    pub target_accept_rate: f64,
    pub adapt_mass_matrix: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        SamplerConfig {
            num_warmup: 1000,
            num_leapfrog_steps: 25,
            num_chains: 1,
            initial_step_size: 0.1,
            target_accept_rate: 0.8,
            adapt_mass_matrix: true,
        }
    }
}

impl SamplerConfig {
    /// Builder-style setter for `num_warmup`; chain with `..Default::default()`
    /// or with the other `with_*` setters below.
    #[must_use]
    pub fn with_num_warmup(mut self, num_warmup: usize) -> Self {
        self.num_warmup = num_warmup;
        self
    }

    #[must_use]
    pub fn with_num_leapfrog_steps(mut self, num_leapfrog_steps: usize) -> Self {
        self.num_leapfrog_steps = num_leapfrog_steps;
        self
    }

    #[must_use]
    pub fn with_num_chains(mut self, num_chains: usize) -> Self {
        self.num_chains = num_chains;
        self
    }

    #[must_use]
    pub fn with_initial_step_size(mut self, initial_step_size: f64) -> Self {
        self.initial_step_size = initial_step_size;
        self
    }

    #[must_use]
    pub fn with_target_accept_rate(mut self, target_accept_rate: f64) -> Self {
        self.target_accept_rate = target_accept_rate;
        self
    }

    #[must_use]
    pub fn with_adapt_mass_matrix(mut self, adapt_mass_matrix: bool) -> Self {
        self.adapt_mass_matrix = adapt_mass_matrix;
        self
    }

    pub fn dual_averaging_params(&self) -> DualAveragingParams {
        DualAveragingParams {
            target_accept: self.target_accept_rate,
            ..DualAveragingParams::default()
        }
    }

    /// Validate this config against the supplied `num_samples` and the
    /// structural relationship between `initial_params` and
    /// `grad_log_prob(initial_params)`. Called once, synchronously, at the
    /// top of `sample(..)`, before any PRNG key is split.
    pub fn validate(
        &self,
        num_samples: usize,
        initial_params: &ParamTree,
        grad_at_initial: &ParamTree,
    ) -> Result<()> {
        if num_samples == 0 {
            return Err(SamplerError::InvalidConfig {
                reason: "numSamples must be positive".to_string(),
            });
        }
        if self.num_leapfrog_steps == 0 {
            return Err(SamplerError::InvalidConfig {
                reason: "numLeapfrogSteps must be at least 1".to_string(),
            });
        }
        if self.num_chains == 0 {
            return Err(SamplerError::InvalidConfig {
                reason: "numChains must be at least 1".to_string(),
            });
        }
        if !(self.initial_step_size.is_finite() && self.initial_step_size > 0.0) {
            return Err(SamplerError::InvalidConfig {
                reason: "initialStepSize must be a positive finite number".to_string(),
            });
        }
        if !(self.target_accept_rate > 0.0 && self.target_accept_rate < 1.0) {
            return Err(SamplerError::InvalidConfig {
                reason: "targetAcceptRate must be in (0, 1)".to_string(),
            });
        }
        if !initial_params.same_structure(grad_at_initial) {
            return Err(SamplerError::StructureMismatch {
                expected: initial_params.leaf_names(),
                found: grad_at_initial.leaf_names(),
            });
        }
        Ok(())
    }
}
