//! Welford's online, numerically-stable mean/variance estimator, used to
//! adapt the diagonal mass matrix during warmup.

use log::debug;

use crate::tree::ParamTree;

const EPS_JITTER: f64 = 1e-5;

#[derive(Clone, Debug)]
pub struct WelfordAccumulator {
    count: u64,
    mean: ParamTree,
    m2: ParamTree,
}

impl WelfordAccumulator {
    pub fn new(template: &ParamTree) -> Self {
        WelfordAccumulator {
            count: 0,
            mean: template.zeros_like(),
            m2: template.zeros_like(),
        }
    }

    pub fn observe(&mut self, x: &ParamTree) {
        self.count += 1;
        let delta = x.sub(&self.mean);
        self.mean = self.mean.add_scaled(&delta, 1.0 / self.count as f64);
        let delta2 = x.sub(&self.mean);
        self.m2 = self.m2.add(&delta.mul(&delta2));
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Finalize into an inverse-mass tree. Falls back to the identity when
    /// fewer than 2 samples have been observed, or when the estimated
    /// variance is all-zero (e.g. a chain stuck at a single position) —
    /// both are degenerate-mass-matrix conditions, not errors.
    pub fn finalize(&self) -> ParamTree {
        if self.count < 2 {
            debug!("mass-matrix adapter: count < 2, falling back to identity");
            return self.mean.ones_like();
        }
        let denom = (self.count - 1) as f64;
        let variance = self.m2.scale(1.0 / denom);
        let max_abs = variance
            .flat_iter()
            .map(|(_, _, v)| v.abs())
            .fold(0.0f32, f32::max);
        if max_abs == 0.0 {
            debug!("mass-matrix adapter: all-zero variance, falling back to identity");
            return self.mean.ones_like();
        }
        variance.map_add_scalar(EPS_JITTER)
    }

    pub fn reset(&mut self, template: &ParamTree) {
        self.count = 0;
        self.mean = template.zeros_like();
        self.m2 = template.zeros_like();
    }
}
