//! Nesterov dual-averaging adapter for the leapfrog step size.

/// Hyperparameters for dual averaging, with the spec's documented defaults.
#[derive(Clone, Copy, Debug)]
pub struct DualAveragingParams {
    pub gamma: f64,
    pub t0: f64,
    pub kappa: f64,
    pub target_accept: f64,
    pub eps_min: f64,
    pub eps_max: f64,
}

impl Default for DualAveragingParams {
    fn default() -> Self {
        DualAveragingParams {
            gamma: 0.05,
            t0: 10.0,
            kappa: 0.75,
            target_accept: 0.8,
            eps_min: 1e-4,
            eps_max: 100.0,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct DualAveraging {
    params: DualAveragingParams,
    mu: f64,
    log_step: f64,
    log_step_avg: f64,
    h_bar: f64,
    t: u64,
}

impl DualAveraging {
    pub fn new(initial_eps: f64, params: DualAveragingParams) -> Self {
        let mu = (10.0 * initial_eps).ln();
        DualAveraging {
            params,
            mu,
            log_step: initial_eps.ln(),
            log_step_avg: 0.0,
            h_bar: 0.0,
            t: 0,
        }
    }

    /// Re-center around a freshly re-primed `eps`, keeping the rest of the
    /// running state (used when the windowed warmup schedule re-primes `eps`
    /// at a mass-matrix window boundary).
    pub fn recenter(&mut self, primed_eps: f64) {
        self.mu = (10.0 * primed_eps).ln();
        self.log_step = primed_eps.ln();
        self.log_step_avg = 0.0;
        self.h_bar = 0.0;
        self.t = 0;
    }

    /// Observe an acceptance probability and update the running estimate.
    /// Non-finite `alpha` is treated as `0`.
    pub fn observe(&mut self, alpha: f64) {
        let alpha = if alpha.is_finite() { alpha } else { 0.0 };
        self.t += 1;
        let t = self.t as f64;
        let w_h = 1.0 / (t + self.params.t0);
        self.h_bar = (1.0 - w_h) * self.h_bar + w_h * (self.params.target_accept - alpha);
        self.log_step = self.mu - (t.sqrt() / self.params.gamma) * self.h_bar;
        let w = t.powf(-self.params.kappa);
        self.log_step_avg = w * self.log_step + (1.0 - w) * self.log_step_avg;
    }

    /// The step size to use for the *next* transition.
    pub fn current_eps(&self) -> f64 {
        self.log_step
            .exp()
            .clamp(self.params.eps_min, self.params.eps_max)
    }

    /// The averaged step size, frozen at the end of warmup.
    pub fn averaged_eps(&self) -> f64 {
        self.log_step_avg
            .exp()
            .clamp(self.params.eps_min, self.params.eps_max)
    }
}

/// Reasonable-epsilon initializer: doubles or halves `eps` until the
/// single-leapfrog-step acceptance probability crosses 0.5, bounded to avoid
/// non-termination on pathological gradients.
pub fn find_reasonable_eps(
    initial_eps: f64,
    mut one_step_accept: impl FnMut(f64) -> f64,
) -> f64 {
    const MAX_ITERS: usize = 50;
    let mut eps = initial_eps;
    let alpha = one_step_accept(eps);
    if !alpha.is_finite() {
        return initial_eps;
    }
    let direction = if alpha > 0.5 { 2.0 } else { 0.5 };
    let initial_sign = (2.0 * alpha - 1.0).signum();
    if initial_sign == 0.0 {
        return eps;
    }
    for _ in 0..MAX_ITERS {
        let candidate = eps * direction;
        let alpha = one_step_accept(candidate);
        if !alpha.is_finite() {
            break;
        }
        let sign = (2.0 * alpha - 1.0).signum();
        if sign != initial_sign || sign == 0.0 {
            break;
        }
        eps = candidate;
    }
    eps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_size_moves_toward_lower_acceptance_target() {
        let mut da = DualAveraging::new(0.1, DualAveragingParams::default());
        for _ in 0..500 {
            da.observe(0.5); // consistently below target 0.8 => step size should shrink
        }
        assert!(da.current_eps() < 0.1);
    }

    #[test]
    fn step_size_grows_when_acceptance_exceeds_target() {
        let mut da = DualAveraging::new(0.1, DualAveragingParams::default());
        for _ in 0..500 {
            da.observe(0.99);
        }
        assert!(da.current_eps() > 0.1);
    }

    #[test]
    fn non_finite_alpha_is_treated_as_zero() {
        let mut da = DualAveraging::new(0.1, DualAveragingParams::default());
        da.observe(f64::NAN);
        assert!(da.current_eps().is_finite());
    }

    #[test]
    fn clamps_to_bounds() {
        let params = DualAveragingParams {
            eps_min: 0.01,
            eps_max: 0.02,
            ..Default::default()
        };
        let mut da = DualAveraging::new(0.1, params);
        for _ in 0..1000 {
            da.observe(0.0);
        }
        assert!(da.current_eps() >= 0.01 && da.current_eps() <= 0.02);
    }

    #[test]
    fn reasonable_eps_converges_near_half_acceptance() {
        // synthetic acceptance model: alpha decreases monotonically with eps
        let accept = |eps: f64| (-eps).exp().min(1.0);
        let eps = find_reasonable_eps(1.0, accept);
        let alpha = accept(eps);
        assert!(alpha > 0.2 && alpha < 0.8, "alpha = {alpha}, eps = {eps}");
    }
}
