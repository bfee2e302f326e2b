//! The Warmup Driver (Component G): schedules step-size and mass-matrix
//! adaptation, then freezes both for the sampling phase.
//!
//! This implementation uses the **windowed** schedule: an initial ~15%
//! buffer adapts step size only, a middle region adapts both in doubling
//! windows (25, 50, 100, … steps) with the mass matrix refreshed (and step
//! size re-primed) at each window boundary, and a final ~10% buffer adapts
//! step size only. See DESIGN.md for why this was chosen over the simple
//! schedule.

use log::{debug, warn};

use crate::adapt::{find_reasonable_eps, DualAveraging, DualAveragingParams, WelfordAccumulator};
use crate::key::Key;
use crate::leapfrog::leapfrog;
use crate::tree::ParamTree;
use crate::transition::{transition, SamplerState};

#[derive(Clone, Copy, Debug, Default)]
pub struct WarmupStats {
    pub divergences: u64,
}

struct Schedule {
    init_buffer: usize,
    middle_len: usize,
    /// Absolute 1-indexed warmup steps at which a window ends (empty if the
    /// mass matrix is not being adapted or warmup is too short).
    window_ends: Vec<usize>,
}

fn build_schedule(n_warmup: usize, adapt_mass_matrix: bool) -> Schedule {
    if !adapt_mass_matrix || n_warmup < 20 {
        return Schedule {
            init_buffer: n_warmup,
            middle_len: 0,
            window_ends: Vec::new(),
        };
    }

    let init_buffer = ((n_warmup as f64 * 0.15).round() as usize).max(1);
    let term_buffer = ((n_warmup as f64 * 0.10).round() as usize).max(1);
    if init_buffer + term_buffer >= n_warmup {
        return Schedule {
            init_buffer: n_warmup,
            middle_len: 0,
            window_ends: Vec::new(),
        };
    }

    let middle_len = n_warmup - init_buffer - term_buffer;
    let mut ends = Vec::new();
    let mut size = 25usize;
    let mut pos = 0usize;
    while pos + size < middle_len {
        pos += size;
        ends.push(pos);
        size *= 2;
    }
    if ends.last() != Some(&middle_len) {
        ends.push(middle_len);
    }
    let window_ends = ends.into_iter().map(|rel| init_buffer + rel).collect();

    Schedule {
        init_buffer,
        middle_len,
        window_ends,
    }
}

/// One leapfrog step's acceptance probability, used by the reasonable-ε
/// initializer; mirrors the transition's H0/H1 computation without touching
/// PRNG state (momentum is taken as given rather than resampled).
fn one_step_accept(
    q: &ParamTree,
    m_inv: &ParamTree,
    p: &ParamTree,
    eps: f64,
    log_prob: &(dyn Fn(&ParamTree) -> f64 + Sync),
    grad_log_prob: &(dyn Fn(&ParamTree) -> ParamTree + Sync),
) -> f64 {
    use crate::hamiltonian::hamiltonian;
    let h0 = hamiltonian(q, p, m_inv, log_prob);
    let (q1, p1) = leapfrog(q, p, grad_log_prob, eps, 1, m_inv);
    let h1 = hamiltonian(&q1, &p1, m_inv, log_prob);
    let delta_h = h1 - h0;
    if !delta_h.is_finite() {
        0.0
    } else {
        (-delta_h).exp().min(1.0)
    }
}

#[allow(clippy::too_many_arguments)]
pub fn run_warmup(
    initial_state: SamplerState,
    mut key: Key,
    n_warmup: usize,
    num_leapfrog_steps: usize,
    adapt_mass_matrix: bool,
    da_params: DualAveragingParams,
    log_prob: &(dyn Fn(&ParamTree) -> f64 + Sync),
    grad_log_prob: &(dyn Fn(&ParamTree) -> ParamTree + Sync),
) -> (SamplerState, Key, WarmupStats) {
    let mut stats = WarmupStats::default();
    if n_warmup == 0 {
        return (initial_state, key, stats);
    }

    let schedule = build_schedule(n_warmup, adapt_mass_matrix);
    let mut state = initial_state;

    // Prime epsilon once before warmup proper, per the documented default.
    let (k_prime, k_rest) = {
        let children = key.split(2);
        (children[0], children[1])
    };
    key = k_rest;
    let probe_momentum = k_prime.normal_like(&state.q);
    let primed_eps = find_reasonable_eps(state.eps, |eps| {
        one_step_accept(
            &state.q,
            &state.m_inv,
            &probe_momentum,
            eps,
            log_prob,
            grad_log_prob,
        )
    });
    state.eps = primed_eps;
    let mut da = DualAveraging::new(primed_eps, da_params);

    let mut welford = WelfordAccumulator::new(&state.q);
    let mut window_diverged_all = true;
    let mut window_steps = 0usize;
    let mut first_divergence_logged = false;

    for t in 1..=n_warmup {
        let (new_state, info, next_key) =
            transition(&state, key, num_leapfrog_steps, log_prob, grad_log_prob);
        key = next_key;
        state = new_state;

        if info.diverged {
            stats.divergences += 1;
            if !first_divergence_logged {
                warn!("chain hit a numerical divergence during warmup at step {t}");
                first_divergence_logged = true;
            }
        } else {
            window_diverged_all = false;
        }

        da.observe(info.alpha);
        state.eps = da.current_eps();

        let in_middle = t > schedule.init_buffer && t <= schedule.init_buffer + schedule.middle_len;
        if in_middle && adapt_mass_matrix {
            welford.observe(&state.q);
            window_steps += 1;
        }

        if schedule.window_ends.contains(&t) {
            if window_steps > 0 && window_diverged_all {
                warn!("every transition in a warmup window diverged (window ending at step {t})");
            }
            let new_m_inv = welford.finalize();
            debug!(
                "warmup window ended at step {t}: mass matrix refreshed, eps re-primed from {:.5}",
                state.eps
            );
            state.m_inv = new_m_inv;
            welford.reset(&state.q);
            window_steps = 0;
            window_diverged_all = true;

            let (k_prime2, k_rest2) = {
                let children = key.split(2);
                (children[0], children[1])
            };
            key = k_rest2;
            let probe_momentum = k_prime2.normal_like(&state.q);
            let re_primed = find_reasonable_eps(state.eps, |eps| {
                one_step_accept(
                    &state.q,
                    &state.m_inv,
                    &probe_momentum,
                    eps,
                    log_prob,
                    grad_log_prob,
                )
            });
            state.eps = re_primed;
            da.recenter(re_primed);
        }
    }

    state.eps = da.averaged_eps();
    if !adapt_mass_matrix || schedule.middle_len == 0 {
        debug!("mass matrix adaptation skipped or degenerate; falling back to identity");
    }
    (state, key, stats)
}
