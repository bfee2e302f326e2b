//! The Metropolis-corrected HMC transition kernel: sample momentum,
//! integrate, accept/reject.

use crate::hamiltonian::hamiltonian;
use crate::key::Key;
use crate::leapfrog::leapfrog;
use crate::tree::ParamTree;

/// The sampler's persistent state between transitions: position, current
/// step size, and current diagonal inverse mass.
#[derive(Clone, Debug)]
pub struct SamplerState {
    pub q: ParamTree,
    pub eps: f64,
    pub m_inv: ParamTree,
}

#[derive(Clone, Copy, Debug)]
pub struct TransitionInfo {
    pub alpha: f64,
    pub accepted: bool,
    /// True when the rejection was forced by a non-finite momentum,
    /// Hamiltonian, or proposal (a numerical divergence), as opposed to an
    /// ordinary low-but-finite acceptance probability.
    pub diverged: bool,
}

/// One HMC transition: sample momentum with `key`, integrate a trajectory
/// of `num_leapfrog_steps`, and accept or reject via Metropolis correction.
/// Returns the new state, bookkeeping info, and the continuation key.
pub fn transition(
    state: &SamplerState,
    key: Key,
    num_leapfrog_steps: usize,
    log_prob: &(dyn Fn(&ParamTree) -> f64 + Sync),
    grad_log_prob: &(dyn Fn(&ParamTree) -> ParamTree + Sync),
) -> (SamplerState, TransitionInfo, Key) {
    let (k_mom, k_acc, k_next) = key.split3();

    let m = state.m_inv.recip();
    let z = k_mom.normal_like(&state.q);
    let p0 = z.mul(&m.sqrt());

    let (q1, p1) = leapfrog(
        &state.q,
        &p0,
        grad_log_prob,
        state.eps,
        num_leapfrog_steps,
        &state.m_inv,
    );

    let h0 = hamiltonian(&state.q, &p0, &state.m_inv, log_prob);
    let h1 = hamiltonian(&q1, &p1, &state.m_inv, log_prob);
    let delta_h = h1 - h0;

    let diverged = !p0.is_finite() || !h0.is_finite() || !q1.is_finite() || !delta_h.is_finite();
    let alpha = if diverged {
        0.0
    } else if delta_h <= 0.0 {
        1.0
    } else {
        (-delta_h).exp().min(1.0)
    };

    let u = k_acc.uniform();
    let accepted = u < alpha;
    let new_q = if accepted { q1 } else { state.q.clone() };

    let new_state = SamplerState {
        q: new_q,
        eps: state.eps,
        m_inv: state.m_inv.clone(),
    };
    (
        new_state,
        TransitionInfo {
            alpha,
            accepted,
            diverged,
        },
        k_next,
    )
}
