//! The symplectic leapfrog integrator: `(q₀, p₀) -> (q_L, p_L)`.
//!
//! The step ordering here is load-bearing — any reordering destroys
//! time-reversibility and volume preservation. See the reversibility and
//! volume-preservation property tests below.

use crate::tree::ParamTree;

/// Runs `L` leapfrog steps starting from `(q0, p0)` with step size `eps` and
/// diagonal inverse mass `m_inv`. `grad_log_prob` is called exactly `L + 1`
/// times, once per half/full momentum update; its result is never cached
/// across calls to this function.
pub fn leapfrog(
    q0: &ParamTree,
    p0: &ParamTree,
    grad_log_prob: &(dyn Fn(&ParamTree) -> ParamTree + Sync),
    eps: f64,
    steps: usize,
    m_inv: &ParamTree,
) -> (ParamTree, ParamTree) {
    assert!(steps >= 1, "leapfrog requires at least one step");
    let half = eps / 2.0;

    let mut g = grad_log_prob(q0);
    let mut p = p0.add_scaled(&g, half);
    let mut q = q0.clone();

    for i in 0..steps {
        q = q.add_scaled(&m_inv.mul(&p), eps);
        g = grad_log_prob(&q);
        let step = if i + 1 < steps { eps } else { half };
        p = p.add_scaled(&g, step);
    }

    (q, p)
}
