//! The Hamiltonian functional `H(q, p; M⁻¹) = U(q) + K(p)`.

use crate::tree::ParamTree;

/// `U(q) + K(p)` with a diagonal kinetic metric `M⁻¹`. Non-finite `logProb`
/// or kinetic values are propagated rather than rejected here — the
/// Metropolis transition is responsible for turning a non-finite `ΔH` into a
/// rejection.
pub fn hamiltonian(q: &ParamTree, p: &ParamTree, m_inv: &ParamTree, log_prob: &(dyn Fn(&ParamTree) -> f64 + Sync)) -> f64 {
    let potential = -log_prob(q);
    let kinetic = 0.5 * p.mul(p).mul(m_inv).sum();
    potential + kinetic
}
