//! The Multi-Chain Coordinator (Component I): splits the root key, runs
//! every chain independently, and stacks the results.

use crate::adapt::DualAveragingParams;
use crate::chain::{run_chain, ChainOutput};
use crate::key::Key;
use crate::tree::{ParamTree, StackedTree};

#[allow(clippy::too_many_arguments)]
pub fn run_chains(
    initial_q: &ParamTree,
    root_key: Key,
    num_chains: usize,
    initial_eps: f64,
    num_leapfrog_steps: usize,
    num_warmup: usize,
    num_samples: usize,
    adapt_mass_matrix: bool,
    da_params: DualAveragingParams,
    log_prob: &(dyn Fn(&ParamTree) -> f64 + Sync),
    grad_log_prob: &(dyn Fn(&ParamTree) -> ParamTree + Sync),
) -> Vec<ChainOutput> {
    let chain_keys = root_key.split(num_chains);

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        chain_keys
            .into_par_iter()
            .map(|chain_key| {
                run_chain(
                    initial_q,
                    chain_key,
                    initial_eps,
                    num_leapfrog_steps,
                    num_warmup,
                    num_samples,
                    adapt_mass_matrix,
                    da_params,
                    log_prob,
                    grad_log_prob,
                )
            })
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        chain_keys
            .into_iter()
            .map(|chain_key| {
                run_chain(
                    initial_q,
                    chain_key,
                    initial_eps,
                    num_leapfrog_steps,
                    num_warmup,
                    num_samples,
                    adapt_mass_matrix,
                    da_params,
                    log_prob,
                    grad_log_prob,
                )
            })
            .collect()
    }
}

/// Per-chain draws, stacked into a single tree with a leading
/// `[numChains, numSamples, ...]` axis.
pub fn stack_draws(outputs: &[ChainOutput]) -> StackedTree {
    let per_chain: Vec<StackedTree> = outputs
        .iter()
        .map(|o| StackedTree::stack(&o.draws))
        .collect();

    // StackedTree::stack expects ParamTrees, but we already have one level of
    // stacking per chain; fold the chain axis in by re-flattening into a
    // [chains * samples, ...] tree and recording chain count separately via
    // shape bookkeeping.
    stack_stacked(&per_chain)
}

fn stack_stacked(per_chain: &[StackedTree]) -> StackedTree {
    use std::collections::BTreeMap;
    let num_chains = per_chain.len();
    let num_samples = per_chain[0].count;
    let mut leaves = BTreeMap::new();
    for (name, leaf) in per_chain[0].leaves() {
        let mut shape = vec![num_chains, num_samples];
        shape.extend(leaf.shape.iter().skip(1).cloned());
        let mut data = Vec::with_capacity(per_chain.iter().map(|c| c.leaf(name).unwrap().data.len()).sum());
        for chain in per_chain {
            data.extend_from_slice(&chain.leaf(name).unwrap().data);
        }
        leaves.insert(name.clone(), crate::tree::Leaf::new(shape, data));
    }
    StackedTree::from_parts(num_chains * num_samples, leaves)
}
