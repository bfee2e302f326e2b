//! Error taxonomy for the sampler's public entry points.
//!
//! Only category-1 failures (see the crate's design notes) ever produce an
//! `Err` here — numerical divergence, mass-matrix degeneracy, and the rest
//! are absorbed internally with documented fallbacks.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("invalid sampler configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("gradLogProb(initialParams) has a different structure than initialParams: expected leaves {expected:?}, found {found:?}")]
    StructureMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
}

pub type Result<T> = std::result::Result<T, SamplerError>;
