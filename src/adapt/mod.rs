//! Warmup-time adapters: step-size dual averaging and Welford mass-matrix
//! estimation.

pub mod dual_averaging;
pub mod welford;

pub use dual_averaging::{find_reasonable_eps, DualAveraging, DualAveragingParams};
pub use welford::WelfordAccumulator;
