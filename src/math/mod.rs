//! Mathematical utilities: kernels, dense solvers, and scalar statistics.

pub mod kernel;
pub mod linalg;
pub mod stats;

pub use kernel::*;
pub use linalg::*;
pub use stats::*;
