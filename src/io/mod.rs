//! Input/output helpers.
//!
//! - surrogate JSON read/write (`surrogate`)
//! - CSV exports for predictions and databases (`export`)
//!
//! Database ingest lives in `data::ingest`.

pub mod export;
pub mod surrogate;

pub use export::*;
pub use surrogate::*;
