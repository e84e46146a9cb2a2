//! Database ingest, derived columns and design-space grids.

pub mod derive;
pub mod fragility;
pub mod ingest;
pub mod space;
pub mod synthetic;

pub use fragility::Fragility;
pub use ingest::*;
pub use space::*;
pub use synthetic::*;
