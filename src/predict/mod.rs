//! Prediction with fitted surrogates.

pub mod expected;

pub use expected::*;
