//! Core data models for transformers-predictor.
//!
//! Epistemic mapping:
//! - K_i (Knowledge): Concrete types with compile-time guarantees
//! - B_i (Beliefs): Wrapped in Result/Option
//! - I^R (Resolvable): Config parameters
//! - I^B (Bounded): Error variants tagged with the failing stage

mod batch;
mod config;
mod error;
mod value;

pub use batch::*;
pub use config::*;
pub use error::*;
pub use value::*;
