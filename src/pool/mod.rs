//! Pool module - partitioned datasets and their bounded executor.

mod batch_predictor;
mod dataset;
mod worker;

pub use batch_predictor::*;
pub use dataset::*;
pub use worker::*;
