/*!
A fixed-point LSTM for forecasting stock prices, written to run deterministically on hardware without floating point.

Every network computation is done on [`fixed::Fixed`] values, which saturate instead of overflowing and round the same
way everywhere, so a forecast is bit-for-bit reproducible across machines. Floats only appear at the edges: dataset
normalization and the denormalized predictions.

Designed to be run on daily Yahoo Finance bars (open, close, high, low, volume), but the network shape, weight
initialization and state policy are all configurable through [`lstm::NetworkDesc`].
*/
#![forbid(missing_docs)]

pub mod data;
pub mod error;
pub mod fixed;
pub mod lstm;
pub mod predict;
pub mod util;

pub use error::{Error, Result};

/// The floating point type used at the edges of the network: normalization, denormalization and reporting
pub type CpuFloat = f64;
