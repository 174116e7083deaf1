#![no_std]
extern crate alloc;

pub mod band_aggregator;
pub mod color;
pub mod matrix;
pub mod normalizer;
pub mod smoother;

pub use band_aggregator::BandAggregator;
pub use matrix::{ColumnPeak, LedMatrix, LedSink};
pub use normalizer::{GainMode, Normalizer};
pub use smoother::SpeedSmoother;
