//! Signal transforms applied to a trace before triggering.
//!
//! Filters shape the signal seen by the triggers only. They are never
//! applied to the data that is cropped and exported.
mod absolute;
mod fft_lowpass;
mod gaussian;
mod iir;
mod moving_average;
mod smooth;
mod variance;

pub use absolute::Absolute;
pub use fft_lowpass::FftLowpass;
pub use gaussian::Gaussian;
pub use iir::{Band, Butterworth, Notch};
pub use moving_average::MovingAverage;
pub use smooth::{Smooth, WindowFunction};
pub use variance::Variance;

use crate::{
    Real,
    error::StageClass,
    registry::Registry,
};
use std::fmt::Debug;

/// A pure transform of one trace. The output may differ in length from the input.
pub trait Filter: Debug + Send + Sync {
    fn apply(&self, samples: &[Real]) -> Vec<Real>;
}

/// All built-in filter kinds.
pub fn registry() -> Registry<dyn Filter> {
    let mut registry = Registry::new(StageClass::Filter);
    registry
        .register::<Absolute>()
        .register::<MovingAverage>()
        .register::<Smooth>()
        .register::<Gaussian>()
        .register::<Variance>()
        .register::<FftLowpass>()
        .register::<Butterworth>()
        .register::<Notch>();
    registry
}
