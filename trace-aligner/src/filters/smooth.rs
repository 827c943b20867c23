use super::Filter;
use crate::{
    Real,
    registry::{StageKind, Violation, require},
};
use serde::Deserialize;
use std::f64::consts::PI;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowFunction {
    #[default]
    Flat,
    Hanning,
    Hamming,
    Bartlett,
    Blackman,
}

impl WindowFunction {
    /// The symmetric window of `len` points, normalised to unit sum.
    fn coefficients(self, len: usize) -> Vec<Real> {
        let span = (len - 1) as Real;
        let raw: Vec<Real> = (0..len)
            .map(|n| {
                let n = n as Real;
                match self {
                    WindowFunction::Flat => 1.0,
                    WindowFunction::Hanning => 0.5 - 0.5 * (2.0 * PI * n / span).cos(),
                    WindowFunction::Hamming => 0.54 - 0.46 * (2.0 * PI * n / span).cos(),
                    WindowFunction::Bartlett => 1.0 - (2.0 * n / span - 1.0).abs(),
                    WindowFunction::Blackman => {
                        0.42 - 0.5 * (2.0 * PI * n / span).cos()
                            + 0.08 * (4.0 * PI * n / span).cos()
                    }
                }
            })
            .collect();
        let sum: Real = raw.iter().sum();
        raw.into_iter().map(|w| w / sum).collect()
    }
}

/// Window-function smoothing which preserves the trace length.
///
/// The signal is extended at both ends by mirrored copies of itself before
/// convolving. The leading mirror excludes the first sample, the trailing
/// mirror includes the last.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Smooth {
    pub window_len: usize,
    #[serde(default)]
    pub window: WindowFunction,
}

impl StageKind<dyn Filter> for Smooth {
    const KIND: &'static str = "smooth";

    fn validate(&self) -> Result<(), Violation> {
        require(self.window_len % 2 == 1, "window-len", "must be odd")
    }

    fn build(self) -> Box<dyn Filter> {
        Box::new(self)
    }
}

impl Filter for Smooth {
    fn apply(&self, samples: &[Real]) -> Vec<Real> {
        let n = samples.len();
        if self.window_len < 3 || n < self.window_len {
            return samples.to_vec();
        }
        let weights = self.window.coefficients(self.window_len);
        let half = (self.window_len / 2) as isize;
        let extended = |j: isize| -> Real {
            let index = if j < 0 {
                j.unsigned_abs()
            } else if j as usize >= n {
                2 * n - 1 - j as usize
            } else {
                j as usize
            };
            samples.get(index).copied().unwrap_or_default()
        };
        (0..n as isize)
            .map(|i| {
                weights
                    .iter()
                    .zip(i - half..)
                    .map(|(w, j)| w * extended(j))
                    .sum::<Real>()
            })
            .collect()
    }
}
