use super::Filter;
use crate::{
    Real,
    registry::{StageKind, Violation, require},
};
use rustfft::{FftPlanner, num_complex::Complex};
use serde::Deserialize;

/// Brick-wall low-pass: every frequency bin above the cutoff is zeroed.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FftLowpass {
    pub sample_frequency: Real,
    pub cutoff_frequency: Real,
}

impl StageKind<dyn Filter> for FftLowpass {
    const KIND: &'static str = "fft-lowpass";

    fn validate(&self) -> Result<(), Violation> {
        require(self.sample_frequency > 0.0, "sample-frequency", "must be positive")?;
        require(self.cutoff_frequency > 0.0, "cutoff-frequency", "must be positive")
    }

    fn build(self) -> Box<dyn Filter> {
        Box::new(self)
    }
}

impl Filter for FftLowpass {
    fn apply(&self, samples: &[Real]) -> Vec<Real> {
        let n = samples.len();
        if n == 0 {
            return Vec::new();
        }
        let mut planner = FftPlanner::<Real>::new();
        let mut spectrum: Vec<Complex<Real>> =
            samples.iter().map(|&v| Complex::new(v, 0.0)).collect();
        planner.plan_fft_forward(n).process(&mut spectrum);

        let resolution = self.sample_frequency / n as Real;
        for (bin, value) in spectrum.iter_mut().enumerate() {
            // negative frequencies mirror the positive half
            let frequency = bin.min(n - bin) as Real * resolution;
            if frequency > self.cutoff_frequency {
                *value = Complex::new(0.0, 0.0);
            }
        }

        planner.plan_fft_inverse(n).process(&mut spectrum);
        let scale = 1.0 / n as Real;
        spectrum.into_iter().map(|v| v.re * scale).collect()
    }
}
