use super::TransferFunction;
use crate::{
    Real,
    filters::Filter,
    registry::{StageKind, Violation, require},
};
use serde::Deserialize;
use std::f64::consts::PI;

fn default_harmonics() -> usize {
    1
}

/// Removes a narrow band at `notch_frequency` and at each of its first
/// `harmonics` multiples, one zero-phase second-order section per frequency.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Notch {
    pub sample_frequency: Real,
    pub notch_frequency: Real,
    /// Centre frequency over -3 dB bandwidth.
    pub quality: Real,
    #[serde(default = "default_harmonics")]
    pub harmonics: usize,
}

impl Notch {
    fn section(&self, frequency: Real) -> TransferFunction {
        let w0 = 2.0 * PI * frequency / self.sample_frequency;
        let bandwidth = w0 / self.quality;
        let gain = 1.0 / (1.0 + (bandwidth / 2.0).tan());
        TransferFunction::new(
            vec![gain, -2.0 * gain * w0.cos(), gain],
            vec![1.0, -2.0 * gain * w0.cos(), 2.0 * gain - 1.0],
        )
    }
}

impl StageKind<dyn Filter> for Notch {
    const KIND: &'static str = "notch";

    fn validate(&self) -> Result<(), Violation> {
        require(self.sample_frequency > 0.0, "sample-frequency", "must be positive")?;
        require(self.quality > 0.0, "quality", "must be positive")?;
        require(self.harmonics >= 1, "harmonics", "must be at least 1")?;
        let nyquist = self.sample_frequency / 2.0;
        require(
            self.notch_frequency > 0.0 && self.notch_frequency * (self.harmonics as Real) < nyquist,
            "notch-frequency",
            format!("every harmonic must lie strictly between 0 and {nyquist} Hz"),
        )
    }

    fn build(self) -> Box<dyn Filter> {
        let sections = (1..=self.harmonics)
            .map(|harmonic| self.section(self.notch_frequency * harmonic as Real))
            .collect();
        Box::new(NotchFilter(sections))
    }
}

#[derive(Debug)]
struct NotchFilter(Vec<TransferFunction>);

impl Filter for NotchFilter {
    fn apply(&self, samples: &[Real]) -> Vec<Real> {
        self.0
            .iter()
            .fold(samples.to_vec(), |signal, section| section.filtfilt(&signal))
    }
}
