use super::Filter;
use crate::{
    Real,
    registry::{StageKind, Violation, require},
};
use serde::Deserialize;

/// Flat moving average over complete windows only, so the output is
/// `window_len - 1` samples shorter than the input.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct MovingAverage {
    pub window_len: usize,
}

impl StageKind<dyn Filter> for MovingAverage {
    const KIND: &'static str = "moving-average";

    fn validate(&self) -> Result<(), Violation> {
        require(self.window_len >= 1, "window-len", "must be at least 1")
    }

    fn build(self) -> Box<dyn Filter> {
        Box::new(self)
    }
}

impl Filter for MovingAverage {
    fn apply(&self, samples: &[Real]) -> Vec<Real> {
        if self.window_len == 0 || samples.len() < self.window_len {
            return samples.to_vec();
        }
        let scale = self.window_len as Real;
        samples
            .windows(self.window_len)
            .map(|window| window.iter().sum::<Real>() / scale)
            .collect()
    }
}
