use super::Filter;
use crate::{
    Real,
    registry::{StageKind, Violation, require},
};
use serde::Deserialize;

/// Local variance envelope.
///
/// The trace is split into consecutive intervals, dropping a trailing partial
/// interval, and the population variance of each is linearly interpolated
/// back to the input length.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Variance {
    pub interval_size: usize,
}

impl StageKind<dyn Filter> for Variance {
    const KIND: &'static str = "variance";

    fn validate(&self) -> Result<(), Violation> {
        require(self.interval_size >= 2, "interval-size", "must be at least 2")
    }

    fn build(self) -> Box<dyn Filter> {
        Box::new(self)
    }
}

fn population_variance(values: &[Real]) -> Real {
    let count = values.len() as Real;
    let mean = values.iter().sum::<Real>() / count;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<Real>() / count
}

/// Resamples `values` onto `len` evenly spaced points spanning the same range.
fn stretch(values: &[Real], len: usize) -> Vec<Real> {
    match values {
        [] => vec![0.0; len],
        [only] => vec![*only; len],
        _ => {
            let last = (values.len() - 1) as Real;
            let step = if len > 1 { last / (len - 1) as Real } else { 0.0 };
            (0..len)
                .map(|i| {
                    let x = i as Real * step;
                    let left = (x.floor() as usize).min(values.len() - 2);
                    let fraction = x - left as Real;
                    let (a, b) = (values[left], values[left + 1]);
                    a + (b - a) * fraction
                })
                .collect()
        }
    }
}

impl Filter for Variance {
    fn apply(&self, samples: &[Real]) -> Vec<Real> {
        if self.interval_size == 0 || samples.len() < self.interval_size {
            return samples.to_vec();
        }
        let variances: Vec<Real> = samples
            .chunks_exact(self.interval_size)
            .map(population_variance)
            .collect();
        stretch(&variances, samples.len())
    }
}
