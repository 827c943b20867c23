use super::Filter;
use crate::{
    Real,
    registry::{StageKind, Violation, require},
};
use serde::Deserialize;

fn default_truncate() -> Real {
    4.0
}

/// Gaussian smoothing with reflecting boundaries (`d c b a | a b c d | d c b a`).
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Gaussian {
    pub sigma: Real,
    /// Kernel radius in units of `sigma`.
    #[serde(default = "default_truncate")]
    pub truncate: Real,
}

impl Gaussian {
    fn kernel(&self) -> Vec<Real> {
        let radius = (self.truncate * self.sigma + 0.5) as usize;
        let variance = self.sigma * self.sigma;
        let raw: Vec<Real> = (0..=2 * radius)
            .map(|i| {
                let x = i as Real - radius as Real;
                (-0.5 * x * x / variance).exp()
            })
            .collect();
        let sum: Real = raw.iter().sum();
        raw.into_iter().map(|w| w / sum).collect()
    }
}

impl StageKind<dyn Filter> for Gaussian {
    const KIND: &'static str = "gaussian";

    fn validate(&self) -> Result<(), Violation> {
        require(self.sigma > 0.0, "sigma", "must be positive")?;
        require(self.truncate > 0.0, "truncate", "must be positive")
    }

    fn build(self) -> Box<dyn Filter> {
        Box::new(self)
    }
}

fn reflect(index: isize, len: usize) -> usize {
    let period = 2 * len as isize;
    let folded = index.rem_euclid(period) as usize;
    if folded < len {
        folded
    } else {
        2 * len - 1 - folded
    }
}

impl Filter for Gaussian {
    fn apply(&self, samples: &[Real]) -> Vec<Real> {
        let n = samples.len();
        if n == 0 {
            return Vec::new();
        }
        let kernel = self.kernel();
        let radius = (kernel.len() / 2) as isize;
        (0..n as isize)
            .map(|i| {
                kernel
                    .iter()
                    .zip(i - radius..)
                    .map(|(w, j)| w * samples.get(reflect(j, n)).copied().unwrap_or_default())
                    .sum::<Real>()
            })
            .collect()
    }
}
