use super::{TransferFunction, poly};
use crate::{
    Real,
    filters::Filter,
    registry::{StageKind, Violation, require},
};
use num::Complex;
use serde::Deserialize;
use std::f64::consts::PI;

const MAX_ORDER: usize = 10;

/// Frequencies in Hz.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Band {
    LowPass { cutoff: Real },
    HighPass { cutoff: Real },
    BandPass { low: Real, high: Real },
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Butterworth {
    pub order: usize,
    pub sample_frequency: Real,
    pub band: Band,
}

impl StageKind<dyn Filter> for Butterworth {
    const KIND: &'static str = "butterworth";

    fn validate(&self) -> Result<(), Violation> {
        require(
            (1..=MAX_ORDER).contains(&self.order),
            "order",
            format!("must be between 1 and {MAX_ORDER}"),
        )?;
        require(self.sample_frequency > 0.0, "sample-frequency", "must be positive")?;
        let nyquist = self.sample_frequency / 2.0;
        let in_band = |f: Real| f > 0.0 && f < nyquist;
        match self.band {
            Band::LowPass { cutoff } | Band::HighPass { cutoff } => require(
                in_band(cutoff),
                "band",
                format!("cutoff must lie strictly between 0 and {nyquist} Hz"),
            ),
            Band::BandPass { low, high } => require(
                in_band(low) && in_band(high) && low < high,
                "band",
                format!("requires 0 < low < high < {nyquist} Hz"),
            ),
        }
    }

    fn build(self) -> Box<dyn Filter> {
        Box::new(ButterworthFilter(self.design()))
    }
}

fn product(values: impl Iterator<Item = Complex<Real>>) -> Complex<Real> {
    values.fold(Complex::new(1.0, 0.0), |acc, v| acc * v)
}

impl Butterworth {
    /// Digital design by bilinear transform of the analog prototype.
    fn design(&self) -> TransferFunction {
        let order = self.order;
        // Pre-warped analog frequency for a unit sampling interval of 1/2.
        let warp = |f: Real| 4.0 * (PI * f / self.sample_frequency).tan();
        let prototype: Vec<Complex<Real>> = (0..order)
            .map(|k| {
                let m = 2.0 * k as Real + 1.0 - order as Real;
                -Complex::from_polar(1.0, PI * m / (2.0 * order as Real))
            })
            .collect();

        let (zeros, poles, gain) = match self.band {
            Band::LowPass { cutoff } => {
                let wo = warp(cutoff);
                let poles: Vec<_> = prototype.iter().map(|&p| p * wo).collect();
                (Vec::new(), poles, wo.powi(order as i32))
            }
            Band::HighPass { cutoff } => {
                let wo = Complex::new(warp(cutoff), 0.0);
                let poles: Vec<_> = prototype.iter().map(|&p| wo / p).collect();
                let gain = (Complex::new(1.0, 0.0) / product(prototype.iter().map(|&p| -p))).re;
                (vec![Complex::new(0.0, 0.0); order], poles, gain)
            }
            Band::BandPass { low, high } => {
                let (w0, w1) = (warp(low), warp(high));
                let bandwidth = w1 - w0;
                let centre_squared = w0 * w1;
                let poles: Vec<_> = prototype
                    .iter()
                    .map(|&p| p * bandwidth / 2.0)
                    .flat_map(|p| {
                        let offset = (p * p - centre_squared).sqrt();
                        [p + offset, p - offset]
                    })
                    .collect();
                (
                    vec![Complex::new(0.0, 0.0); order],
                    poles,
                    bandwidth.powi(order as i32),
                )
            }
        };
        bilinear(zeros, poles, gain)
    }
}

/// Maps analog zeros, poles and gain to a digital transfer function.
fn bilinear(zeros: Vec<Complex<Real>>, poles: Vec<Complex<Real>>, gain: Real) -> TransferFunction {
    let fs2 = Complex::new(4.0, 0.0);
    let map = |&s: &Complex<Real>| (fs2 + s) / (fs2 - s);
    let degree = poles.len() - zeros.len();
    let digital_zeros: Vec<_> = zeros
        .iter()
        .map(map)
        .chain(std::iter::repeat_n(Complex::new(-1.0, 0.0), degree))
        .collect();
    let digital_poles: Vec<_> = poles.iter().map(map).collect();
    let digital_gain = gain
        * (product(zeros.iter().map(|&z| fs2 - z)) / product(poles.iter().map(|&p| fs2 - p))).re;

    TransferFunction::new(
        poly(&digital_zeros)
            .into_iter()
            .map(|c| c.re * digital_gain)
            .collect(),
        poly(&digital_poles).into_iter().map(|c| c.re).collect(),
    )
}

#[derive(Debug)]
struct ButterworthFilter(TransferFunction);

impl Filter for ButterworthFilter {
    fn apply(&self, samples: &[Real]) -> Vec<Real> {
        self.0.filtfilt(samples)
    }
}
