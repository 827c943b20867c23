//! Recursive filters applied forward and backward for zero phase shift.
mod butterworth;
mod notch;

pub use butterworth::{Band, Butterworth};
pub use notch::Notch;

use crate::Real;
use num::Complex;

/// Transfer function coefficients, highest power of `z^-1` last,
/// with `a[0] == 1`.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct TransferFunction {
    pub(crate) b: Vec<Real>,
    pub(crate) a: Vec<Real>,
}

impl TransferFunction {
    /// Normalises so that `a[0] == 1` and pads both to equal length.
    pub(crate) fn new(mut b: Vec<Real>, mut a: Vec<Real>) -> Self {
        let len = b.len().max(a.len()).max(1);
        b.resize(len, 0.0);
        a.resize(len, 0.0);
        let lead = a.first().copied().unwrap_or(1.0);
        if lead != 0.0 && lead != 1.0 {
            b.iter_mut().for_each(|v| *v /= lead);
            a.iter_mut().for_each(|v| *v /= lead);
        }
        Self { b, a }
    }

    fn order(&self) -> usize {
        self.a.len().saturating_sub(1)
    }

    /// Direct form II transposed, starting from state `zi`.
    fn filter(&self, samples: &[Real], mut state: Vec<Real>) -> Vec<Real> {
        let order = self.order();
        let (b0, b_rest, a_rest) = (self.b[0], &self.b[1..], &self.a[1..]);
        samples
            .iter()
            .map(|&x| {
                let y = b0 * x + state.first().copied().unwrap_or_default();
                for k in 0..order {
                    let next = state.get(k + 1).copied().unwrap_or_default();
                    state[k] = b_rest[k] * x - a_rest[k] * y + next;
                }
                y
            })
            .collect()
    }

    /// The steady-state filter state for a unit step input.
    fn step_state(&self) -> Vec<Real> {
        let order = self.order();
        let (b0, a) = (self.b[0], &self.a);
        let mut state = vec![0.0; order];
        if order == 0 {
            return state;
        }
        let b_sum: Real = (1..=order).map(|k| self.b[k] - a[k] * b0).sum();
        state[0] = b_sum / a.iter().sum::<Real>();
        let (mut a_sum, mut c_sum) = (1.0, 0.0);
        for k in 1..order {
            a_sum += a[k];
            c_sum += self.b[k] - a[k] * b0;
            state[k] = a_sum * state[0] - c_sum;
        }
        state
    }

    /// Zero-phase filtering: forward then backward over an odd extension of
    /// the signal, each pass started in steady state.
    pub(crate) fn filtfilt(&self, samples: &[Real]) -> Vec<Real> {
        let n = samples.len();
        if n < 2 || self.order() == 0 {
            return samples.to_vec();
        }
        let pad = (3 * self.a.len()).min(n - 1);
        let (first, last) = (samples[0], samples[n - 1]);
        let extended: Vec<Real> = (1..=pad)
            .rev()
            .map(|i| 2.0 * first - samples[i])
            .chain(samples.iter().copied())
            .chain((1..=pad).map(|i| 2.0 * last - samples[n - 1 - i]))
            .collect();

        let zi = self.step_state();
        let scaled = |x0: Real| zi.iter().map(|z| z * x0).collect::<Vec<_>>();

        let forward = self.filter(&extended, scaled(extended[0]));
        let reversed: Vec<Real> = forward.into_iter().rev().collect();
        let backward = self.filter(&reversed, scaled(reversed[0]));
        backward.into_iter().rev().skip(pad).take(n).collect()
    }
}

/// Coefficients of the monic polynomial with the given roots, highest power first.
pub(crate) fn poly(roots: &[Complex<Real>]) -> Vec<Complex<Real>> {
    roots.iter().fold(vec![Complex::new(1.0, 0.0)], |coefficients, root| {
        let mut next = coefficients.clone();
        next.push(Complex::new(0.0, 0.0));
        for (k, c) in coefficients.iter().enumerate() {
            next[k + 1] -= root * c;
        }
        next
    })
}
