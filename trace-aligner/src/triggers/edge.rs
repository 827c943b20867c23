use super::{SearchRange, Trigger, TriggerResult};
use crate::{Real, registry::StageKind};
use itertools::Itertools;
use serde::Deserialize;

/// Finds the first adjacent pair `(i - 1, i)` in `range` for which `crossed` holds.
fn first_crossing(
    samples: &[Real],
    range: &SearchRange,
    crossed: impl Fn(Real, Real) -> bool,
) -> TriggerResult {
    samples
        .get(range.indices())
        .unwrap_or_default()
        .iter()
        .enumerate()
        .tuple_windows()
        .find(|&((_, before), (_, after))| crossed(*before, *after))
        .map(|(_, (offset, _))| TriggerResult::Found(range.start() + offset))
        .unwrap_or_default()
}

/// The first index where the signal moves from below `threshold` to at or above it.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RisingEdge {
    pub threshold: Real,
}

impl StageKind<dyn Trigger> for RisingEdge {
    const KIND: &'static str = "rising-edge";

    fn build(self) -> Box<dyn Trigger> {
        Box::new(self)
    }
}

impl Trigger for RisingEdge {
    fn detect(&self, samples: &[Real], range: &SearchRange) -> TriggerResult {
        first_crossing(samples, range, |before, after| {
            before < self.threshold && after >= self.threshold
        })
    }
}

/// The first index where the signal moves from above `threshold` to at or below it.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FallingEdge {
    pub threshold: Real,
}

impl StageKind<dyn Trigger> for FallingEdge {
    const KIND: &'static str = "falling-edge";

    fn build(self) -> Box<dyn Trigger> {
        Box::new(self)
    }
}

impl Trigger for FallingEdge {
    fn detect(&self, samples: &[Real], range: &SearchRange) -> TriggerResult {
        first_crossing(samples, range, |before, after| {
            before > self.threshold && after <= self.threshold
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(len: usize, at: usize, amplitude: Real) -> Vec<Real> {
        (0..len).map(|i| if i < at { 0.0 } else { amplitude }).collect()
    }

    #[test]
    fn rising_step() {
        let samples = step(100, 37, 5.0);
        let trigger = RisingEdge { threshold: 2.5 };
        assert_eq!(
            trigger.detect(&samples, &SearchRange::full(samples.len())),
            TriggerResult::Found(37)
        );
    }

    #[test]
    fn threshold_equal_to_amplitude_counts() {
        let samples = step(10, 4, 5.0);
        let trigger = RisingEdge { threshold: 5.0 };
        assert_eq!(
            trigger.detect(&samples, &SearchRange::full(10)),
            TriggerResult::Found(4)
        );
    }

    #[test]
    fn no_crossing() {
        let samples = [0.0, 1.0, 2.0, 1.0];
        let trigger = RisingEdge { threshold: 3.0 };
        assert_eq!(
            trigger.detect(&samples, &SearchRange::full(4)),
            TriggerResult::NotFound
        );
        // Starting above the threshold is not an edge.
        let trigger = RisingEdge { threshold: -1.0 };
        assert_eq!(
            trigger.detect(&samples, &SearchRange::full(4)),
            TriggerResult::NotFound
        );
    }

    #[test]
    fn search_starts_at_range() {
        let samples = [0.0, 4.0, 0.0, 4.0, 0.0];
        let trigger = RisingEdge { threshold: 2.0 };
        assert_eq!(
            trigger.detect(&samples, &SearchRange::new(1, 5, 5)),
            TriggerResult::Found(3)
        );
        assert_eq!(
            trigger.detect(&samples, &SearchRange::new(1, 3, 5)),
            TriggerResult::NotFound
        );
    }

    #[test]
    fn falling_step() {
        let samples: Vec<Real> = step(20, 12, 3.0).into_iter().map(|v| 3.0 - v).collect();
        let trigger = FallingEdge { threshold: 1.0 };
        assert_eq!(
            trigger.detect(&samples, &SearchRange::full(20)),
            TriggerResult::Found(12)
        );
    }
}
