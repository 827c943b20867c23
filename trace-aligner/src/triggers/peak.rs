use super::{SearchRange, Trigger, TriggerResult};
use crate::{
    Real,
    registry::{StageKind, Violation, require},
};
use serde::Deserialize;
use trace_aligner_common::SampleIndex;

fn default_min_dist() -> usize {
    10
}

/// Peak search parameters. A non-negative threshold searches for maxima at or
/// above it, a negative one for minima at or below it.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PeakParameters {
    pub threshold: Real,
    /// Samples without a more extreme value needed to accept a peak.
    #[serde(default = "default_min_dist")]
    pub min_dist: usize,
}

impl PeakParameters {
    fn validate(&self) -> Result<(), Violation> {
        require(self.threshold.is_finite(), "threshold", "must be finite")
    }

    /// Follows the running extremum through `indices`, stopping at the first
    /// sample that neither beats it nor lies within `min_dist` of it.
    fn scan(&self, samples: &[Real], indices: impl Iterator<Item = SampleIndex>) -> TriggerResult {
        let find_max = self.threshold >= 0.0;
        let beats = |value: Real, other: Real| {
            if find_max {
                value > other
            } else {
                value < other
            }
        };
        let qualifies = |value: Real| {
            if find_max {
                value >= self.threshold
            } else {
                value <= self.threshold
            }
        };
        let mut peak: Option<(SampleIndex, Real)> = None;
        for index in indices {
            let Some(&value) = samples.get(index) else {
                break;
            };
            match peak {
                None if qualifies(value) => peak = Some((index, value)),
                Some((_, best)) if beats(value, best) => peak = Some((index, value)),
                Some((position, _)) if position.abs_diff(index) > self.min_dist => break,
                _ => {}
            }
        }
        peak.map(|(index, _)| TriggerResult::Found(index))
            .unwrap_or_default()
    }
}

/// The first qualifying peak scanning forward through the search range.
#[derive(Clone, Debug, Deserialize)]
#[serde(transparent)]
pub struct FirstPeak(pub PeakParameters);

impl StageKind<dyn Trigger> for FirstPeak {
    const KIND: &'static str = "first-peak";

    fn validate(&self) -> Result<(), Violation> {
        self.0.validate()
    }

    fn build(self) -> Box<dyn Trigger> {
        Box::new(self)
    }
}

impl Trigger for FirstPeak {
    fn detect(&self, samples: &[Real], range: &SearchRange) -> TriggerResult {
        self.0.scan(samples, range.indices())
    }
}

/// The last qualifying peak, scanning backward from the end of the search range.
#[derive(Clone, Debug, Deserialize)]
#[serde(transparent)]
pub struct LastPeak(pub PeakParameters);

impl StageKind<dyn Trigger> for LastPeak {
    const KIND: &'static str = "last-peak";

    fn validate(&self) -> Result<(), Violation> {
        self.0.validate()
    }

    fn build(self) -> Box<dyn Trigger> {
        Box::new(self)
    }
}

impl Trigger for LastPeak {
    fn detect(&self, samples: &[Real], range: &SearchRange) -> TriggerResult {
        self.0.scan(samples, range.indices().rev())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parameters(threshold: Real, min_dist: usize) -> PeakParameters {
        PeakParameters {
            threshold,
            min_dist,
        }
    }

    //                     0    1    2    3    4    5    6    7    8    9   10   11
    const SAMPLES: [Real; 12] = [0.0, 1.0, 5.0, 3.0, 0.0, 0.0, 0.0, 9.0, 0.0, 6.0, 0.0, 0.0];

    #[test]
    fn first_peak_respects_min_dist() {
        let full = SearchRange::full(SAMPLES.len());
        // 5 at index 2 is beaten by 9 at index 7 within six samples
        assert_eq!(
            FirstPeak(parameters(4.0, 6)).detect(&SAMPLES, &full),
            TriggerResult::Found(7)
        );
        // but not within three
        assert_eq!(
            FirstPeak(parameters(4.0, 3)).detect(&SAMPLES, &full),
            TriggerResult::Found(2)
        );
    }

    #[test]
    fn higher_value_just_past_min_dist_still_wins() {
        let samples = [0.0, 5.0, 1.0, 1.0, 6.0, 0.0, 0.0, 0.0, 0.0];
        let full = SearchRange::full(samples.len());
        assert_eq!(
            FirstPeak(parameters(1.0, 2)).detect(&samples, &full),
            TriggerResult::Found(4)
        );
        // one sample further and the scan has already stopped
        let samples = [0.0, 5.0, 1.0, 1.0, 1.0, 6.0, 0.0, 0.0, 0.0];
        assert_eq!(
            FirstPeak(parameters(1.0, 2)).detect(&samples, &full),
            TriggerResult::Found(1)
        );
    }

    #[test]
    fn last_peak_scans_backward() {
        let full = SearchRange::full(SAMPLES.len());
        assert_eq!(
            LastPeak(parameters(4.0, 0)).detect(&SAMPLES, &full),
            TriggerResult::Found(9)
        );
        assert_eq!(
            LastPeak(parameters(4.0, 1)).detect(&SAMPLES, &full),
            TriggerResult::Found(7)
        );
        assert_eq!(
            LastPeak(parameters(4.0, 3)).detect(&SAMPLES, &full),
            TriggerResult::Found(7)
        );
    }

    #[test]
    fn last_peak_reports_absolute_index() {
        let range = SearchRange::new(3, 12, 12);
        assert_eq!(
            LastPeak(parameters(8.0, 1)).detect(&SAMPLES, &range),
            TriggerResult::Found(7)
        );
    }

    #[test]
    fn negative_threshold_finds_minima() {
        let samples: Vec<Real> = SAMPLES.iter().map(|v| -v).collect();
        assert_eq!(
            FirstPeak(parameters(-4.0, 3)).detect(&samples, &SearchRange::full(12)),
            TriggerResult::Found(2)
        );
    }

    #[test]
    fn nothing_qualifies() {
        assert_eq!(
            FirstPeak(parameters(10.0, 3)).detect(&SAMPLES, &SearchRange::full(12)),
            TriggerResult::NotFound
        );
    }

    #[test]
    fn settings_shape() {
        let peak: FirstPeak =
            serde_json::from_value(serde_json::json!({"threshold": 2.0})).unwrap();
        assert_eq!(peak.0.min_dist, 10);
    }
}
