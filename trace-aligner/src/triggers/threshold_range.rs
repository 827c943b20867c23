use super::{SearchRange, Trigger, TriggerResult};
use crate::{
    Real,
    registry::{StageKind, Violation, require},
};
use serde::Deserialize;
use trace_aligner_common::SampleIndex;

fn default_min_range() -> usize {
    500
}

/// A stretch of at least `min_range` samples spent above the threshold band,
/// or below it when `inverse` is set.
///
/// The excursion starts at the first sample at or beyond
/// `threshold + hysteresis` and ends at the first later sample at or beyond
/// `threshold - hysteresis` on the other side. A stretch that ends too early
/// is discarded and the search resumes after it.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ThresholdRange {
    pub threshold: Real,
    #[serde(default)]
    pub hysteresis: Real,
    #[serde(default = "default_min_range")]
    pub min_range: usize,
    #[serde(default)]
    pub inverse: bool,
}

impl ThresholdRange {
    fn starts(&self, value: Real) -> bool {
        if self.inverse {
            value <= self.threshold - self.hysteresis
        } else {
            value >= self.threshold + self.hysteresis
        }
    }

    fn ends(&self, value: Real) -> bool {
        if self.inverse {
            value >= self.threshold + self.hysteresis
        } else {
            value <= self.threshold - self.hysteresis
        }
    }
}

impl StageKind<dyn Trigger> for ThresholdRange {
    const KIND: &'static str = "threshold-range";

    fn validate(&self) -> Result<(), Violation> {
        require(self.hysteresis >= 0.0, "hysteresis", "must not be negative")?;
        require(self.min_range >= 1, "min-range", "must be at least 1")
    }

    fn build(self) -> Box<dyn Trigger> {
        Box::new(self)
    }
}

impl Trigger for ThresholdRange {
    fn detect(&self, samples: &[Real], range: &SearchRange) -> TriggerResult {
        let mut start: Option<SampleIndex> = None;
        for index in range.indices() {
            let Some(&value) = samples.get(index) else {
                break;
            };
            match start {
                None if self.starts(value) => start = Some(index),
                Some(first) if self.ends(value) => {
                    if index - first >= self.min_range {
                        return TriggerResult::Found2(first, index);
                    }
                    start = None;
                }
                _ => {}
            }
        }
        TriggerResult::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StageSettings;
    use serde_json::json;

    fn trigger(min_range: usize, inverse: bool) -> ThresholdRange {
        ThresholdRange {
            threshold: 1.0,
            hysteresis: 0.5,
            min_range,
            inverse,
        }
    }

    //                          0    1    2    3    4    5    6    7    8    9
    const SAMPLES: [Real; 10] = [0.0, 2.0, 0.0, 2.0, 1.0, 2.0, 2.0, 0.4, 0.0, 0.0];

    #[test]
    fn short_excursions_are_skipped() {
        let full = SearchRange::full(SAMPLES.len());
        // 1..2 is too short, 3..7 ignores the dip to 1.0 inside the hysteresis band
        assert_eq!(
            trigger(3, false).detect(&SAMPLES, &full),
            TriggerResult::Found2(3, 7)
        );
        assert_eq!(
            trigger(1, false).detect(&SAMPLES, &full),
            TriggerResult::Found2(1, 2)
        );
        assert_eq!(
            trigger(5, false).detect(&SAMPLES, &full),
            TriggerResult::NotFound
        );
    }

    #[test]
    fn inverse_excursion() {
        let samples: Vec<Real> = SAMPLES.iter().map(|v| 2.0 - v).collect();
        assert_eq!(
            trigger(3, true).detect(&samples, &SearchRange::full(10)),
            TriggerResult::Found2(3, 7)
        );
    }

    #[test]
    fn unterminated_excursion() {
        assert_eq!(
            trigger(1, false).detect(&[0.0, 2.0, 2.0, 2.0], &SearchRange::full(4)),
            TriggerResult::NotFound
        );
    }

    #[test]
    fn rejects_negative_hysteresis() {
        let registry = crate::triggers::registry();
        assert!(
            registry
                .build(&StageSettings::new(
                    "threshold-range",
                    json!({"threshold": 1.0, "hysteresis": -0.1})
                ))
                .is_err()
        );
        assert!(
            registry
                .build(&StageSettings::new("threshold-range", json!({"threshold": 1.0})))
                .is_ok()
        );
    }
}
