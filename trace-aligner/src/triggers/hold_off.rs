use super::{SearchRange, Trigger, TriggerResult};
use crate::{Real, registry::StageKind};
use serde::Deserialize;
use trace_aligner_common::SampleIndex;

/// A fixed distance past the start of the search range. Chained after another
/// trigger this moves the anchor by `holdoff` samples.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HoldOff {
    pub holdoff: SampleIndex,
}

impl StageKind<dyn Trigger> for HoldOff {
    const KIND: &'static str = "hold-off";

    fn build(self) -> Box<dyn Trigger> {
        Box::new(self)
    }
}

impl Trigger for HoldOff {
    fn detect(&self, _samples: &[Real], range: &SearchRange) -> TriggerResult {
        range
            .start()
            .checked_add(self.holdoff)
            .filter(|&index| range.contains(index))
            .map(TriggerResult::Found)
            .unwrap_or_default()
    }
}
