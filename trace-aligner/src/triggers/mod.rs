//! Detectors locating one or two feature points in a filtered trace.
mod edge;
mod hold_off;
mod peak;
mod threshold_range;

pub use edge::{FallingEdge, RisingEdge};
pub use hold_off::HoldOff;
pub use peak::{FirstPeak, LastPeak, PeakParameters};
pub use threshold_range::ThresholdRange;

use crate::{error::StageClass, registry::Registry, Real};
use serde::Serialize;
use std::{fmt::Debug, ops::Range};
use trace_aligner_common::SampleIndex;

/// The outcome of a detection. Indices are absolute positions in the
/// sequence the trigger ran on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerResult {
    #[default]
    NotFound,
    Found(SampleIndex),
    /// Two points with the first strictly before the second.
    Found2(SampleIndex, SampleIndex),
}

impl TriggerResult {
    pub fn is_found(&self) -> bool {
        !matches!(self, TriggerResult::NotFound)
    }

    /// The range a subsequent trigger searches, for a sequence of `len` samples.
    ///
    /// After a single point the search continues from that point to the end.
    /// After two points it is confined to the interval between them, inclusive.
    pub fn narrow(&self, len: usize) -> Option<SearchRange> {
        match *self {
            TriggerResult::NotFound => None,
            TriggerResult::Found(index) => Some(SearchRange::new(index, len, len)),
            TriggerResult::Found2(first, second) => {
                Some(SearchRange::new(first, second + 1, len))
            }
        }
    }
}

/// A half-open range of sample indices, never extending past the sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchRange(Range<SampleIndex>);

impl SearchRange {
    pub fn new(start: SampleIndex, end: SampleIndex, len: usize) -> Self {
        let end = end.min(len);
        Self(start.min(end)..end)
    }

    pub fn full(len: usize) -> Self {
        Self(0..len)
    }

    pub fn start(&self) -> SampleIndex {
        self.0.start
    }

    pub fn end(&self) -> SampleIndex {
        self.0.end
    }

    pub fn contains(&self, index: SampleIndex) -> bool {
        self.0.contains(&index)
    }

    pub fn indices(&self) -> Range<SampleIndex> {
        self.0.clone()
    }
}

/// A pure detector over one filtered trace.
pub trait Trigger: Debug + Send + Sync {
    /// Searches `samples` within `range`, which lies inside `samples`.
    fn detect(&self, samples: &[Real], range: &SearchRange) -> TriggerResult;
}

/// All built-in trigger kinds.
pub fn registry() -> Registry<dyn Trigger> {
    let mut registry = Registry::new(StageClass::Trigger);
    registry
        .register::<RisingEdge>()
        .register::<FallingEdge>()
        .register::<FirstPeak>()
        .register::<LastPeak>()
        .register::<ThresholdRange>()
        .register::<HoldOff>();
    registry
}
