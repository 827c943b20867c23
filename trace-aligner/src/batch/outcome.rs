use crate::triggers::TriggerResult;
use serde::Serialize;
use std::ops::Range;
use trace_aligner_common::{
    SampleIndex, TraceIndex,
    metrics::{anchors::AnchorKind, rejections::RejectionKind},
};

/// Which point of a trigger result a crop is anchored at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    Primary,
    Secondary,
}

impl From<Anchor> for AnchorKind {
    fn from(anchor: Anchor) -> Self {
        match anchor {
            Anchor::Primary => AnchorKind::Primary,
            Anchor::Secondary => AnchorKind::Secondary,
        }
    }
}

/// Why a trace, or one anchor of a trace, contributed no crop. These are
/// expected outcomes of a batch run, not errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rejection {
    TriggerNotFound,
    WindowOutOfBounds,
}

impl From<Rejection> for RejectionKind {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::TriggerNotFound => RejectionKind::TriggerNotFound,
            Rejection::WindowOutOfBounds => RejectionKind::WindowOutOfBounds,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnchorOutcome {
    pub anchor: Anchor,
    /// Position reported by the trigger.
    pub index: SampleIndex,
    /// The waveform sample range cropped around `index`.
    pub crop: Result<Range<SampleIndex>, Rejection>,
}

/// Everything the batch decided about one trace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceOutcome {
    pub trace: TraceIndex,
    pub trigger: TriggerResult,
    /// One entry per point of `trigger`, primary first.
    pub anchors: Vec<AnchorOutcome>,
}

impl TraceOutcome {
    /// The reason this trace contributed nothing, if it did not.
    pub fn rejection(&self) -> Option<Rejection> {
        if self.anchors.is_empty() {
            Some(Rejection::TriggerNotFound)
        } else if self.anchors.iter().all(|anchor| anchor.crop.is_err()) {
            Some(Rejection::WindowOutOfBounds)
        } else {
            None
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.rejection().is_none()
    }

    /// The accepted crops of this trace, primary first.
    pub fn crops(&self) -> impl Iterator<Item = (&AnchorOutcome, &Range<SampleIndex>)> {
        self.anchors
            .iter()
            .filter_map(|anchor| anchor.crop.as_ref().ok().map(|range| (anchor, range)))
    }
}

/// Crops accepted and rejected for one anchor. Their sum is the number of
/// traces whose trigger produced that anchor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AnchorCounts {
    pub accepted: usize,
    pub rejected: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BatchCounts {
    pub total: usize,
    /// Traces contributing at least one crop.
    pub accepted_traces: usize,
    pub rejected_traces: usize,
    pub trigger_not_found: usize,
    pub crops: usize,
    pub primary: AnchorCounts,
    pub secondary: AnchorCounts,
}

impl BatchCounts {
    pub fn tally<'a>(outcomes: impl IntoIterator<Item = &'a TraceOutcome>) -> Self {
        let mut counts = Self::default();
        for outcome in outcomes {
            counts.total += 1;
            match outcome.rejection() {
                None => counts.accepted_traces += 1,
                Some(Rejection::TriggerNotFound) => {
                    counts.rejected_traces += 1;
                    counts.trigger_not_found += 1;
                }
                Some(Rejection::WindowOutOfBounds) => counts.rejected_traces += 1,
            }
            for anchor in &outcome.anchors {
                let per_anchor = match anchor.anchor {
                    Anchor::Primary => &mut counts.primary,
                    Anchor::Secondary => &mut counts.secondary,
                };
                if anchor.crop.is_ok() {
                    per_anchor.accepted += 1;
                    counts.crops += 1;
                } else {
                    per_anchor.rejected += 1;
                }
            }
        }
        counts
    }
}
