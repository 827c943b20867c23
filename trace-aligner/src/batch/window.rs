use crate::ParameterError;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use trace_aligner_common::SampleIndex;

/// Samples kept either side of an anchor. The anchor itself is always kept.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Offsets {
    pub before: usize,
    pub after: usize,
}

impl Offsets {
    pub fn new(before: usize, after: usize) -> Self {
        Self { before, after }
    }

    /// Number of samples in every crop made with these offsets, `None` if
    /// it does not fit in a `usize`.
    pub fn checked_crop_len(&self) -> Option<usize> {
        self.before.checked_add(self.after)?.checked_add(1)
    }

    /// Saturates where [Self::checked_crop_len] would fail.
    pub fn crop_len(&self) -> usize {
        self.checked_crop_len().unwrap_or(usize::MAX)
    }

    /// The crop around `anchor` in a trace of `samples` samples, or `None` if
    /// any part of it falls outside the trace.
    pub fn crop(&self, anchor: SampleIndex, samples: usize) -> Option<Range<SampleIndex>> {
        let start = anchor.checked_sub(self.before)?;
        let last = anchor.checked_add(self.after)?;
        (last < samples).then_some(start..last + 1)
    }
}

/// The crop regions used for each anchor a trigger can produce.
///
/// The first point of a pipeline result is cropped with `primary`, the second
/// point of a two-point result with `secondary`, or `primary` when absent.
/// Both must yield crops of the same length.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlignmentWindow {
    pub primary: Offsets,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<Offsets>,
}

impl AlignmentWindow {
    pub fn new(primary: Offsets, secondary: Option<Offsets>) -> Result<Self, ParameterError> {
        let window = Self { primary, secondary };
        window.validate()?;
        Ok(window)
    }

    pub fn single(before: usize, after: usize) -> Self {
        Self {
            primary: Offsets::new(before, after),
            secondary: None,
        }
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        let span = |offsets: Offsets| {
            offsets.checked_crop_len().ok_or_else(|| {
                ParameterError::Window(format!(
                    "{} samples before and {} after overflow the crop length",
                    offsets.before, offsets.after
                ))
            })
        };
        let primary = span(self.primary)?;
        match self.secondary.map(span).transpose()? {
            Some(secondary) if secondary != primary => Err(ParameterError::Window(format!(
                "primary offsets span {primary} samples but secondary offsets span {secondary}"
            ))),
            _ => Ok(()),
        }
    }

    pub fn crop_len(&self) -> usize {
        self.primary.crop_len()
    }

    pub fn secondary_or_primary(&self) -> Offsets {
        self.secondary.unwrap_or(self.primary)
    }
}
