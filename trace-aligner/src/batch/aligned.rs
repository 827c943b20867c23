use super::{Anchor, TraceOutcome};
use crate::{
    FormatError,
    data::{ChannelStore, RowSlice},
};
use serde::Serialize;
use std::collections::BTreeMap;
use trace_aligner_common::{SampleIndex, TraceIndex};

/// Where one output trace of an [AlignedDataset] came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CropSource {
    pub trace: TraceIndex,
    pub anchor: Anchor,
    pub trigger_index: SampleIndex,
}

/// The accepted crops of a batch run, renumbered from zero in source order.
///
/// Row `j` of every channel belongs to `crops()[j]`. Waveform channels hold
/// the cropped samples, companion channels the whole row of the source trace.
#[derive(Clone, Debug, PartialEq)]
pub struct AlignedDataset {
    store: ChannelStore,
    crops: Vec<CropSource>,
}

impl AlignedDataset {
    /// Gathers the crops of `outcomes`, which must be in trace order, from `source`.
    pub(crate) fn assemble<'a>(
        source: &ChannelStore,
        outcomes: impl IntoIterator<Item = &'a TraceOutcome>,
        crop_len: usize,
    ) -> Result<Self, FormatError> {
        let (crops, ranges): (Vec<_>, Vec<_>) = outcomes
            .into_iter()
            .flat_map(|outcome| {
                outcome.crops().map(|(anchor, range)| {
                    (
                        CropSource {
                            trace: outcome.trace,
                            anchor: anchor.anchor,
                            trigger_index: anchor.index,
                        },
                        range.clone(),
                    )
                })
            })
            .unzip();

        let channels = source
            .iter()
            .map(|(channel, array)| {
                let (rows, width) = if channel.is_waveform() {
                    let rows: Vec<RowSlice> = crops
                        .iter()
                        .zip(&ranges)
                        .map(|(crop, range)| RowSlice {
                            trace: crop.trace,
                            samples: range.clone(),
                        })
                        .collect();
                    (rows, crop_len)
                } else {
                    let width = array.samples_per_trace();
                    let rows: Vec<RowSlice> = crops
                        .iter()
                        .map(|crop| RowSlice {
                            trace: crop.trace,
                            samples: 0..width,
                        })
                        .collect();
                    (rows, width)
                };
                (channel.clone(), array.gather(&rows, width))
            })
            .collect::<BTreeMap<_, _>>();

        Ok(Self {
            store: ChannelStore::new(channels)?,
            crops,
        })
    }

    pub fn store(&self) -> &ChannelStore {
        &self.store
    }

    pub fn crops(&self) -> &[CropSource] {
        &self.crops
    }

    pub fn len(&self) -> usize {
        self.crops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crops.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        batch::{AnchorOutcome, Rejection},
        data::{Channel, ChannelArray},
        triggers::TriggerResult,
    };
    use ndarray::array;

    fn source() -> ChannelStore {
        ChannelStore::new(BTreeMap::from([
            (
                Channel::Em,
                ChannelArray::from_array(array![
                    [0i16, 1, 2, 3, 4],
                    [10, 11, 12, 13, 14],
                    [20, 21, 22, 23, 24]
                ]),
            ),
            (
                Channel::Plain,
                ChannelArray::from_array(array![[0u8, 100], [1, 101], [2, 102]]),
            ),
        ]))
        .unwrap()
    }

    fn accepted(anchor: Anchor, index: SampleIndex) -> AnchorOutcome {
        AnchorOutcome {
            anchor,
            index,
            crop: Ok(index - 1..index + 2),
        }
    }

    #[test]
    fn companions_follow_their_crops() {
        let outcomes = [
            TraceOutcome {
                trace: 0,
                trigger: TriggerResult::Found2(1, 3),
                anchors: vec![
                    accepted(Anchor::Primary, 1),
                    accepted(Anchor::Secondary, 3),
                ],
            },
            TraceOutcome {
                trace: 1,
                trigger: TriggerResult::NotFound,
                anchors: vec![],
            },
            TraceOutcome {
                trace: 2,
                trigger: TriggerResult::Found2(2, 4),
                anchors: vec![
                    accepted(Anchor::Primary, 2),
                    AnchorOutcome {
                        anchor: Anchor::Secondary,
                        index: 4,
                        crop: Err(Rejection::WindowOutOfBounds),
                    },
                ],
            },
        ];
        let aligned = AlignedDataset::assemble(&source(), &outcomes, 3).unwrap();

        assert_eq!(aligned.len(), 3);
        assert_eq!(aligned.store().trace_count(), 3);
        let em = aligned.store().get(&Channel::Em).unwrap();
        assert_eq!(
            em,
            &ChannelArray::from_array(array![[0i16, 1, 2], [2, 3, 4], [21, 22, 23]])
        );
        let plain = aligned.store().get(&Channel::Plain).unwrap();
        assert_eq!(
            plain,
            &ChannelArray::from_array(array![[0u8, 100], [0, 100], [2, 102]])
        );
        assert_eq!(
            aligned.crops()[2],
            CropSource {
                trace: 2,
                anchor: Anchor::Primary,
                trigger_index: 2
            }
        );
    }

    #[test]
    fn nothing_accepted() {
        let aligned = AlignedDataset::assemble(&source(), std::iter::empty(), 3).unwrap();
        assert!(aligned.is_empty());
        assert_eq!(aligned.store().get(&Channel::Em).unwrap().samples_per_trace(), 3);
    }
}
