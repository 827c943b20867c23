//! Runs a [Pipeline] over every trace of a dataset and crops the survivors.
//!
//! Traces are processed in parallel and reassembled by trace index, so the
//! output order never depends on scheduling. A trace whose trigger finds
//! nothing, or whose crop would leave the trace, is rejected and the run
//! continues. Any read failure aborts the run.
mod aligned;
mod cancel;
mod outcome;
mod window;

pub use aligned::{AlignedDataset, CropSource};
pub use cancel::CancellationToken;
pub use outcome::{Anchor, AnchorCounts, AnchorOutcome, BatchCounts, Rejection, TraceOutcome};
pub use window::{AlignmentWindow, Offsets};

use crate::{
    AlignerError, AlignerResult, ParameterError,
    data::{Channel, TraceDataSource},
    pipeline::Pipeline,
    triggers::TriggerResult,
};
use metrics::counter;
use rayon::prelude::*;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::atomic::{AtomicUsize, Ordering},
};
use tracing::{info, instrument, warn};
use trace_aligner_common::{
    PROGRESS_LOG_INTERVAL, TraceIndex,
    metrics::{
        anchors,
        failures::{self, FailureKind},
        names::{CROPS_ACCEPTED, FAILURES, TRACES_PROCESSED, TRACES_REJECTED},
        rejections,
    },
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchOptions {
    /// Process only the first `trace_limit` traces.
    pub trace_limit: Option<usize>,
}

/// Reported after each trace completes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchProgress {
    pub processed: usize,
    pub total: usize,
}

type ProgressCallback = Box<dyn Fn(BatchProgress) + Send + Sync>;

#[derive(Debug)]
pub struct BatchResult {
    pub aligned: AlignedDataset,
    /// Traces which contributed no crop.
    pub rejected: BTreeSet<TraceIndex>,
    pub counts: BatchCounts,
    /// Per-trace decisions in trace order.
    pub outcomes: Vec<TraceOutcome>,
}

pub struct BatchAligner {
    pipeline: Pipeline,
    channel: Channel,
    window: AlignmentWindow,
    options: BatchOptions,
    cancellation: CancellationToken,
    progress: Option<ProgressCallback>,
}

impl BatchAligner {
    pub fn new(
        pipeline: Pipeline,
        channel: Channel,
        window: AlignmentWindow,
    ) -> Result<Self, ParameterError> {
        window.validate()?;
        Ok(Self {
            pipeline,
            channel,
            window,
            options: BatchOptions::default(),
            cancellation: CancellationToken::new(),
            progress: None,
        })
    }

    pub fn with_options(mut self, options: BatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Registers `callback`, called from worker threads after every trace.
    pub fn with_progress(mut self, callback: impl Fn(BatchProgress) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Aligns `source`, returning the cropped dataset and every rejection.
    #[instrument(skip_all, fields(channel = %self.channel, traces, accepted, rejected))]
    pub fn run(&self, source: &dyn TraceDataSource) -> AlignerResult<BatchResult> {
        let store = source.store();
        if let Err(e) = self.check_channel(source) {
            counter!(
                FAILURES,
                &[failures::get_label(FailureKind::InvalidParameter)]
            )
            .increment(1);
            return Err(e.into());
        }
        let total = self
            .options
            .trace_limit
            .map_or(store.trace_count(), |limit| limit.min(store.trace_count()));
        tracing::Span::current().record("traces", total);

        // Crops must fit inside every waveform channel.
        let samples = store
            .iter()
            .filter(|(channel, _)| channel.is_waveform())
            .map(|(_, array)| array.samples_per_trace())
            .min()
            .unwrap_or_default();

        let processed = AtomicUsize::new(0);
        let outcomes = (0..total)
            .into_par_iter()
            .filter_map(|trace| {
                if self.cancellation.is_cancelled() {
                    return None;
                }
                let result = self
                    .pipeline
                    .run_on(source, &self.channel, trace)
                    .map(|result| (trace, self.judge(trace, result.trigger, samples)));
                let done = processed.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(progress) = &self.progress {
                    progress(BatchProgress {
                        processed: done,
                        total,
                    });
                }
                if done % PROGRESS_LOG_INTERVAL == 0 {
                    info!("Processed {done} of {total} traces");
                }
                Some(result)
            })
            .collect::<AlignerResult<BTreeMap<TraceIndex, TraceOutcome>>>()?;

        if self.cancellation.is_cancelled() {
            let processed = processed.load(Ordering::SeqCst);
            warn!("Cancelled after {processed} of {total} traces");
            counter!(FAILURES, &[failures::get_label(FailureKind::Cancelled)]).increment(1);
            return Err(AlignerError::Cancelled { processed, total });
        }

        let aligned = AlignedDataset::assemble(store, outcomes.values(), self.window.crop_len())?;
        let counts = BatchCounts::tally(outcomes.values());
        let rejected = outcomes
            .values()
            .filter(|outcome| !outcome.is_accepted())
            .map(|outcome| outcome.trace)
            .collect::<BTreeSet<_>>();

        tracing::Span::current().record("accepted", counts.accepted_traces);
        tracing::Span::current().record("rejected", counts.rejected_traces);
        info!(
            "Aligned {} crops from {} of {} traces, {} rejected ({} without trigger)",
            counts.crops,
            counts.accepted_traces,
            counts.total,
            counts.rejected_traces,
            counts.trigger_not_found
        );
        if counts.secondary != AnchorCounts::default() {
            info!(
                "Primary anchor {}/{} accepted, secondary anchor {}/{} accepted",
                counts.primary.accepted,
                counts.primary.accepted + counts.primary.rejected,
                counts.secondary.accepted,
                counts.secondary.accepted + counts.secondary.rejected
            );
        }
        Ok(BatchResult {
            aligned,
            rejected,
            counts,
            outcomes: outcomes.into_values().collect(),
        })
    }

    fn check_channel(&self, source: &dyn TraceDataSource) -> Result<(), ParameterError> {
        if source.store().get(&self.channel).is_none() {
            Err(ParameterError::MissingDetectionChannel(self.channel.clone()))
        } else if !self.channel.is_waveform() {
            Err(ParameterError::CompanionDetectionChannel(self.channel.clone()))
        } else {
            Ok(())
        }
    }

    /// Decides the crops of one trace of `samples` waveform samples.
    fn judge(&self, trace: TraceIndex, trigger: TriggerResult, samples: usize) -> TraceOutcome {
        let anchors = match trigger {
            TriggerResult::NotFound => Vec::new(),
            TriggerResult::Found(index) => vec![(Anchor::Primary, index, self.window.primary)],
            TriggerResult::Found2(first, second) => vec![
                (Anchor::Primary, first, self.window.primary),
                (Anchor::Secondary, second, self.window.secondary_or_primary()),
            ],
        };
        let outcome = TraceOutcome {
            trace,
            trigger,
            anchors: anchors
                .into_iter()
                .map(|(anchor, index, offsets)| AnchorOutcome {
                    anchor,
                    index,
                    crop: offsets
                        .crop(index, samples)
                        .ok_or(Rejection::WindowOutOfBounds),
                })
                .collect(),
        };

        counter!(TRACES_PROCESSED).increment(1);
        if let Some(rejection) = outcome.rejection() {
            counter!(
                TRACES_REJECTED,
                &[rejections::get_label(rejection.into())]
            )
            .increment(1);
        }
        for (anchor, _) in outcome.crops() {
            counter!(CROPS_ACCEPTED, &[anchors::get_label(anchor.anchor.into())]).increment(1);
        }
        outcome
    }
}
