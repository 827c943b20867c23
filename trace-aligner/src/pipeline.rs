//! Ordered filters followed by ordered triggers, applied to one trace.
//!
//! Filters run strictly in the order given, each consuming the previous
//! filter's output. Triggers then run in order, each searching the range left
//! by its predecessor (see [TriggerResult::narrow]). A trigger that finds
//! nothing ends the chain with [TriggerResult::NotFound].
use crate::{
    AlignerResult, ParameterError, Real,
    data::{Channel, TraceDataSource},
    filters::{self, Filter},
    registry::{Registry, StageSettings},
    triggers::{self, SearchRange, Trigger, TriggerResult},
};
use serde::Serialize;
use tracing::{debug, instrument, trace};
use trace_aligner_common::TraceIndex;

/// The outcome of running a [Pipeline] over one trace.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PipelineResult {
    /// The result of the last trigger, in indices of `filtered`.
    pub trigger: TriggerResult,
    /// The trace after every filter, as seen by the triggers.
    pub filtered: Vec<Real>,
}

#[derive(Debug, Default)]
pub struct Pipeline {
    filters: Vec<Box<dyn Filter>>,
    triggers: Vec<Box<dyn Trigger>>,
}

impl Pipeline {
    pub fn new(filters: Vec<Box<dyn Filter>>, triggers: Vec<Box<dyn Trigger>>) -> Self {
        Self { filters, triggers }
    }

    /// Builds every stage with the built-in registries.
    pub fn from_settings(
        filters: &[StageSettings],
        triggers: &[StageSettings],
    ) -> Result<Self, ParameterError> {
        Self::from_registries(
            &filters::registry(),
            filters,
            &triggers::registry(),
            triggers,
        )
    }

    /// Builds every stage, failing on the first invalid one. Disabled stages
    /// are validated and then left out.
    pub fn from_registries(
        filter_registry: &Registry<dyn Filter>,
        filters: &[StageSettings],
        trigger_registry: &Registry<dyn Trigger>,
        triggers: &[StageSettings],
    ) -> Result<Self, ParameterError> {
        let pipeline = Self::new(
            build_enabled(filter_registry, filters)?,
            build_enabled(trigger_registry, triggers)?,
        );
        debug!(
            "Built pipeline of {} filters and {} triggers",
            pipeline.filters.len(),
            pipeline.triggers.len()
        );
        Ok(pipeline)
    }

    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    pub fn trigger_count(&self) -> usize {
        self.triggers.len()
    }

    /// Applies every filter in order.
    pub fn filter(&self, samples: &[Real]) -> Vec<Real> {
        self.filters
            .iter()
            .fold(samples.to_vec(), |signal, filter| filter.apply(&signal))
    }

    /// Applies every trigger in order, narrowing the search range after each.
    /// With no triggers nothing is found.
    pub fn detect(&self, filtered: &[Real]) -> TriggerResult {
        let mut range = SearchRange::full(filtered.len());
        let mut result = TriggerResult::NotFound;
        for trigger in &self.triggers {
            result = trigger.detect(filtered, &range);
            match result.narrow(filtered.len()) {
                Some(narrowed) => range = narrowed,
                None => return TriggerResult::NotFound,
            }
        }
        result
    }

    pub fn run(&self, samples: &[Real]) -> PipelineResult {
        let filtered = self.filter(samples);
        let trigger = self.detect(&filtered);
        PipelineResult { trigger, filtered }
    }

    /// Runs the pipeline on one trace of `channel` read from `source`.
    #[instrument(skip_all, level = "trace", fields(channel = %channel, trace = trace))]
    pub fn run_on(
        &self,
        source: &dyn TraceDataSource,
        channel: &Channel,
        trace: TraceIndex,
    ) -> AlignerResult<PipelineResult> {
        let samples = source.read(channel, trace)?;
        let result = self.run(&samples);
        trace!("{:?}", result.trigger);
        Ok(result)
    }

    /// As [Self::run_on], with the raw trace first rotated right by `shift`
    /// samples (left if negative) so it can be overlaid on other traces.
    pub fn preview(
        &self,
        source: &dyn TraceDataSource,
        channel: &Channel,
        trace: TraceIndex,
        shift: isize,
    ) -> AlignerResult<PipelineResult> {
        let mut samples = source.read(channel, trace)?;
        if !samples.is_empty() {
            let shift = shift.rem_euclid(samples.len() as isize) as usize;
            samples.rotate_right(shift);
        }
        Ok(self.run(&samples))
    }
}

fn build_enabled<S: ?Sized>(
    registry: &Registry<S>,
    stages: &[StageSettings],
) -> Result<Vec<Box<S>>, ParameterError> {
    let mut built = Vec::with_capacity(stages.len());
    for settings in stages {
        let stage = registry.build(settings)?;
        if settings.enabled {
            built.push(stage);
        }
    }
    Ok(built)
}
