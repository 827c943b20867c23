use super::Filter;
use crate::{Real, registry::StageKind};
use serde::Deserialize;

/// Full-wave rectification.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Absolute {}

impl StageKind<dyn Filter> for Absolute {
    const KIND: &'static str = "absolute";

    fn build(self) -> Box<dyn Filter> {
        Box::new(self)
    }
}

impl Filter for Absolute {
    fn apply(&self, samples: &[Real]) -> Vec<Real> {
        samples.iter().map(|v| v.abs()).collect()
    }
}
