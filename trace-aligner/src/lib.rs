//! Alignment of repeated measurement traces.
//!
//! A dataset is loaded through a [data::TraceDataSource], each trace's detection
//! channel is run through a [pipeline::Pipeline] of filters and triggers, and the
//! [batch::BatchAligner] crops every channel around the detected feature. The
//! resulting [batch::AlignedDataset] is written back out by the [export::Exporter]
//! in the format family it was loaded from.
pub mod batch;
pub mod data;
pub mod error;
pub mod export;
pub mod filters;
pub mod pipeline;
pub mod registry;
pub mod settings;
pub mod triggers;

#[cfg(test)]
mod tests;

pub use error::{AlignerError, AlignerResult, FormatError, ParameterError};

/// The sample representation seen by filters and triggers.
pub type Real = f64;
