pub mod metrics;
pub mod tracer;

pub use tracer::{init_tracer, LogLevel};

/// Position of a trace within its dataset, in measurement order.
pub type TraceIndex = usize;

/// Position of a sample within a single trace.
pub type SampleIndex = usize;

/// Number of traces processed between two progress log lines.
pub const PROGRESS_LOG_INTERVAL: usize = 1000;
