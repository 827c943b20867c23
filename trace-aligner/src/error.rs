use crate::data::{Channel, SampleType};
use std::path::{Path, PathBuf};
use thiserror::Error;
use trace_aligner_common::TraceIndex;

pub type AlignerResult<T> = Result<T, AlignerError>;

/// Fatal failures. Per-trace detection outcomes are never reported through
/// this type, see [crate::batch::Rejection].
#[derive(Debug, Error)]
pub enum AlignerError {
    #[error("Invalid Parameter: {0}")]
    InvalidParameter(#[from] ParameterError),
    #[error("Format Error: {0}")]
    Format(#[from] FormatError),
    #[error("IO Error at {path}: {source}")]
    IO {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Batch run cancelled after {processed} of {total} traces")]
    Cancelled { processed: usize, total: usize },
    #[error("Export destination {0} already exists or is the source location")]
    DestinationExists(PathBuf),
}

impl AlignerError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::IO {
            path: path.to_owned(),
            source,
        }
    }
}

/// Attaches the offending path to an [std::io::Error].
pub(crate) trait IoResultExt<T> {
    fn err_path(self, path: &Path) -> AlignerResult<T>;
}

impl<T> IoResultExt<T> for Result<T, std::io::Error> {
    fn err_path(self, path: &Path) -> AlignerResult<T> {
        self.map_err(|e| AlignerError::io(path, e))
    }
}

#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("Unknown {stage} kind \"{kind}\"")]
    UnknownKind { stage: StageClass, kind: String },
    #[error("{stage} \"{kind}\": {message}")]
    Schema {
        stage: StageClass,
        kind: String,
        message: String,
    },
    #[error("{stage} \"{kind}\": parameter \"{parameter}\" {requirement}")]
    OutOfRange {
        stage: StageClass,
        kind: &'static str,
        parameter: &'static str,
        requirement: String,
    },
    #[error("Settings file {path}: {message}")]
    Settings { path: PathBuf, message: String },
    #[error("Alignment window: {0}")]
    Window(String),
    #[error("Channel {0} is not populated in the dataset")]
    MissingDetectionChannel(Channel),
    #[error("Channel {0} holds companion data and cannot be used for detection")]
    CompanionDetectionChannel(Channel),
}

/// Distinguishes the two registries in error messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum StageClass {
    #[strum(to_string = "filter")]
    Filter,
    #[strum(to_string = "trigger")]
    Trigger,
}

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Channel {first} has {first_count} traces but channel {second} has {second_count}")]
    TraceCountMismatch {
        first: Channel,
        first_count: usize,
        second: Channel,
        second_count: usize,
    },
    #[error("Array file {path} has rank {rank}, expected 1 or 2")]
    UnsupportedRank { path: PathBuf, rank: usize },
    #[error("Array file {path}: {message}")]
    Npy { path: PathBuf, message: String },
    #[error("Unsupported sample type \"{0}\"")]
    UnsupportedSampleType(String),
    #[error("Metafile {path}: missing {what}")]
    MissingEntry { path: PathBuf, what: String },
    #[error("Metafile {path}: cannot parse {key} = \"{value}\"")]
    InvalidEntry {
        path: PathBuf,
        key: String,
        value: String,
    },
    #[error("Metafile {path}: {message}")]
    Metafile { path: PathBuf, message: String },
    #[error(
        "Data file {path} holds {actual} bytes, expected {expected} ({traces} traces x {length} samples of {sample_type})"
    )]
    FileSizeMismatch {
        path: PathBuf,
        actual: u64,
        expected: u64,
        traces: usize,
        length: usize,
        sample_type: SampleType,
    },
    #[error("Trace {index} out of range, dataset holds {count} traces")]
    TraceIndexOutOfRange { index: TraceIndex, count: usize },
    #[error("Unknown channel \"{0}\"")]
    UnknownChannel(String),
    #[error("Channel {0} is not populated in the dataset")]
    ChannelNotPopulated(Channel),
    #[error("Dataset has no populated channels")]
    NoChannels,
    #[error("Channel {channel} expected {expected} samples per trace, found {actual}")]
    SampleCountMismatch {
        channel: Channel,
        expected: usize,
        actual: usize,
    },
}
