//! Dataset storage: channels, typed sample arrays and the two format families.
mod array_source;
mod channel_array;
pub mod metafile;
mod sample_type;

pub use array_source::ArraySource;
pub use channel_array::{ChannelArray, RowSlice};
pub(crate) use channel_array::with_array;
pub use metafile::MetafileSource;
pub use sample_type::{Sample, SampleType};

use crate::{AlignerResult, FormatError, Real, batch::AlignedDataset};
use std::{
    collections::BTreeMap,
    fmt::Display,
    path::Path,
    str::FromStr,
};
use trace_aligner_common::TraceIndex;

/// A named signal kind within a trace.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Channel {
    Em,
    Power,
    Plain,
    Cipher,
    Key,
    /// Auxiliary waveform, optionally named.
    Aux(String),
}

impl Channel {
    /// Waveform channels are cropped, all other channels are companion data
    /// carried whole alongside each crop.
    pub fn is_waveform(&self) -> bool {
        matches!(self, Channel::Em | Channel::Power | Channel::Aux(_))
    }

    /// The metafile section describing this channel.
    pub fn section_name(&self) -> String {
        match self {
            Channel::Em => "EM".to_owned(),
            Channel::Power => "POWER".to_owned(),
            Channel::Plain => "PLAINTEXT".to_owned(),
            Channel::Cipher => "CIPHERTEXT".to_owned(),
            Channel::Key => "KEY".to_owned(),
            Channel::Aux(name) => format!("AUX{name}"),
        }
    }

    pub fn from_section_name(section: &str) -> Option<Self> {
        match section {
            "EM" => Some(Channel::Em),
            "POWER" => Some(Channel::Power),
            "PLAINTEXT" => Some(Channel::Plain),
            "CIPHERTEXT" => Some(Channel::Cipher),
            "KEY" => Some(Channel::Key),
            _ => section
                .strip_prefix("AUX")
                .filter(|name| !name.ends_with("_SCOPE"))
                .map(|name| Channel::Aux(name.to_owned())),
        }
    }
}

impl Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Em => write!(f, "em"),
            Channel::Power => write!(f, "power"),
            Channel::Plain => write!(f, "plain"),
            Channel::Cipher => write!(f, "cipher"),
            Channel::Key => write!(f, "key"),
            Channel::Aux(name) if name.is_empty() => write!(f, "aux"),
            Channel::Aux(name) => write!(f, "aux-{name}"),
        }
    }
}

impl FromStr for Channel {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "em" => Ok(Channel::Em),
            "power" => Ok(Channel::Power),
            "plain" => Ok(Channel::Plain),
            "cipher" => Ok(Channel::Cipher),
            "key" => Ok(Channel::Key),
            "aux" => Ok(Channel::Aux(String::new())),
            _ => s
                .strip_prefix("aux-")
                .map(|name| Channel::Aux(name.to_owned()))
                .ok_or_else(|| FormatError::UnknownChannel(s.to_owned())),
        }
    }
}

impl TryFrom<String> for Channel {
    type Error = FormatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Channel> for String {
    fn from(value: Channel) -> Self {
        value.to_string()
    }
}

/// The storage family a dataset was loaded from; exports use the same family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SourceFormat {
    Array,
    Metafile,
}

/// A dataset-wide constant declared by a `fixed` metafile section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixedData {
    pub sample_type: SampleType,
    pub length: usize,
    pub bytes: Vec<u8>,
}

/// Global, non per-trace information about a dataset.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DatasetMetadata {
    pub comment: Option<String>,
    /// Scope settings per channel, as free-form key/value pairs.
    pub scope: BTreeMap<Channel, BTreeMap<String, String>>,
    pub fixed: BTreeMap<Channel, FixedData>,
}

impl DatasetMetadata {
    /// The sampling frequency in Hz, derived from the `HORIZ_INTERVAL` scope setting.
    pub fn sample_frequency(&self, channel: &Channel) -> Option<Real> {
        self.scope
            .get(channel)?
            .get("HORIZ_INTERVAL")?
            .trim()
            .parse::<Real>()
            .ok()
            .filter(|interval| *interval > 0.0)
            .map(|interval| 1.0 / interval)
    }
}

/// The populated channels of a dataset, all holding the same number of traces.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelStore {
    channels: BTreeMap<Channel, ChannelArray>,
    trace_count: usize,
}

impl ChannelStore {
    pub fn new(channels: BTreeMap<Channel, ChannelArray>) -> Result<Self, FormatError> {
        let mut iter = channels.iter();
        let (first, first_array) = iter.next().ok_or(FormatError::NoChannels)?;
        let trace_count = first_array.trace_count();
        if let Some((second, second_array)) =
            iter.find(|(_, array)| array.trace_count() != trace_count)
        {
            return Err(FormatError::TraceCountMismatch {
                first: first.clone(),
                first_count: trace_count,
                second: second.clone(),
                second_count: second_array.trace_count(),
            });
        }
        Ok(Self {
            channels,
            trace_count,
        })
    }

    pub fn trace_count(&self) -> usize {
        self.trace_count
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Channel, &ChannelArray)> {
        self.channels.iter()
    }

    pub fn get(&self, channel: &Channel) -> Option<&ChannelArray> {
        self.channels.get(channel)
    }

    pub fn read(&self, channel: &Channel, trace: TraceIndex) -> Result<Vec<Real>, FormatError> {
        let array = self
            .get(channel)
            .ok_or_else(|| FormatError::ChannelNotPopulated(channel.clone()))?;
        array.row(trace).ok_or(FormatError::TraceIndexOutOfRange {
            index: trace,
            count: self.trace_count,
        })
    }
}

/// Uniform access to a loaded dataset, whatever its storage family.
///
/// Loading is eager, so every accessor is infallible apart from [Self::read],
/// which rejects unknown channels and out of range traces.
pub trait TraceDataSource: Send + Sync {
    fn format(&self) -> SourceFormat;

    /// The directory holding the source files.
    fn location(&self) -> &Path;

    fn metadata(&self) -> &DatasetMetadata;

    fn store(&self) -> &ChannelStore;

    /// Writes `aligned` into the existing, empty `directory` using this
    /// source's format family.
    fn write(&self, aligned: &AlignedDataset, directory: &Path) -> AlignerResult<()>;

    fn channels(&self) -> Vec<Channel> {
        self.store().channels().cloned().collect()
    }

    fn trace_count(&self) -> usize {
        self.store().trace_count()
    }

    fn read(&self, channel: &Channel, trace: TraceIndex) -> AlignerResult<Vec<Real>> {
        Ok(self.store().read(channel, trace)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn channel_names_round_trip() {
        for channel in [
            Channel::Em,
            Channel::Power,
            Channel::Plain,
            Channel::Cipher,
            Channel::Key,
            Channel::Aux(String::new()),
            Channel::Aux("probe".to_owned()),
        ] {
            assert_eq!(channel.to_string().parse::<Channel>().unwrap(), channel);
            assert_eq!(
                Channel::from_section_name(&channel.section_name()),
                Some(channel)
            );
        }
        assert!("voltage".parse::<Channel>().is_err());
        assert_eq!(Channel::from_section_name("EM_SCOPE"), None);
        assert_eq!(Channel::from_section_name("AUXprobe_SCOPE"), None);
    }

    #[test]
    fn waveform_classification() {
        assert!(Channel::Em.is_waveform());
        assert!(Channel::Aux("x".to_owned()).is_waveform());
        assert!(!Channel::Plain.is_waveform());
        assert!(!Channel::Key.is_waveform());
    }

    #[test]
    fn store_rejects_mismatched_trace_counts() {
        let channels = BTreeMap::from([
            (Channel::Em, ChannelArray::from_array(Array2::<i8>::zeros((100, 8)))),
            (Channel::Plain, ChannelArray::from_array(Array2::<u8>::zeros((99, 16)))),
        ]);
        assert!(matches!(
            ChannelStore::new(channels),
            Err(FormatError::TraceCountMismatch {
                first_count: 100,
                second_count: 99,
                ..
            })
        ));
        assert!(matches!(
            ChannelStore::new(BTreeMap::new()),
            Err(FormatError::NoChannels)
        ));
    }

    #[test]
    fn store_read_bounds() {
        let channels = BTreeMap::from([(
            Channel::Em,
            ChannelArray::from_array(Array2::<i8>::ones((3, 4))),
        )]);
        let store = ChannelStore::new(channels).unwrap();
        assert_eq!(store.read(&Channel::Em, 2).unwrap(), vec![1.0; 4]);
        assert!(matches!(
            store.read(&Channel::Em, 3),
            Err(FormatError::TraceIndexOutOfRange { index: 3, count: 3 })
        ));
        assert!(matches!(
            store.read(&Channel::Power, 0),
            Err(FormatError::ChannelNotPopulated(Channel::Power))
        ));
    }

    #[test]
    fn sample_frequency_from_scope() {
        let mut metadata = DatasetMetadata::default();
        metadata.scope.insert(
            Channel::Em,
            BTreeMap::from([("HORIZ_INTERVAL".to_owned(), "0.25".to_owned())]),
        );
        assert_eq!(metadata.sample_frequency(&Channel::Em), Some(4.0));
        assert_eq!(metadata.sample_frequency(&Channel::Power), None);
    }
}
