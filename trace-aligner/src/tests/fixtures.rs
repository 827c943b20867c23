use crate::{
    AlignerResult, Real,
    batch::AlignedDataset,
    data::{
        ArraySource, Channel, ChannelArray, ChannelStore, DatasetMetadata, SourceFormat,
        TraceDataSource,
    },
};
use ndarray::Array2;
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

/// A dataset held in memory, exported in the array family.
pub(crate) struct MemorySource {
    location: PathBuf,
    metadata: DatasetMetadata,
    store: ChannelStore,
}

impl MemorySource {
    pub(crate) fn new(store: ChannelStore) -> Self {
        Self {
            location: PathBuf::new(),
            metadata: DatasetMetadata::default(),
            store,
        }
    }

    /// An `em` channel of `f64` samples, one row per trace.
    pub(crate) fn waveforms(traces: Vec<Vec<Real>>) -> Self {
        let rows = traces.len();
        let cols = traces.first().map(Vec::len).unwrap_or_default();
        let array = Array2::from_shape_vec((rows, cols), traces.concat()).unwrap();
        Self::new(
            ChannelStore::new(BTreeMap::from([(
                Channel::Em,
                ChannelArray::from_array(array),
            )]))
            .unwrap(),
        )
    }

    pub(crate) fn located(mut self, location: &Path) -> Self {
        self.location = location.to_owned();
        self
    }
}

impl TraceDataSource for MemorySource {
    fn format(&self) -> SourceFormat {
        SourceFormat::Array
    }

    fn location(&self) -> &Path {
        &self.location
    }

    fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }

    fn store(&self) -> &ChannelStore {
        &self.store
    }

    fn write(&self, aligned: &AlignedDataset, directory: &Path) -> AlignerResult<()> {
        ArraySource::save(aligned.store(), directory, "_aligned").map(|_| ())
    }
}

pub(crate) const EDGE_AMPLITUDE: i8 = 100;
pub(crate) const NOISE: i8 = 3;

/// A jittered capture: `int8` em and power traces of `samples` samples with
/// low noise, stepping to [EDGE_AMPLITUDE] at a random index in
/// `edges` for every trace not listed in `without_edge`. Plaintext row `i`
/// holds sixteen copies of `i` and ciphertext row `i` its complement, so
/// pairing can be checked after alignment.
pub(crate) struct Capture {
    pub(crate) store: ChannelStore,
    /// Edge index of each trace, if it has one.
    pub(crate) edges: Vec<Option<usize>>,
}

impl Capture {
    pub(crate) fn generate(
        traces: usize,
        samples: usize,
        edges: std::ops::Range<usize>,
        without_edge: &[usize],
        seed: u64,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let edge_of: Vec<Option<usize>> = (0..traces)
            .map(|trace| {
                (!without_edge.contains(&trace)).then(|| rng.random_range(edges.clone()))
            })
            .collect();
        let mut waveform = || {
            Array2::from_shape_fn((traces, samples), |(trace, sample)| {
                let noise = rng.random_range(-NOISE..=NOISE);
                match edge_of[trace] {
                    Some(at) if sample >= at => EDGE_AMPLITUDE + noise,
                    _ => noise,
                }
            })
        };
        let em = waveform();
        let power = waveform();
        let plain = Array2::from_shape_fn((traces, 16), |(trace, _)| trace as u8);
        let cipher = plain.mapv(|v| !v);

        let store = ChannelStore::new(BTreeMap::from([
            (Channel::Em, ChannelArray::from_array(em)),
            (Channel::Power, ChannelArray::from_array(power)),
            (Channel::Plain, ChannelArray::from_array(plain)),
            (Channel::Cipher, ChannelArray::from_array(cipher)),
        ]))
        .unwrap();
        Self {
            store,
            edges: edge_of,
        }
    }
}
