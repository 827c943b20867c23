use super::{
    Channel, ChannelArray, ChannelStore, DatasetMetadata, Sample, SampleType, SourceFormat,
    TraceDataSource, with_array,
};
use crate::{
    AlignerError, AlignerResult, FormatError,
    batch::AlignedDataset,
    error::IoResultExt,
};
use ndarray::{ArrayD, Ix2};
use ndarray_npy::{ReadNpyError, WriteNpyError, read_npy, write_npy};
use std::{
    collections::BTreeMap,
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

const NPY_MAGIC: &[u8; 6] = b"\x93NUMPY";

/// A dataset made of one `.npy` array per channel, linked only by trace index.
pub struct ArraySource {
    location: PathBuf,
    files: BTreeMap<Channel, PathBuf>,
    metadata: DatasetMetadata,
    store: ChannelStore,
}

impl ArraySource {
    /// Loads every channel file. All files must hold the same number of traces.
    #[instrument(skip_all, fields(channels = files.len()))]
    pub fn load(files: BTreeMap<Channel, PathBuf>, comment: Option<String>) -> AlignerResult<Self> {
        let mut channels = BTreeMap::new();
        for (channel, path) in &files {
            let array = read_channel_file(path)?;
            debug!(
                "{channel}: {} traces of {} {} samples from {}",
                array.trace_count(),
                array.samples_per_trace(),
                array.sample_type(),
                path.display()
            );
            channels.insert(channel.clone(), array);
        }
        let store = ChannelStore::new(channels)?;
        let location = files
            .values()
            .next()
            .and_then(|path| path.parent())
            .map(Path::to_path_buf)
            .unwrap_or_default();
        info!(
            "Loaded {} traces over {} channels",
            store.trace_count(),
            files.len()
        );
        Ok(Self {
            location,
            files,
            metadata: DatasetMetadata {
                comment,
                ..Default::default()
            },
            store,
        })
    }

    pub fn files(&self) -> &BTreeMap<Channel, PathBuf> {
        &self.files
    }

    /// Writes each channel of `store` to `<directory>/<channel><suffix>.npy`.
    pub fn save(store: &ChannelStore, directory: &Path, suffix: &str) -> AlignerResult<Vec<PathBuf>> {
        store
            .iter()
            .map(|(channel, array)| {
                let path = directory.join(format!("{channel}{suffix}.npy"));
                with_array!(array, typed => write_npy(&path, typed))
                    .map_err(|e| write_error(&path, e))?;
                Ok(path)
            })
            .collect()
    }
}

impl TraceDataSource for ArraySource {
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
        let written = Self::save(aligned.store(), directory, "_aligned")?;
        info!("Wrote {} array files to {}", written.len(), directory.display());
        Ok(())
    }
}

fn read_channel_file(path: &Path) -> AlignerResult<ChannelArray> {
    match read_descriptor(path)? {
        SampleType::Uint8 => read_typed::<u8>(path),
        SampleType::Int8 => read_typed::<i8>(path),
        SampleType::Uint16 => read_typed::<u16>(path),
        SampleType::Int16 => read_typed::<i16>(path),
        SampleType::Uint32 => read_typed::<u32>(path),
        SampleType::Int32 => read_typed::<i32>(path),
        SampleType::Float32 => read_typed::<f32>(path),
        SampleType::Float64 => read_typed::<f64>(path),
    }
}

/// A 1-D array of length T is read as T traces of a single sample.
fn read_typed<T: Sample>(path: &Path) -> AlignerResult<ChannelArray> {
    let array: ArrayD<T> = read_npy(path).map_err(|e| read_error(path, e))?;
    let shape_error = |e: ndarray::ShapeError| FormatError::Npy {
        path: path.to_owned(),
        message: e.to_string(),
    };
    let array = match array.ndim() {
        1 => {
            let traces = array.len();
            array
                .into_shape_with_order((traces, 1))
                .map_err(shape_error)?
        }
        2 => array.into_dimensionality::<Ix2>().map_err(shape_error)?,
        rank => {
            return Err(FormatError::UnsupportedRank {
                path: path.to_owned(),
                rank,
            }
            .into());
        }
    };
    Ok(ChannelArray::from_array(array))
}

/// Reads the element type from the npy header so the file can be loaded
/// in its native type.
fn read_descriptor(path: &Path) -> AlignerResult<SampleType> {
    let npy_error = |message: &str| FormatError::Npy {
        path: path.to_owned(),
        message: message.to_owned(),
    };
    let mut file = File::open(path).err_path(path)?;
    let mut preamble = [0u8; 8];
    file.read_exact(&mut preamble).err_path(path)?;
    let [m0, m1, m2, m3, m4, m5, major, _minor] = preamble;
    if [m0, m1, m2, m3, m4, m5] != *NPY_MAGIC {
        return Err(npy_error("not an npy file").into());
    }
    let header_len = match major {
        1 => {
            let mut len = [0u8; 2];
            file.read_exact(&mut len).err_path(path)?;
            u16::from_le_bytes(len) as usize
        }
        2 | 3 => {
            let mut len = [0u8; 4];
            file.read_exact(&mut len).err_path(path)?;
            u32::from_le_bytes(len) as usize
        }
        _ => return Err(npy_error("unsupported npy version").into()),
    };
    let mut header = vec![0u8; header_len];
    file.read_exact(&mut header).err_path(path)?;
    let header = String::from_utf8_lossy(&header);
    let descr = header
        .split_once("'descr':")
        .and_then(|(_, rest)| rest.trim_start().strip_prefix('\''))
        .and_then(|rest| rest.split_once('\''))
        .map(|(descr, _)| descr)
        .ok_or_else(|| npy_error("header has no descr field"))?;
    Ok(SampleType::from_npy_descr(descr)?)
}

fn read_error(path: &Path, error: ReadNpyError) -> AlignerError {
    match error {
        ReadNpyError::Io(source) => AlignerError::io(path, source),
        other => FormatError::Npy {
            path: path.to_owned(),
            message: other.to_string(),
        }
        .into(),
    }
}

fn write_error(path: &Path, error: WriteNpyError) -> AlignerError {
    match error {
        WriteNpyError::Io(source) => AlignerError::io(path, source),
        other => FormatError::Npy {
            path: path.to_owned(),
            message: other.to_string(),
        }
        .into(),
    }
}
