//! The metafile format family: an INI descriptor plus one raw,
//! little-endian, row-major data file per channel.
mod descriptor;
mod hash;

pub use descriptor::{DataSection, Metafile, SectionStorage};
pub use hash::{fast_hash, sha256_file};

use super::{
    ChannelArray, ChannelStore, DatasetMetadata, FixedData, SourceFormat, TraceDataSource,
};
use crate::{AlignerResult, FormatError, batch::AlignedDataset, error::IoResultExt};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

pub const ALIGNED_METAFILE: &str = "aligned.meta";

pub struct MetafileSource {
    path: PathBuf,
    location: PathBuf,
    metafile: Metafile,
    metadata: DatasetMetadata,
    store: ChannelStore,
}

impl MetafileSource {
    /// Loads the metafile at `path` and every raw file it references.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> AlignerResult<Self> {
        let metafile = Metafile::load(path)?;
        if !metafile.is_complete() {
            warn!(
                "Metafile status is {:?}, the recording may be unfinished",
                metafile.status().unwrap_or_default()
            );
        }
        let traces = metafile.trace_count(path)?;
        let location = path.parent().map(Path::to_path_buf).unwrap_or_default();

        let mut channels = BTreeMap::new();
        let mut fixed = BTreeMap::new();
        for section in metafile.data_sections(path)? {
            match section.storage {
                SectionStorage::File {
                    ref datafile,
                    ref fasthash,
                } => {
                    let datafile = location.join(datafile);
                    let array = read_data_file(
                        &datafile,
                        &section,
                        traces,
                        fasthash.as_deref(),
                    )?;
                    channels.insert(section.channel, array);
                }
                SectionStorage::Fixed { bytes } => {
                    fixed.insert(
                        section.channel,
                        FixedData {
                            sample_type: section.sample_type,
                            length: section.length,
                            bytes,
                        },
                    );
                }
            }
        }
        let store = ChannelStore::new(channels)?;
        info!(
            "Loaded {} traces over {} channels",
            store.trace_count(),
            store.channels().count()
        );
        let metadata = DatasetMetadata {
            comment: metafile.comment().map(str::to_owned),
            scope: metafile.scope_sections(),
            fixed,
        };
        Ok(Self {
            path: path.to_owned(),
            location,
            metafile,
            metadata,
            store,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metafile(&self) -> &Metafile {
        &self.metafile
    }

    /// Writes each channel of `store` to `<directory>/<channel><suffix>.dat`,
    /// records the files in `metafile`, marks it complete and saves it as
    /// `<directory>/<metafile_name>`.
    pub fn save(
        mut metafile: Metafile,
        store: &ChannelStore,
        directory: &Path,
        suffix: &str,
        metafile_name: &str,
    ) -> AlignerResult<PathBuf> {
        for (channel, array) in store.iter() {
            let file_name = format!("{channel}{suffix}.dat");
            let path = directory.join(&file_name);
            std::fs::write(&path, array.to_le_bytes()).err_path(&path)?;
            metafile.set_file_section(
                channel,
                array.sample_type(),
                array.samples_per_trace(),
                &file_name,
                &sha256_file(&path)?,
                &fast_hash(&path)?,
            );
            debug!("Wrote {}", path.display());
        }
        metafile.set_trace_count(store.trace_count());
        metafile.complete();
        let path = directory.join(metafile_name);
        metafile.save(&path)?;
        Ok(path)
    }
}

impl TraceDataSource for MetafileSource {
    fn format(&self) -> SourceFormat {
        SourceFormat::Metafile
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

    /// The descriptor is inherited from the source, so scope and fixed
    /// sections carry over unchanged.
    fn write(&self, aligned: &AlignedDataset, directory: &Path) -> AlignerResult<()> {
        let mut metafile = self.metafile.clone();
        metafile.restart();
        metafile.add_comment(&format!("Source file: {}", self.path.display()));
        let path = Self::save(
            metafile,
            aligned.store(),
            directory,
            "_aligned",
            ALIGNED_METAFILE,
        )?;
        info!("Wrote {}", path.display());
        Ok(())
    }
}

fn read_data_file(
    path: &Path,
    section: &DataSection,
    traces: usize,
    fasthash: Option<&str>,
) -> AlignerResult<ChannelArray> {
    let expected = traces
        .checked_mul(section.length)
        .and_then(|samples| samples.checked_mul(section.sample_type.item_size()))
        .and_then(|bytes| u64::try_from(bytes).ok())
        .ok_or_else(|| FormatError::Metafile {
            path: path.to_owned(),
            message: format!(
                "{traces} traces of {} {} samples overflow the addressable size",
                section.length, section.sample_type
            ),
        })?;
    let actual = std::fs::metadata(path).err_path(path)?.len();
    if actual != expected {
        return Err(FormatError::FileSizeMismatch {
            path: path.to_owned(),
            actual,
            expected,
            traces,
            length: section.length,
            sample_type: section.sample_type,
        }
        .into());
    }
    if let Some(recorded) = fasthash {
        let computed = fast_hash(path)?;
        if computed != recorded {
            warn!(
                "{}: fasthash {computed} differs from recorded {recorded}",
                path.display()
            );
        }
    }
    let bytes = std::fs::read(path).err_path(path)?;
    ChannelArray::from_le_bytes(section.sample_type, &bytes, traces, section.length).ok_or_else(
        || {
            FormatError::FileSizeMismatch {
                path: path.to_owned(),
                actual: bytes.len() as u64,
                expected,
                traces,
                length: section.length,
                sample_type: section.sample_type,
            }
            .into()
        },
    )
}
