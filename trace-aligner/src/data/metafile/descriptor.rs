use crate::{
    AlignerError, AlignerResult, FormatError,
    data::{Channel, SampleType},
};
use chrono::Local;
use ini::Ini;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

pub(super) const COMMON: &str = "COMMON";
pub(super) const VERSION: &str = "0.2";
pub(super) const STATUS_COMPLETE: &str = "complete";
const STATUS_INCOMPLETE: &str = "incomplete";
const SCOPE_SUFFIX: &str = "_SCOPE";
const ROW_MAJOR: &str = "row-major [trace, sample]";

/// How a data section stores its values.
#[derive(Clone, Debug, PartialEq)]
pub enum SectionStorage {
    /// One row per trace in a raw file, path relative to the metafile.
    File {
        datafile: PathBuf,
        fasthash: Option<String>,
    },
    /// A single dataset-wide value held inline as hex.
    Fixed { bytes: Vec<u8> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct DataSection {
    pub channel: Channel,
    pub sample_type: SampleType,
    pub length: usize,
    pub storage: SectionStorage,
}

/// An INI descriptor listing the raw files of a dataset and its acquisition
/// metadata. Sections and keys this type does not interpret are preserved.
#[derive(Clone, Debug)]
pub struct Metafile {
    ini: Ini,
}

impl Default for Metafile {
    fn default() -> Self {
        Self::new()
    }
}

impl Metafile {
    /// A fresh, incomplete descriptor for zero traces.
    pub fn new() -> Self {
        let mut ini = Ini::new();
        ini.with_section(Some(COMMON))
            .set("nrTraces", "0")
            .set("randomPlain", "True")
            .set("randomKey", "False")
            .set("algorithm", "")
            .set("scopeSettings", "None")
            .set("dateStart", now())
            .set("dateEnd", "")
            .set("status", STATUS_INCOMPLETE)
            .set("version", VERSION)
            .set("recordScript", "")
            .set("comment", "");
        Self { ini }
    }

    pub fn load(path: &Path) -> AlignerResult<Self> {
        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(source) => AlignerError::io(path, source),
            ini::Error::Parse(e) => FormatError::Metafile {
                path: path.to_owned(),
                message: e.to_string(),
            }
            .into(),
        })?;
        if ini.section(Some("DATA")).is_some() {
            return Err(FormatError::Metafile {
                path: path.to_owned(),
                message: "single-section [DATA] metafiles are not supported".to_owned(),
            }
            .into());
        }
        let metafile = Self { ini };
        metafile.trace_count(path)?;
        Ok(metafile)
    }

    pub fn save(&self, path: &Path) -> AlignerResult<()> {
        self.ini
            .write_to_file(path)
            .map_err(|e| AlignerError::io(path, e))
    }

    fn common(&self, key: &str) -> Option<&str> {
        self.ini.get_from(Some(COMMON), key)
    }

    fn set_common(&mut self, key: &str, value: impl Into<String>) {
        self.ini.set_to(Some(COMMON), key.to_owned(), value.into());
    }

    /// `path` is only used to label errors.
    pub fn trace_count(&self, path: &Path) -> Result<usize, FormatError> {
        if self.ini.section(Some(COMMON)).is_none() {
            return Err(FormatError::MissingEntry {
                path: path.to_owned(),
                what: format!("[{COMMON}] section"),
            });
        }
        parse_entry(path, COMMON, "nrTraces", self.common("nrTraces"))
    }

    pub fn set_trace_count(&mut self, traces: usize) {
        self.set_common("nrTraces", traces.to_string());
    }

    pub fn status(&self) -> Option<&str> {
        self.common("status")
    }

    pub fn is_complete(&self) -> bool {
        self.status() == Some(STATUS_COMPLETE)
    }

    pub fn comment(&self) -> Option<&str> {
        self.common("comment").filter(|comment| !comment.is_empty())
    }

    /// Appends a line to the free-text comment.
    pub fn add_comment(&mut self, line: &str) {
        let comment = match self.comment() {
            Some(existing) => format!("{existing}\n{line}"),
            None => line.to_owned(),
        };
        self.set_common("comment", comment);
    }

    pub fn set_algorithm(&mut self, algorithm: &str) {
        self.set_common("algorithm", algorithm);
    }

    /// Marks the start of a new recording, leaving it incomplete.
    pub fn restart(&mut self) {
        self.set_common("dateStart", now());
        self.set_common("dateEnd", "");
        self.set_common("status", STATUS_INCOMPLETE);
        self.set_common("version", VERSION);
    }

    pub fn complete(&mut self) {
        self.set_common("dateEnd", now());
        self.set_common("status", STATUS_COMPLETE);
    }

    /// All channel sections, in file order.
    pub fn data_sections(&self, path: &Path) -> Result<Vec<DataSection>, FormatError> {
        self.ini
            .sections()
            .flatten()
            .filter_map(|name| Channel::from_section_name(name).map(|channel| (name, channel)))
            .map(|(name, channel)| self.data_section(path, name, channel))
            .collect()
    }

    fn data_section(
        &self,
        path: &Path,
        name: &str,
        channel: Channel,
    ) -> Result<DataSection, FormatError> {
        let get = |key: &str| self.ini.get_from(Some(name), key);
        let missing = |key: &str| FormatError::MissingEntry {
            path: path.to_owned(),
            what: format!("{key} in [{name}]"),
        };
        let sample_type = SampleType::from_dtype(get("dtype").ok_or_else(|| missing("dtype"))?)?;
        let length = parse_entry(path, name, "length", get("length"))?;
        let storage = match get("type").unwrap_or("file") {
            "file" => SectionStorage::File {
                datafile: get("datafile")
                    .filter(|file| !file.is_empty())
                    .map(PathBuf::from)
                    .ok_or_else(|| missing("datafile"))?,
                fasthash: get("fasthash")
                    .filter(|hash| !hash.is_empty())
                    .map(str::to_owned),
            },
            "fixed" => SectionStorage::Fixed {
                bytes: hex::decode(get("data").ok_or_else(|| missing("data"))?.trim()).map_err(
                    |e| FormatError::InvalidEntry {
                        path: path.to_owned(),
                        key: format!("{name}.data"),
                        value: e.to_string(),
                    },
                )?,
            },
            other => {
                return Err(FormatError::InvalidEntry {
                    path: path.to_owned(),
                    key: format!("{name}.type"),
                    value: other.to_owned(),
                });
            }
        };
        Ok(DataSection {
            channel,
            sample_type,
            length,
            storage,
        })
    }

    pub fn set_file_section(
        &mut self,
        channel: &Channel,
        sample_type: SampleType,
        length: usize,
        datafile: &str,
        sha256: &str,
        fasthash: &str,
    ) {
        self.ini
            .with_section(Some(channel.section_name()))
            .set("dtype", sample_type.to_string())
            .set("length", length.to_string())
            .set("type", "file")
            .set("datafile", datafile)
            .set("order", ROW_MAJOR)
            .set("sha256", sha256)
            .set("fasthash", fasthash);
    }

    pub fn set_fixed_section(&mut self, channel: &Channel, sample_type: SampleType, bytes: &[u8]) {
        let length = bytes.len() / sample_type.item_size();
        self.ini
            .with_section(Some(channel.section_name()))
            .set("dtype", sample_type.to_string())
            .set("length", length.to_string())
            .set("type", "fixed")
            .set("data", hex::encode(bytes));
    }

    /// Scope settings per channel, from the `<SECTION>_SCOPE` sections.
    pub fn scope_sections(&self) -> BTreeMap<Channel, BTreeMap<String, String>> {
        self.ini
            .iter()
            .filter_map(|(name, properties)| {
                let channel = name?
                    .strip_suffix(SCOPE_SUFFIX)
                    .and_then(Channel::from_section_name)?;
                let settings = properties
                    .iter()
                    .map(|(key, value)| (key.to_owned(), value.to_owned()))
                    .collect();
                Some((channel, settings))
            })
            .collect()
    }

    pub fn set_scope(&mut self, channel: &Channel, key: &str, value: &str) {
        self.ini.set_to(
            Some(format!("{}{SCOPE_SUFFIX}", channel.section_name())),
            key.to_owned(),
            value.to_owned(),
        );
    }
}

fn parse_entry(
    path: &Path,
    section: &str,
    key: &str,
    value: Option<&str>,
) -> Result<usize, FormatError> {
    let value = value.ok_or_else(|| FormatError::MissingEntry {
        path: path.to_owned(),
        what: format!("{key} in [{section}]"),
    })?;
    value.trim().parse().map_err(|_| FormatError::InvalidEntry {
        path: path.to_owned(),
        key: format!("{section}.{key}"),
        value: value.to_owned(),
    })
}

fn now() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = "\
[COMMON]
nrTraces = 4
version = 0.2
status = complete
comment = bench run

[EM]
dtype = int8
length = 100
type = file
datafile = em.dat

[KEY]
dtype = uint8
length = 4
type = fixed
data = 00112233

[EM_SCOPE]
HORIZ_INTERVAL = 1e-9
";

    fn example() -> Metafile {
        Metafile {
            ini: Ini::load_from_str(EXAMPLE).unwrap(),
        }
    }

    #[test]
    fn reads_sections() {
        let path = Path::new("example.meta");
        let metafile = example();
        assert_eq!(metafile.trace_count(path).unwrap(), 4);
        assert!(metafile.is_complete());
        assert_eq!(metafile.comment(), Some("bench run"));

        let sections = metafile.data_sections(path).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(
            sections[0],
            DataSection {
                channel: Channel::Em,
                sample_type: SampleType::Int8,
                length: 100,
                storage: SectionStorage::File {
                    datafile: PathBuf::from("em.dat"),
                    fasthash: None
                },
            }
        );
        assert_eq!(
            sections[1].storage,
            SectionStorage::Fixed {
                bytes: vec![0x00, 0x11, 0x22, 0x33]
            }
        );

        let scope = metafile.scope_sections();
        assert_eq!(scope[&Channel::Em]["HORIZ_INTERVAL"], "1e-9");
    }

    #[test]
    fn rejects_bad_numbers() {
        let mut metafile = example();
        metafile.set_common("nrTraces", "four");
        assert!(matches!(
            metafile.trace_count(Path::new("x.meta")),
            Err(FormatError::InvalidEntry { .. })
        ));
    }

    #[test]
    fn comment_lines_accumulate() {
        let mut metafile = Metafile::new();
        assert_eq!(metafile.comment(), None);
        metafile.add_comment("first");
        metafile.add_comment("second");
        assert_eq!(metafile.comment(), Some("first\nsecond"));
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traces.meta");
        let mut metafile = Metafile::new();
        metafile.set_trace_count(3);
        metafile.add_comment("a\nb");
        metafile.set_fixed_section(&Channel::Key, SampleType::Uint8, &[1, 2]);
        metafile.set_scope(&Channel::Em, "HORIZ_INTERVAL", "0.5");
        metafile.complete();
        metafile.save(&path).unwrap();

        let loaded = Metafile::load(&path).unwrap();
        assert_eq!(loaded.trace_count(&path).unwrap(), 3);
        assert_eq!(loaded.comment(), Some("a\nb"));
        assert!(loaded.is_complete());
        assert_eq!(loaded.data_sections(&path).unwrap().len(), 1);
        assert_eq!(loaded.scope_sections().len(), 1);
    }

    #[test]
    fn legacy_layout_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.meta");
        std::fs::write(&path, "[DATA]\ndtype = int8\n").unwrap();
        assert!(matches!(
            Metafile::load(&path),
            Err(AlignerError::Format(FormatError::Metafile { .. }))
        ));
    }
}
