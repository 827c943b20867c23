//! The JSON project file describing one batch run.
//!
//! ```json
//! {
//!   "source": { "format": "metafile", "path": "traces.meta" },
//!   "detection-channel": "em",
//!   "filters": [ { "kind": "absolute" } ],
//!   "triggers": [ { "kind": "rising-edge", "threshold": 40.0 } ],
//!   "window": { "primary": { "before": 50, "after": 100 } }
//! }
//! ```
//!
//! Relative paths are resolved against the directory holding the file.
use crate::{
    AlignerResult, ParameterError,
    batch::{AlignmentWindow, BatchAligner, BatchOptions},
    data::{ArraySource, Channel, MetafileSource, TraceDataSource},
    error::IoResultExt,
    pipeline::Pipeline,
    registry::StageSettings,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "format")]
pub enum SourceSettings {
    /// One `.npy` file per channel.
    Array {
        files: BTreeMap<Channel, PathBuf>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        comment: Option<String>,
    },
    Metafile { path: PathBuf },
}

impl SourceSettings {
    fn resolve(&mut self, base: &Path) {
        match self {
            SourceSettings::Array { files, .. } => {
                files.values_mut().for_each(|path| resolve(path, base))
            }
            SourceSettings::Metafile { path } => resolve(path, base),
        }
    }
}

fn default_detection_channel() -> Channel {
    Channel::Em
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ProjectSettings {
    pub source: SourceSettings,
    #[serde(default = "default_detection_channel")]
    pub detection_channel: Channel,
    /// Applied in the order listed.
    #[serde(default)]
    pub filters: Vec<StageSettings>,
    /// Applied in the order listed, each searching the range left by the previous one.
    #[serde(default)]
    pub triggers: Vec<StageSettings>,
    pub window: AlignmentWindow,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

impl ProjectSettings {
    pub fn load(path: &Path) -> AlignerResult<Self> {
        let text = std::fs::read_to_string(path).err_path(path)?;
        let mut settings: Self =
            serde_json::from_str(&text).map_err(|e| ParameterError::Settings {
                path: path.to_owned(),
                message: e.to_string(),
            })?;
        settings.window.validate()?;
        let base = path.parent().unwrap_or(Path::new(""));
        settings.source.resolve(base);
        if let Some(output) = &mut settings.output {
            resolve(output, base);
        }
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> AlignerResult<()> {
        let text = serde_json::to_string_pretty(self).map_err(|e| ParameterError::Settings {
            path: path.to_owned(),
            message: e.to_string(),
        })?;
        std::fs::write(path, text).err_path(path)?;
        info!("Saved settings to {}", path.display());
        Ok(())
    }

    /// Loads the dataset named by `source`.
    pub fn open(&self) -> AlignerResult<Box<dyn TraceDataSource>> {
        Ok(match &self.source {
            SourceSettings::Array { files, comment } => {
                Box::new(ArraySource::load(files.clone(), comment.clone())?)
            }
            SourceSettings::Metafile { path } => Box::new(MetafileSource::load(path)?),
        })
    }

    pub fn pipeline(&self) -> Result<Pipeline, ParameterError> {
        Pipeline::from_settings(&self.filters, &self.triggers)
    }

    pub fn aligner(&self) -> Result<BatchAligner, ParameterError> {
        Ok(
            BatchAligner::new(self.pipeline()?, self.detection_channel.clone(), self.window)?
                .with_options(BatchOptions {
                    trace_limit: self.trace_limit,
                }),
        )
    }
}

fn resolve(path: &mut PathBuf, base: &Path) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}
