//! Writes an [AlignedDataset] to a fresh directory in its source's format family.
use crate::{
    AlignerError, AlignerResult, batch::AlignedDataset, data::TraceDataSource,
    error::IoResultExt,
};
use chrono::Local;
use metrics::counter;
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument, warn};
use trace_aligner_common::metrics::{
    failures::{self, FailureKind},
    names::FAILURES,
};

const TARGET_FORMAT: &str = "%Y-%m-%d-%H.%M";

pub struct Exporter;

impl Exporter {
    /// `<source directory>/<YYYY-mm-dd-HH.MM>` at the current local time.
    pub fn default_target(source: &dyn TraceDataSource) -> PathBuf {
        source
            .location()
            .join(Local::now().format(TARGET_FORMAT).to_string())
    }

    /// Writes `aligned` to `target`, which must not exist or be an empty
    /// directory, and must not be the source directory.
    ///
    /// Files are written to a hidden sibling staging directory which is
    /// renamed to `target` once complete. On failure nothing is left behind.
    #[instrument(skip_all, fields(target = %target.display(), traces = aligned.len()))]
    pub fn write(
        source: &dyn TraceDataSource,
        aligned: &AlignedDataset,
        target: &Path,
    ) -> AlignerResult<PathBuf> {
        check_target(source, target)?;
        let staging = staging_directory(target)?;
        if staging.exists() {
            warn!("Removing stale staging directory {}", staging.display());
            std::fs::remove_dir_all(&staging).err_path(&staging)?;
        }
        std::fs::create_dir_all(&staging).err_path(&staging)?;

        match source
            .write(aligned, &staging)
            .and_then(|_| commit(&staging, target))
        {
            Ok(()) => {
                info!("Exported {} traces to {}", aligned.len(), target.display());
                Ok(target.to_owned())
            }
            Err(e) => {
                error!("Export failed: {e}");
                counter!(FAILURES, &[failures::get_label(FailureKind::ExportFailed)]).increment(1);
                if let Err(cleanup) = std::fs::remove_dir_all(&staging) {
                    warn!("Cannot remove {}: {cleanup}", staging.display());
                }
                Err(e)
            }
        }
    }
}

fn check_target(source: &dyn TraceDataSource, target: &Path) -> AlignerResult<()> {
    let exists = || AlignerError::DestinationExists(target.to_owned());
    if !target.exists() {
        return Ok(());
    }
    if !target.is_dir() {
        return Err(exists());
    }
    let canonical_target = target.canonicalize().err_path(target)?;
    let is_source = source
        .location()
        .canonicalize()
        .is_ok_and(|location| location == canonical_target);
    let is_empty = std::fs::read_dir(target)
        .err_path(target)?
        .next()
        .is_none();
    if is_source || !is_empty {
        return Err(exists());
    }
    Ok(())
}

/// `<parent>/.<name>.partial`
fn staging_directory(target: &Path) -> AlignerResult<PathBuf> {
    let name = target
        .file_name()
        .ok_or_else(|| AlignerError::DestinationExists(target.to_owned()))?;
    let parent = target.parent().unwrap_or(Path::new(""));
    Ok(parent.join(format!(".{}.partial", name.to_string_lossy())))
}

fn commit(staging: &Path, target: &Path) -> AlignerResult<()> {
    if target.exists() {
        std::fs::remove_dir(target).err_path(target)?;
    }
    std::fs::rename(staging, target).err_path(target)
}
