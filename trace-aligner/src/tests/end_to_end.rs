use super::fixtures::{Capture, EDGE_AMPLITUDE, MemorySource, NOISE};
use crate::{
    AlignerError, FormatError,
    batch::{AlignmentWindow, AnchorCounts, BatchAligner, BatchResult, Rejection},
    data::{
        ArraySource, Channel, ChannelStore, MetafileSource, SampleType, TraceDataSource,
        metafile::{ALIGNED_METAFILE, Metafile},
    },
    export::Exporter,
    pipeline::Pipeline,
    registry::StageSettings,
    settings::ProjectSettings,
};
use ndarray::Array2;
use serde_json::json;
use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
};

const THRESHOLD: f64 = 50.0;

fn rising_edge_aligner(before: usize, after: usize) -> BatchAligner {
    let pipeline = Pipeline::from_settings(
        &[],
        &[StageSettings::new("rising-edge", json!({ "threshold": THRESHOLD }))],
    )
    .unwrap();
    BatchAligner::new(pipeline, Channel::Em, AlignmentWindow::single(before, after)).unwrap()
}

fn array_files(dir: &Path, suffix: &str, store: &ChannelStore) -> BTreeMap<Channel, std::path::PathBuf> {
    store
        .channels()
        .map(|channel| (channel.clone(), dir.join(format!("{channel}{suffix}.npy"))))
        .collect()
}

#[test]
fn ten_traces_three_without_edge() {
    let capture = Capture::generate(10, 1000, 200..300, &[2, 5, 8], 7);
    let source = MemorySource::new(capture.store.clone());
    let BatchResult {
        aligned,
        rejected,
        counts,
        ..
    } = rising_edge_aligner(50, 100).run(&source).unwrap();

    assert_eq!(aligned.len(), 7);
    assert_eq!(rejected, BTreeSet::from([2, 5, 8]));
    assert_eq!(counts.rejected_traces, 3);
    assert_eq!(counts.trigger_not_found, 3);
    assert_eq!(counts.accepted_traces + counts.rejected_traces, 10);

    for channel in [Channel::Em, Channel::Power] {
        let array = aligned.store().get(&channel).unwrap();
        assert_eq!(array.trace_count(), 7);
        assert_eq!(array.samples_per_trace(), 151);
        assert_eq!(array.sample_type(), SampleType::Int8);
    }

    for (row, crop) in aligned.crops().iter().enumerate() {
        assert_eq!(Some(crop.trigger_index), capture.edges[crop.trace]);

        // The edge sits at the same index in every crop.
        let em = aligned.store().read(&Channel::Em, row).unwrap();
        assert!(em[49] <= NOISE as f64);
        assert!(em[50] >= (EDGE_AMPLITUDE - NOISE) as f64);

        // Companion data stays with the trace that produced the crop.
        let plain = aligned.store().read(&Channel::Plain, row).unwrap();
        assert_eq!(plain, vec![crop.trace as f64; 16]);
        let cipher = aligned.store().read(&Channel::Cipher, row).unwrap();
        assert_eq!(cipher, vec![!(crop.trace as u8) as f64; 16]);
    }
}

#[test]
fn every_trace_is_accounted_for() {
    let capture = Capture::generate(60, 400, 10..390, &[0, 1, 2], 3);
    let source = MemorySource::new(capture.store.clone());
    let result = rising_edge_aligner(50, 100).run(&source).unwrap();

    assert_eq!(result.counts.total, 60);
    assert_eq!(
        result.counts.accepted_traces + result.counts.rejected_traces,
        60
    );
    assert_eq!(result.counts.crops, result.aligned.len());
    assert_eq!(result.counts.crops, result.counts.accepted_traces);
    for outcome in &result.outcomes {
        let expected = match capture.edges[outcome.trace] {
            None => Some(Rejection::TriggerNotFound),
            Some(edge) if edge < 50 || edge + 100 >= 400 => Some(Rejection::WindowOutOfBounds),
            Some(_) => None,
        };
        assert_eq!(outcome.rejection(), expected, "trace {}", outcome.trace);
    }
    // Output order follows source order.
    let traces: Vec<_> = result.aligned.crops().iter().map(|crop| crop.trace).collect();
    assert!(traces.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn dual_anchor_accounting() {
    let pulse = |start: Option<usize>, end: usize| -> Vec<f64> {
        (0..40)
            .map(|i| match start {
                Some(start) if (start..end).contains(&i) => 100.0,
                _ => 0.0,
            })
            .collect()
    };
    let source = MemorySource::waveforms(vec![
        pulse(Some(10), 30),
        pulse(Some(1), 30),
        pulse(Some(10), 38),
        pulse(Some(1), 38),
        pulse(None, 0),
    ]);
    let pipeline = Pipeline::from_settings(
        &[],
        &[StageSettings::new(
            "threshold-range",
            json!({"threshold": THRESHOLD, "min-range": 5}),
        )],
    )
    .unwrap();
    let result = BatchAligner::new(pipeline, Channel::Em, AlignmentWindow::single(3, 3))
        .unwrap()
        .run(&source)
        .unwrap();
    let counts = result.counts;

    assert_eq!(
        counts.primary,
        AnchorCounts {
            accepted: 2,
            rejected: 2
        }
    );
    assert_eq!(
        counts.secondary,
        AnchorCounts {
            accepted: 2,
            rejected: 2
        }
    );
    assert_eq!(counts.crops, 4);
    assert_eq!(counts.accepted_traces, 3);
    assert_eq!(counts.rejected_traces, 2);
    assert_eq!(counts.trigger_not_found, 1);
    assert_eq!(result.rejected, BTreeSet::from([3, 4]));

    let sources: Vec<_> = result
        .aligned
        .crops()
        .iter()
        .map(|crop| (crop.trace, crop.trigger_index))
        .collect();
    assert_eq!(sources, vec![(0, 10), (0, 30), (1, 30), (2, 10)]);
    assert!(
        result
            .aligned
            .store()
            .iter()
            .all(|(_, array)| array.samples_per_trace() == 7)
    );
}

#[test]
fn mismatched_trace_counts_fail_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let em = dir.path().join("em.npy");
    let plain = dir.path().join("plain.npy");
    ndarray_npy::write_npy(&em, &Array2::<i8>::zeros((100, 20))).unwrap();
    ndarray_npy::write_npy(&plain, &Array2::<u8>::zeros((99, 16))).unwrap();

    let result = ArraySource::load(
        BTreeMap::from([(Channel::Em, em), (Channel::Plain, plain)]),
        None,
    );
    assert!(matches!(
        result,
        Err(AlignerError::Format(FormatError::TraceCountMismatch {
            first_count: 100,
            second_count: 99,
            ..
        }))
    ));
}

#[test]
fn array_project_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let capture = Capture::generate(20, 500, 100..200, &[4], 11);
    ArraySource::save(&capture.store, dir.path(), "").unwrap();

    let settings_path = dir.path().join("project.json");
    std::fs::write(
        &settings_path,
        json!({
            "source": {
                "format": "array",
                "files": {"em": "em.npy", "power": "power.npy", "plain": "plain.npy", "cipher": "cipher.npy"}
            },
            "filters": [{"kind": "absolute"}],
            "triggers": [{"kind": "rising-edge", "threshold": THRESHOLD}],
            "window": {"primary": {"before": 20, "after": 30}},
            "output": "aligned"
        })
        .to_string(),
    )
    .unwrap();

    let settings = ProjectSettings::load(&settings_path).unwrap();
    let source = settings.open().unwrap();
    assert_eq!(source.store(), &capture.store);
    let result = settings.aligner().unwrap().run(source.as_ref()).unwrap();
    assert_eq!(result.aligned.len(), 19);

    let target = settings.output.clone().unwrap();
    Exporter::write(source.as_ref(), &result.aligned, &target).unwrap();

    let exported =
        ArraySource::load(array_files(&target, "_aligned", &capture.store), None).unwrap();
    assert_eq!(exported.store(), result.aligned.store());
}

#[test]
fn metafile_export_inherits_descriptor() {
    let dir = tempfile::tempdir().unwrap();
    let capture = Capture::generate(12, 300, 60..90, &[0, 11], 5);
    let mut metafile = Metafile::new();
    metafile.add_comment("bench capture");
    metafile.set_fixed_section(&Channel::Key, SampleType::Uint8, &[0x2b; 16]);
    metafile.set_scope(&Channel::Em, "HORIZ_INTERVAL", "0.5");
    let path = MetafileSource::save(metafile, &capture.store, dir.path(), "", "traces.meta").unwrap();

    let source = MetafileSource::load(&path).unwrap();
    let result = rising_edge_aligner(10, 20).run(&source).unwrap();
    assert_eq!(result.aligned.len(), 10);

    let target = dir.path().join("aligned");
    Exporter::write(&source, &result.aligned, &target).unwrap();

    let exported = MetafileSource::load(&target.join(ALIGNED_METAFILE)).unwrap();
    assert_eq!(exported.trace_count(), 10);
    assert_eq!(exported.store(), result.aligned.store());
    assert!(exported.metafile().is_complete());
    let metadata = exported.metadata();
    assert_eq!(metadata.fixed[&Channel::Key].bytes, vec![0x2b; 16]);
    assert_eq!(metadata.sample_frequency(&Channel::Em), Some(2.0));
    let comment = metadata.comment.as_deref().unwrap();
    assert!(comment.starts_with("bench capture"));
    assert!(comment.contains("Source file: "));
    assert!(target.join("em_aligned.dat").is_file());
}

#[test]
fn nothing_accepted_still_exports() {
    let dir = tempfile::tempdir().unwrap();
    let capture = Capture::generate(5, 100, 40..60, &[0, 1, 2, 3, 4], 1);
    let path =
        MetafileSource::save(Metafile::new(), &capture.store, dir.path(), "", "traces.meta")
            .unwrap();
    let source = MetafileSource::load(&path).unwrap();
    let result = rising_edge_aligner(10, 10).run(&source).unwrap();
    assert!(result.aligned.is_empty());

    let target = dir.path().join("aligned");
    Exporter::write(&source, &result.aligned, &target).unwrap();
    let exported = MetafileSource::load(&target.join(ALIGNED_METAFILE)).unwrap();
    assert_eq!(exported.trace_count(), 0);
    assert_eq!(exported.channels(), source.channels());
}

#[test]
fn export_refuses_source_directory() {
    let dir = tempfile::tempdir().unwrap();
    let capture = Capture::generate(3, 100, 40..60, &[], 2);
    let path =
        MetafileSource::save(Metafile::new(), &capture.store, dir.path(), "", "traces.meta")
            .unwrap();
    let source = MetafileSource::load(&path).unwrap();
    let result = rising_edge_aligner(10, 10).run(&source).unwrap();
    assert!(matches!(
        Exporter::write(&source, &result.aligned, dir.path()),
        Err(AlignerError::DestinationExists(_))
    ));
}
