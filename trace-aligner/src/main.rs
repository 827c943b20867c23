use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use metrics::counter;
use serde::Serialize;
use std::path::PathBuf;
use trace_aligner::{
    export::Exporter, filters, pipeline::PipelineResult, settings::ProjectSettings, triggers,
};
use trace_aligner_common::{
    LogLevel, TraceIndex, init_tracer,
    metrics::{
        component_info_metric, describe_metrics,
        failures::{self, FailureKind},
        names::FAILURES,
    },
};
use tracing::{debug, error, info};

#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Level applied when RUST_LOG is not set
    #[clap(long, value_enum, default_value_t = LogLevel::Info, global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Align every trace of the dataset named in a settings file and export the result
    Align(Align),

    /// Print one trace after filtering, with its trigger result, as JSON
    Preview(Preview),

    /// List the registered filter and trigger kinds
    Kinds,
}

#[derive(Debug, Parser)]
struct Align {
    /// Project settings file
    #[clap(long)]
    settings: PathBuf,

    /// Export directory, overriding the settings file
    #[clap(long)]
    output: Option<PathBuf>,

    /// Align only the first N traces, overriding the settings file
    #[clap(long)]
    trace_limit: Option<usize>,

    /// Worker threads, all cores if omitted
    #[clap(long, env = "TRACE_ALIGNER_THREADS")]
    threads: Option<usize>,
}

#[derive(Debug, Parser)]
struct Preview {
    /// Project settings file
    #[clap(long)]
    settings: PathBuf,

    /// Trace to preview
    #[clap(long)]
    trace: TraceIndex,

    /// Rotate the raw trace right by this many samples before filtering
    #[clap(long, default_value = "0", allow_hyphen_values = true)]
    shift: isize,
}

#[derive(Serialize)]
struct PreviewOutput {
    trace: TraceIndex,
    #[serde(flatten)]
    result: PipelineResult,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracer(cli.log_level);
    debug!("{cli:?}");

    describe_metrics();
    component_info_metric("trace-aligner");

    match cli.mode {
        Mode::Align(args) => align(args),
        Mode::Preview(args) => preview(args),
        Mode::Kinds => {
            println!("filters:");
            filters::registry()
                .kinds()
                .for_each(|kind| println!("  {kind}"));
            println!("triggers:");
            triggers::registry()
                .kinds()
                .for_each(|kind| println!("  {kind}"));
            Ok(())
        }
    }
}

fn align(args: Align) -> Result<()> {
    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;
    }

    let mut settings = ProjectSettings::load(&args.settings)?;
    if args.trace_limit.is_some() {
        settings.trace_limit = args.trace_limit;
    }
    // Stages are validated before any data is read.
    let aligner = settings.aligner()?;
    let source = settings.open().inspect_err(|e| {
        error!("{e}");
        counter!(
            FAILURES,
            &[failures::get_label(FailureKind::DatasetLoadFailed)]
        )
        .increment(1);
    })?;

    let result = aligner.run(source.as_ref())?;
    let target = args
        .output
        .or(settings.output.clone())
        .unwrap_or_else(|| Exporter::default_target(source.as_ref()));
    let written = Exporter::write(source.as_ref(), &result.aligned, &target)?;

    info!(
        "{} traces accepted, {} rejected, {} crops written to {}",
        result.counts.accepted_traces,
        result.counts.rejected_traces,
        result.counts.crops,
        written.display()
    );
    Ok(())
}

fn preview(args: Preview) -> Result<()> {
    let settings = ProjectSettings::load(&args.settings)?;
    let pipeline = settings.pipeline()?;
    let source = settings.open()?;
    if args.trace >= source.trace_count() {
        return Err(anyhow!(
            "Trace {} requested but the dataset holds {} traces",
            args.trace,
            source.trace_count()
        ));
    }
    let result = pipeline.preview(
        source.as_ref(),
        &settings.detection_channel,
        args.trace,
        args.shift,
    )?;
    println!(
        "{}",
        serde_json::to_string(&PreviewOutput {
            trace: args.trace,
            result,
        })?
    );
    Ok(())
}
