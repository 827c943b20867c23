mod generator;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use generator::{Capture, CaptureSettings, FIXED_KEY, KEY_LENGTH};
use ndarray::Array2;
use rand::{SeedableRng, rngs::StdRng};
use std::{collections::BTreeMap, path::PathBuf};
use trace_aligner::data::{
    ArraySource, Channel, ChannelArray, ChannelStore, MetafileSource, SampleType,
    metafile::Metafile,
};
use trace_aligner_common::{LogLevel, init_tracer};
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    /// One .npy file per channel
    Array,
    /// A metafile with one raw data file per channel
    Metafile,
}

#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Directory the dataset is written to, created if missing
    #[clap(long)]
    output: PathBuf,

    #[clap(long, value_enum, default_value_t = Format::Metafile)]
    format: Format,

    /// Number of traces to generate
    #[clap(long, default_value = "1000")]
    traces: usize,

    /// Samples per trace
    #[clap(long, default_value = "4000")]
    samples: usize,

    /// Number of traces, chosen at random, without a clock burst
    #[clap(long, default_value = "0")]
    without_burst: usize,

    /// Standard deviation of the background noise, in int8 counts
    #[clap(long, default_value = "10.0")]
    noise: f64,

    /// Relative standard deviation of the noise in the leakage window
    #[clap(long, default_value = "2.0")]
    leakage_noise: f64,

    /// Sampling frequency recorded in the metafile scope settings, in Hz
    #[clap(long, default_value = "2.5e9")]
    sample_frequency: f64,

    #[clap(long, default_value = "42")]
    seed: u64,

    #[clap(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracer(cli.log_level);
    debug!("{cli:?}");

    let mut rng = StdRng::seed_from_u64(cli.seed);
    let capture = generator::generate(
        &CaptureSettings {
            traces: cli.traces,
            samples: cli.samples,
            without_burst: cli.without_burst,
            noise: cli.noise,
            leakage_noise: cli.leakage_noise,
        },
        &mut rng,
    )?;
    info!(
        "Generated {} traces, {} with a clock burst",
        cli.traces,
        capture.bursts.iter().flatten().count()
    );

    std::fs::create_dir_all(&cli.output)?;
    match cli.format {
        Format::Array => write_arrays(&cli, capture)?,
        Format::Metafile => write_metafile(&cli, capture)?,
    }
    Ok(())
}

fn store(capture: Capture, key: Option<Array2<u8>>) -> Result<ChannelStore> {
    let mut channels = BTreeMap::from([
        (Channel::Em, ChannelArray::from_array(capture.em)),
        (Channel::Plain, ChannelArray::from_array(capture.plain)),
        (Channel::Cipher, ChannelArray::from_array(capture.cipher)),
    ]);
    if let Some(key) = key {
        channels.insert(Channel::Key, ChannelArray::from_array(key));
    }
    Ok(ChannelStore::new(channels)?)
}

/// Array files have no dataset-wide constants, so the key is written per trace.
fn write_arrays(cli: &Cli, capture: Capture) -> Result<()> {
    let key = Array2::from_shape_fn((cli.traces, KEY_LENGTH), |(_, byte)| FIXED_KEY[byte]);
    let written = ArraySource::save(&store(capture, Some(key))?, &cli.output, "")?;
    for path in written {
        info!("Wrote {}", path.display());
    }
    Ok(())
}

fn write_metafile(cli: &Cli, capture: Capture) -> Result<()> {
    let mut metafile = Metafile::new();
    metafile.set_algorithm("XOR");
    metafile.add_comment(&format!(
        "Simulated capture, seed {}, {} traces without burst",
        cli.seed, cli.without_burst
    ));
    metafile.set_fixed_section(&Channel::Key, SampleType::Uint8, &FIXED_KEY);
    metafile.set_scope(
        &Channel::Em,
        "HORIZ_INTERVAL",
        &(1.0 / cli.sample_frequency).to_string(),
    );
    let path = MetafileSource::save(
        metafile,
        &store(capture, None)?,
        &cli.output,
        "",
        "traces.meta",
    )?;
    info!("Wrote {}", path.display());
    Ok(())
}
