//! Synthetic side-channel captures with a jittered clock burst.
use ndarray::{Array2, s};
use rand::{Rng, rngs::StdRng, seq::index};
use rand_distr::{Distribution, Normal};
use trace_aligner_common::{SampleIndex, TraceIndex};

pub const KEY_LENGTH: usize = 16;

/// Samples in each level of the clock burst.
const BURST_STEP: usize = 3;
/// Gap between the end of the burst and the leakage window.
const LEAKAGE_GAP: usize = 1;
const LEAKAGE_LEN: usize = 100;
/// Offset of the leaking samples inside the leakage window.
const LEAKAGE_AT: usize = 50;
/// Samples from the burst start to the end of the leakage window.
pub const EVENT_LEN: usize = 3 * BURST_STEP + LEAKAGE_GAP + LEAKAGE_LEN;

pub const FIXED_KEY: [u8; KEY_LENGTH] = [
    0xe8, 0xe9, 0xea, 0xeb, 0xed, 0xee, 0xef, 0xf0, 0xf2, 0xf3, 0xf4, 0xf5, 0xf7, 0xf8, 0xf9, 0xfa,
];

pub struct CaptureSettings {
    pub traces: usize,
    pub samples: usize,
    /// Traces, chosen at random, which carry no burst.
    pub without_burst: usize,
    pub noise: f64,
    pub leakage_noise: f64,
}

pub struct Capture {
    pub em: Array2<i8>,
    pub plain: Array2<u8>,
    pub cipher: Array2<u8>,
    /// Burst start of each trace, if it has one.
    pub bursts: Vec<Option<SampleIndex>>,
}

/// Saturates to the `int8` range.
fn to_sample(value: f64) -> i8 {
    value as i8
}

pub fn generate(settings: &CaptureSettings, rng: &mut StdRng) -> anyhow::Result<Capture> {
    anyhow::ensure!(
        settings.samples > EVENT_LEN + 1,
        "traces need more than {} samples to hold a burst",
        EVENT_LEN + 1
    );
    anyhow::ensure!(
        settings.without_burst <= settings.traces,
        "cannot leave {} of {} traces without a burst",
        settings.without_burst,
        settings.traces
    );
    let noise = Normal::new(0.0, 1.0)?;
    let leakage_noise = Normal::new(0.0, settings.leakage_noise)?;

    let quiet: Vec<TraceIndex> =
        index::sample(&mut *rng, settings.traces, settings.without_burst).into_vec();
    let plain = Array2::from_shape_fn((settings.traces, KEY_LENGTH), |_| rng.random::<u8>());
    let cipher = Array2::from_shape_fn((settings.traces, KEY_LENGTH), |(trace, byte)| {
        plain[[trace, byte]] ^ FIXED_KEY[byte]
    });
    let mut em = Array2::from_shape_fn((settings.traces, settings.samples), |_| {
        to_sample(noise.sample(&mut *rng) * settings.noise)
    });

    let mut bursts = Vec::with_capacity(settings.traces);
    for (trace, mut row) in em.rows_mut().into_iter().enumerate() {
        if quiet.contains(&trace) {
            bursts.push(None);
            continue;
        }
        let offset = rng.random_range(1..settings.samples - EVENT_LEN);
        let high = rng.random_range(99..=127);
        let mid = rng.random_range(-10..=10);
        let low = rng.random_range(-127..=-99);
        for (level, value) in [high, mid, low].into_iter().enumerate() {
            let start = offset + level * BURST_STEP;
            row.slice_mut(s![start..start + BURST_STEP]).fill(value);
        }

        let leakage = offset + 3 * BURST_STEP + LEAKAGE_GAP;
        for (i, sample) in row
            .slice_mut(s![leakage..leakage + LEAKAGE_LEN])
            .iter_mut()
            .enumerate()
        {
            let mut value = leakage_noise.sample(&mut *rng);
            if let Some(byte) = i.checked_sub(LEAKAGE_AT).filter(|&b| b < KEY_LENGTH) {
                let intermediate = (FIXED_KEY[byte] ^ plain[[trace, byte]]) as f64 / 256.0 - 0.5;
                value = 0.5 * value + 0.5 * intermediate;
            }
            *sample = to_sample(value * settings.noise);
        }
        bursts.push(Some(offset));
    }
    Ok(Capture {
        em,
        plain,
        cipher,
        bursts,
    })
}
