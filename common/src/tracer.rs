use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Layer};

/// Verbosity used when `RUST_LOG` is not set.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Initialises the stderr tracer for the calling binary.
/// #Arguments
/// * `default_level` - The level applied when `RUST_LOG` is absent or invalid.
/// #Returns
/// `true` if this call installed the global subscriber, `false` if one was
/// already present (for instance when called twice from a test harness).
pub fn init_tracer(default_level: LogLevel) -> bool {
    let stderr_tracer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    // This filter is applied to the stderr tracer
    let log_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from(default_level).into())
        .from_env_lossy();

    let subscriber =
        tracing_subscriber::Registry::default().with(stderr_tracer.with_filter(log_filter));

    tracing::subscriber::set_global_default(subscriber).is_ok()
}
