use tracing::level_filters::LevelFilter;
use tracing_error::ErrorLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Logs at info unless `RUST_LOG` says otherwise, for example
/// `RUST_LOG=sensors=trace,info` shows every raw sample.
///
/// Under systemd the logs go to the journal, otherwise to stderr. Stdout is
/// reserved for the readings.
///
/// example: `journalctl -fu env-station
/// --output-fields=CODE_FILE,CODE_LINE,MESSAGE -o cat`
pub fn setup() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    let registry = Registry::default().with(ErrorLayer::default());

    let journal = libsystemd::logging::connected_to_journal().then(tracing_journald::layer);
    match journal {
        Some(Ok(journal)) => registry.with(journal.with_filter(filter)).init(),
        not_journald => {
            let stderr = fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_file(true)
                .with_line_number(true)
                .with_target(false);
            registry.with(stderr.with_filter(filter)).init();
            if let Some(Err(err)) = not_journald {
                tracing::warn!("journald unreachable, logging to stderr instead: {err}");
            }
        }
    }
}
