use std::io;

/// Install the global tracing subscriber.
///
/// Logs go to stderr so the transcript and `--json` output on stdout stay
/// clean. `RUST_LOG` takes precedence over the verbosity count.
pub fn setup_logging(verbose_level: u8) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::from_default_env()
    } else {
        tracing_subscriber::EnvFilter::new(filter_for_verbosity(verbose_level))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .with_writer(|| Box::new(io::stderr()) as Box<dyn io::Write + Send>)
        .init();
}

// Map verbosity count to filters
fn filter_for_verbosity(verbose_level: u8) -> &'static str {
    match verbose_level {
        0 => "warn,artifact_stream=info",
        1 => "info,artifact_stream=debug",
        _ => "debug,artifact_stream=trace",
    }
}
