use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber.
///
/// Verbosity comes from `RUST_LOG` when it is set, and defaults to `hippodrome=info`
/// otherwise. Useful settings:
///
/// - `RUST_LOG=hippodrome=debug` - every request, reply, park and release
/// - `RUST_LOG=hippodrome::repository=info` - only the state log
/// - `RUST_LOG=warn` - protocol rejections and failures only
///
/// Calling it a second time is a no-op, so tests may call it freely.
pub fn setup_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new("hippodrome=info")
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
