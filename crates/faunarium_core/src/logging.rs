//! Tracing setup shared by drivers and tests.

/// Initialize the tracing subscriber. Honors `RUST_LOG` when set,
/// defaults to `info`. Safe to call more than once; later calls are
/// no-ops.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    install(filter);
}

/// Initialize the tracing subscriber with an explicit filter directive
/// (e.g. `"debug"` or `"faunarium_core=trace"`), ignoring `RUST_LOG`.
pub fn init_logging_with(directive: &str) {
    install(tracing_subscriber::EnvFilter::new(directive));
}

fn install(filter: tracing_subscriber::EnvFilter) {
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_env_filter(filter)
            .finish(),
    )
    .ok();
}
