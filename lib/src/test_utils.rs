use tracing_subscriber::EnvFilter;

/// Installs a log subscriber printing to the test output, filtered by `RUST_LOG`. Can be called
/// from every test.
pub(crate) fn init_log() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}
