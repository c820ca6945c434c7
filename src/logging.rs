use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn";

fn filter_from_env() -> EnvFilter {
    match std::env::var("XREF_LOG") {
        Ok(v) if !v.trim().is_empty() => {
            EnvFilter::try_new(v.trim()).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
        }
        _ => EnvFilter::new(DEFAULT_FILTER),
    }
}

/// Structured logs go to stderr so command output on stdout stays parseable.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_from_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
