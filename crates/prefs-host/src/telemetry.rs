//! Tracing subscriber setup for host applications.

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `verbose` forces debug-level output; otherwise `RUST_LOG` is honored with
/// an `info` fallback. Call once at process startup.
pub fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
