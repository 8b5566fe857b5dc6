//! Console logging setup.
//!
//! The library only emits `tracing` events; binaries decide where they go.
//! [`init_tracing`] is the stock choice: human-readable output on stderr,
//! filtered by `RUST_LOG` (default `info`).

use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "info";

/// Install a global fmt subscriber. Safe to call more than once; later
/// calls (or an already installed subscriber) are left untouched.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let subscriber = tracing_subscriber::registry().with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_filter(filter),
    );

    if subscriber.try_init().is_err() {
        tracing::debug!("global tracing subscriber already initialized");
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_init_twice_is_harmless() {
        super::init_tracing();
        super::init_tracing();
    }
}
