//! Log output setup.

use std::io;

use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber on stderr.
///
/// The filter comes from `RUST_LOG` when it is set and parses, otherwise
/// from `default_filter` (e.g. `"info,tradewind=debug"`). Thread names are
/// shown because every connection and game runs on its own named thread.
///
/// Returns `false` if a global subscriber was already installed; calling
/// this more than once is harmless.
pub fn init(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_target(true)
        .with_writer(io::stderr)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        let _ = init("debug");
        assert!(!init("not a filter ((("));
    }
}
