//! Logging setup for the command-line front end.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the binary. `RUST_LOG` overrides the default filter:
//!
//! ```bash
//! RUST_LOG=edfkit=debug edfkit dedup ./recordings
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs the global subscriber. `verbose` lowers the default level to debug.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("edfkit=debug")
        } else {
            EnvFilter::new("edfkit=info")
        }
    });

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(verbose)
                .with_writer(std::io::stderr)
                .compact(),
        );

    // a second init (tests) keeps the first subscriber
    let _ = tracing::subscriber::set_global_default(subscriber);
}
