//! Subscriber setup for the binaries.

use std::env;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the global subscriber.
///
/// `RANKCHECK_LOG` takes an `EnvFilter` directive (default
/// `rankcheck=info,warn`, or `rankcheck=debug,info` when `DEBUG` is set).
/// `RANKCHECK_LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("RANKCHECK_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "rankcheck=debug,info"
        } else {
            "rankcheck=info,warn"
        })
    });

    let format = env::var("RANKCHECK_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}
