//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins when set; otherwise `info` for everything and `debug` for
//! the Meridian crates.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "info,meridian_api=debug,meridian_db=info";

pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // try_init so tests and embedding binaries can call it more than once
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init();
}
