mod command;
mod error;
mod options;

use crate::command::main;
use std::process::exit;
use std::sync::Once;

static TRACING: Once = Once::new();

/// Installs the tracing subscriber, but only if `RUST_LOG` is set.
///
/// Use for example `RUST_LOG=compiler=trace` to see every layout computed.
fn init_tracing() {
    TRACING.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}

fn main() {
    init_tracing();

    match main::run() {
        Ok(status) => exit(status),
        Err(err) => {
            if let Some(message) = err.message {
                eprintln!("{}", message);
            }

            exit(err.status);
        }
    }
}
