//! Tracing subscriber setup for the `ideaworks` binary.
//!
//! `IDEAWORKS_LOG` takes an `EnvFilter` directive and wins over `--verbose`.
//! `IDEAWORKS_LOG_FORMAT=json` switches to one JSON object per line.
//! Logs always go to stderr so stdout stays machine-readable.

use std::env;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub const LOG_ENV: &str = "IDEAWORKS_LOG";
pub const LOG_FORMAT_ENV: &str = "IDEAWORKS_LOG_FORMAT";

/// Default filter directive when `IDEAWORKS_LOG` is unset.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "ideaworks=debug,info"
    } else {
        "ideaworks=info,warn"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    /// Anything other than `json` (case-insensitive) is compact.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(f) if f.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Install the global subscriber. Calling it twice is a no-op.
pub fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    let format = LogFormat::parse(env::var(LOG_FORMAT_ENV).ok().as_deref());

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
    };
    // A subscriber installed earlier (tests, embedding) keeps priority.
    let _ = result;
}
