//! Process-wide log subscriber.

use tracing::Subscriber;
use tracing_log::LogTracer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Builds the subscriber writing to standard error. `RUST_LOG` wins over `verbose`.
pub fn subscriber(verbose: bool, json: bool) -> Result<impl Subscriber + Send + Sync, BoxError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(verbose)))?;

    let (human, structured) = if json {
        (None, Some(fmt::layer().json().with_writer(std::io::stderr)))
    } else {
        (
            Some(fmt::layer().with_target(verbose).with_writer(std::io::stderr)),
            None,
        )
    };

    Ok(tracing_subscriber::registry()
        .with(filter)
        .with(human)
        .with(structured))
}

/// Installs [`subscriber`] globally. Records emitted through the `log`
/// facade are forwarded to it.
pub fn init(verbose: bool, json: bool) -> Result<(), BoxError> {
    let subscriber = subscriber(verbose, json)?;
    LogTracer::init()?;
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
