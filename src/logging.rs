//! Tracing bootstrap.
//!
//! One subscriber for the whole process, compact human-readable format.
//! `RUST_LOG` wins when set; otherwise `--debug` picks the directive.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Initialize the tracing subscriber.
///
/// Safe to call once per process; a second call reports the error from
/// the underlying registry instead of panicking.
pub fn init_tracing(debug: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if debug {
                EnvFilter::try_new("stetho=debug,info")
            } else {
                EnvFilter::try_new("stetho=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if debug {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).compact())
            .try_init()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_initialization_does_not_panic() {
        let first = init_tracing(false);
        let second = init_tracing(true);
        // One of the two fails depending on test execution order; the
        // point is that neither panics.
        assert!(first.is_ok() || second.is_err() || second.is_ok());
    }
}
