//! Logging infrastructure for stackgen
//!
//! Structured `tracing` output on stderr. stdout is reserved for command
//! results so that `stackgen generate` can be consumed by scripts.

use std::time::Instant;
use tracing::{Level, debug, info, span};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Initialize tracing subscriber for structured logging
///
/// `RUST_LOG` wins when set. Otherwise `verbose` selects
/// `stackgen=debug` with span-close timings, or `stackgen=info,warn`.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("stackgen=debug,stackgen_engine=debug,info")
            } else {
                EnvFilter::try_new("stackgen=info,stackgen_engine=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_line_number(false)
        .with_file(false);

    if verbose {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                layer
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer.with_target(false).compact())
            .try_init()?;
    }

    Ok(())
}

/// Span covering one generation run
pub fn generation_span(base: &str) -> tracing::Span {
    span!(Level::INFO, "generate", base = %base)
}

/// Times one pipeline stage and logs its completion
pub struct StageTimer {
    stage: &'static str,
    started: Instant,
}

impl StageTimer {
    pub fn start(stage: &'static str) -> Self {
        debug!(stage = %stage, "Entering stage");
        Self {
            stage,
            started: Instant::now(),
        }
    }

    /// Log completion and return elapsed milliseconds
    pub fn finish(self) -> u128 {
        let duration_ms = self.started.elapsed().as_millis();
        debug!(stage = %self.stage, duration_ms = %duration_ms, "Stage completed");
        duration_ms
    }
}

/// Log a committed stack at info level
pub fn log_stack_committed(version: u32, path: &str, services: usize) {
    info!(
        version = %version,
        path = %path,
        services = %services,
        "Stack committed"
    );
}
