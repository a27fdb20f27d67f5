/*!
 * Tracing
 * Structured logging for queues, worker threads and dedicated threads
 *
 * Features:
 * - Env-filtered subscriber (RUST_LOG)
 * - JSON-formatted logs for structured parsing
 * - Thread names and ids on every line
 * - Spans around off-thread process runs
 */

use crate::core::ProcessId;
use std::time::Instant;
use tracing::{debug, info, span, Level};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - SCHEDULER_TRACE_JSON: Enable JSON output (default: false)
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("SCHEDULER_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        info!(json = use_json, "Structured tracing initialized");
    }
}

/// Span covering one off-thread run of a process, logging its wall time on drop
pub struct RunSpan {
    span: tracing::Span,
    start: Instant,
    id: ProcessId,
}

impl RunSpan {
    pub fn new(id: ProcessId, name: &str) -> Self {
        let span = span!(
            Level::DEBUG,
            "process_run",
            process = %id,
            name = name,
            duration_ms = tracing::field::Empty,
        );
        debug!(parent: &span, process = %id, name, "run started");

        Self {
            span,
            start: Instant::now(),
            id,
        }
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for RunSpan {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed().as_millis();
        self.span.record("duration_ms", elapsed as u64);
        debug!(parent: &self.span, process = %self.id, duration_ms = elapsed as u64, "run finished");
    }
}
