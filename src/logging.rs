//! Subscriber setup for `tracing` events.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use crate::config::{LoggingConfig, TelemetryConfig, DEFAULT_EXPORTER};

/// Maps a configured level name to a filter. Unknown names fall back to info.
pub fn level_filter(level: &str) -> LevelFilter {
    match level {
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => LevelFilter::INFO,
    }
}

/// Span lifecycle events to emit. With telemetry on, every closed span
/// (`http.request`, `webhook.handle`, `webhook.forward`, ...) is written
/// with its fields and timings.
pub fn span_events(telemetry: &TelemetryConfig) -> FmtSpan {
    if telemetry.enabled {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

/// Installs the global subscriber described by `cfg` and `telemetry`.
///
/// With `output: file`, events go to stdout and are appended to the file.
/// If the file cannot be opened, logging stays on stdout and the failure is
/// reported as the first event.
pub fn init(cfg: &LoggingConfig, telemetry: &TelemetryConfig) {
    let level = level_filter(&cfg.level);
    let json = cfg.format == "json";

    let mut open_error = None;
    let file = if cfg.output == "file" {
        match OpenOptions::new().create(true).append(true).open(&cfg.file_path) {
            Ok(file) => Some(Mutex::new(file)),
            Err(e) => {
                open_error = Some(e);
                None
            }
        }
    } else {
        None
    };

    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_level(true)
        .with_span_events(span_events(telemetry));

    // Each combination has its own writer type, hence the separate arms.
    match (file, json) {
        (Some(file), true) => builder.json().with_writer(std::io::stdout.and(file)).init(),
        (Some(file), false) => builder.with_writer(std::io::stdout.and(file)).init(),
        (None, true) => builder.json().init(),
        (None, false) => builder.init(),
    }

    if let Some(e) = open_error {
        tracing::error!(
            error = %e,
            path = %cfg.file_path,
            "Failed to open log file, using stdout instead"
        );
    }

    if telemetry.enabled {
        if telemetry.exporter_type != DEFAULT_EXPORTER {
            tracing::warn!(
                exporter_type = %telemetry.exporter_type,
                endpoint = %telemetry.endpoint,
                "Unsupported span exporter, writing spans to the log output"
            );
        }
        tracing::info!(
            service = env!("CARGO_PKG_NAME"),
            version = env!("CARGO_PKG_VERSION"),
            "Span export enabled"
        );
    }
}
