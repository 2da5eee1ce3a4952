//! Telemetry initialization (tracing/tracing-subscriber).
//!
//! Behavior:
//! - LOG_LEVEL controls the filter (e.g. "debug" or detailed directives like
//!   "info,quiz_session=debug,quiz_verify=debug,tower_http=info").
//! - LOG_FORMAT selects "pretty" (default) or "json" structured logs.
//! - LOG_SPANS="close" logs each span as it closes with its busy/idle time, which is how
//!   session worker lifetimes and oracle round-trips show up; "full" adds enter/exit too.
//!
//! Notes:
//! - We include targets in the output to disambiguate sources.
//! - Tower HTTP TraceLayer still adds per-request spans; this complements it.

use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

/// Engine log targets and their default levels.
const ENGINE_TARGETS: &[(&str, &str)] = &[
    ("quiz_engine", "debug"),
    ("quiz_parser", "info"),
    ("quiz_session", "info"),
    ("quiz_verify", "info"),
];

fn default_directives() -> String {
    let mut directives = vec!["info".to_string()];
    directives.extend(ENGINE_TARGETS.iter().map(|(target, level)| format!("{target}={level}")));
    directives.push("tower_http=info".into());
    directives.push("axum=info".into());
    directives.join(",")
}

fn span_events(setting: Option<&str>) -> FmtSpan {
    match setting.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("close") => FmtSpan::CLOSE,
        Some("full") => FmtSpan::FULL,
        _ => FmtSpan::NONE,
    }
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(default_directives()));
    let spans = span_events(std::env::var("LOG_SPANS").ok().as_deref());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(spans)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    // JSON vs pretty are different subscriber types, so each arm initializes its own.
    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => {
            builder.json().init();
        }
        _ => {
            builder.init();
        }
    }
}
