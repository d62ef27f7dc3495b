//! Tracing subscriber initialization with structured logging and optional
//! OpenTelemetry trace export.
//!
//! # Usage
//!
//! ```no_run
//! use atomflow_types::config::TracingConfig;
//!
//! // Human-readable logs at the configured level
//! atomflow_observe::init_tracing(&TracingConfig::default()).unwrap();
//! ```

use std::sync::OnceLock;

use atomflow_types::config::TracingConfig;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Stores the OTel tracer provider so it can be shut down cleanly on exit.
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// Initialize the global tracing subscriber.
///
/// - `RUST_LOG` wins when set; otherwise `config.filter` is used.
/// - `config.json` switches the `fmt` layer to JSON lines.
/// - `config.otel` additionally bridges spans to OpenTelemetry with a stdout
///   exporter.
///
/// # Errors
///
/// Returns an error if the filter directive does not parse or the global
/// subscriber has already been set.
pub fn init_tracing(config: &TracingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let env_filter = env_filter_for(rust_log.as_deref(), &config.filter)?;

    let (json_layer, plain_layer) = if config.json {
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE);
        (Some(layer), None)
    } else {
        let layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE);
        (None, Some(layer))
    };

    let otel_layer = if config.otel {
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build();
        let tracer = provider.tracer("atomflow");

        let _ = TRACER_PROVIDER.set(provider.clone());
        opentelemetry::global::set_tracer_provider(provider);
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(plain_layer)
        .with(otel_layer)
        .try_init()?;

    tracing::debug!(json = config.json, otel = config.otel, "tracing initialized");
    Ok(())
}

/// Build the filter from `RUST_LOG` if present and non-blank, else from
/// `fallback`.
pub fn env_filter_for(rust_log: Option<&str>, fallback: &str) -> Result<EnvFilter, ParseError> {
    match rust_log.map(str::trim) {
        Some(directives) if !directives.is_empty() => EnvFilter::try_new(directives),
        _ => EnvFilter::try_new(fallback),
    }
}

/// Flush pending traces and shut down the OpenTelemetry tracer provider.
///
/// Safe to call even when OTel was not enabled (no-op in that case).
pub fn shutdown_tracing() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            eprintln!("Warning: OTel tracer provider shutdown error: {e}");
        }
    }
}
