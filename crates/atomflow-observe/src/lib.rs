//! Observability setup for Atomflow: structured logging and optional
//! OpenTelemetry span export, driven by `TracingConfig`.

pub mod tracing_setup;

pub use tracing_setup::{init_tracing, shutdown_tracing};
