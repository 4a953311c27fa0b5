//! Exported OpenTelemetry spans for outbound calls and replays.
//!
//! # Responsibilities
//! - Own the tracer provider selected by `[observability] span_export`
//! - Start client spans nested under an inbound or stored trace context
//! - Flush and shut the provider down when the process stops
//!
//! # Design Decisions
//! - The handle is passed explicitly (app state, drain worker); no global provider
//! - With export off, child contexts still get fresh span ids

use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer, TracerProvider};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};
use opentelemetry_sdk::Resource;

use crate::config::{ObservabilityConfig, SpanExport};
use crate::observability::propagation::TraceContext;

const SCOPE: &str = "calc-mesh";

#[derive(Debug, Clone)]
struct Inner {
    provider: SdkTracerProvider,
    tracer: SdkTracer,
}

/// Starts spans for outbound work. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct SpanTracer {
    inner: Option<Inner>,
}

impl SpanTracer {
    /// No provider: spans are never recorded or exported.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn new(provider: SdkTracerProvider) -> Self {
        let tracer = provider.tracer(SCOPE);
        Self {
            inner: Some(Inner { provider, tracer }),
        }
    }

    /// Build the exporter configured for this process.
    pub fn from_config(config: &ObservabilityConfig, service_name: &str) -> Self {
        match config.span_export {
            SpanExport::Off => Self::disabled(),
            SpanExport::Stdout => {
                let provider = SdkTracerProvider::builder()
                    .with_resource(Resource::builder().with_service_name(service_name.to_string()).build())
                    .with_batch_exporter(opentelemetry_stdout::SpanExporter::default())
                    .build();
                tracing::info!(service_name, exporter = "stdout", "Span export enabled");
                Self::new(provider)
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Start a client span under `parent`, or a new trace when there is none.
    /// The returned context identifies the new span and is what gets injected.
    pub fn start(&self, name: &'static str, parent: Option<&TraceContext>) -> TraceContext {
        let Some(inner) = &self.inner else {
            return parent.map_or_else(TraceContext::new_root, TraceContext::child);
        };

        let parent_cx = parent.map_or_else(Context::new, |p| p.context().clone());
        let span = inner
            .tracer
            .span_builder(name)
            .with_kind(SpanKind::Client)
            .start_with_context(&inner.tracer, &parent_cx);
        TraceContext::from_context(parent_cx.with_span(span))
    }

    /// Flush pending spans and stop the exporter.
    pub fn shutdown(&self) {
        if let Some(inner) = &self.inner {
            if let Err(e) = inner.provider.shutdown() {
                tracing::warn!(error = %e, "Span exporter shutdown failed");
            }
        }
    }
}

impl TraceContext {
    pub fn set_attribute(&self, key: &'static str, value: impl Into<opentelemetry::Value>) {
        self.context().span().set_attribute(KeyValue::new(key, value));
    }

    /// Mark the span as failed.
    pub fn record_error(&self, description: impl Into<String>) {
        self.context().span().set_status(Status::error(description.into()));
    }

    /// End the span. No effect on contexts that only carry ids.
    pub fn end(&self) {
        self.context().span().end();
    }
}
