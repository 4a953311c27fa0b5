//! W3C trace-context propagation.
//!
//! # Responsibilities
//! - Extract `traceparent` / `tracestate` / `baggage` from inbound requests
//! - Derive child contexts for outbound calls and replays
//! - Inject them into outbound headers and queued records
//!
//! # Design Decisions
//! - OpenTelemetry propagators do the header codec; spans are exported by `spans.rs`
//! - The propagator is owned here, not registered globally
//! - Header names are matched case-insensitively

use std::sync::LazyLock;

use axum::http::HeaderMap;
use opentelemetry::baggage::BaggageExt;
use opentelemetry::propagation::{
    Extractor, Injector, TextMapCompositePropagator, TextMapPropagator,
};
use opentelemetry::trace::{SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::propagation::{BaggagePropagator, TraceContextPropagator};
use rand::Rng;

static PROPAGATOR: LazyLock<TextMapCompositePropagator> = LazyLock::new(|| {
    TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ])
});

/// Correlation identifiers of one logical operation.
#[derive(Debug, Clone)]
pub struct TraceContext {
    cx: Context,
}

impl TraceContext {
    /// Read the context carried by `carrier`. `None` without a valid `traceparent`.
    pub fn extract(carrier: &dyn Extractor) -> Option<Self> {
        let cx = PROPAGATOR.extract(carrier);
        if cx.span().span_context().is_valid() {
            Some(Self { cx })
        } else {
            None
        }
    }

    /// Start a new sampled trace.
    pub fn new_root() -> Self {
        let span_context = SpanContext::new(
            random_trace_id(),
            random_span_id(),
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        );
        Self {
            cx: Context::new().with_remote_span_context(span_context),
        }
    }

    /// Same trace, flags, state and baggage under a fresh span id.
    pub fn child(&self) -> Self {
        let parent = self.cx.span().span_context().clone();
        let span_context = SpanContext::new(
            parent.trace_id(),
            random_span_id(),
            parent.trace_flags(),
            true,
            parent.trace_state().clone(),
        );
        Self {
            cx: self.cx.with_remote_span_context(span_context),
        }
    }

    pub(crate) fn from_context(cx: Context) -> Self {
        Self { cx }
    }

    pub(crate) fn context(&self) -> &Context {
        &self.cx
    }

    /// Attach a baggage entry, keeping the existing ones.
    pub fn with_baggage(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut entries: Vec<KeyValue> = self
            .cx
            .baggage()
            .iter()
            .map(|(k, (v, _))| KeyValue::new(k.clone(), v.clone()))
            .collect();
        entries.push(KeyValue::new(key.into(), value.into()));
        Self {
            cx: self.cx.with_baggage(entries),
        }
    }

    pub fn inject(&self, carrier: &mut dyn Injector) {
        PROPAGATOR.inject_context(&self.cx, carrier);
    }

    /// Lowercase hex, 32 characters.
    pub fn trace_id(&self) -> String {
        self.cx.span().span_context().trace_id().to_string()
    }

    /// Lowercase hex, 16 characters.
    pub fn span_id(&self) -> String {
        self.cx.span().span_context().span_id().to_string()
    }

    pub fn is_sampled(&self) -> bool {
        self.cx.span().span_context().is_sampled()
    }

    pub fn baggage(&self, key: &str) -> Option<String> {
        self.cx.baggage().get(key).map(|v| v.to_string())
    }
}

fn random_trace_id() -> TraceId {
    let n: u128 = rand::thread_rng().gen_range(1..=u128::MAX);
    TraceId::from_bytes(n.to_be_bytes())
}

fn random_span_id() -> SpanId {
    let n: u64 = rand::thread_rng().gen_range(1..=u64::MAX);
    SpanId::from_bytes(n.to_be_bytes())
}

/// Carrier over an ordered header list (outbound requests, queued records).
///
/// `set` replaces an existing header of the same name instead of appending.
pub struct HeaderCarrier<'a>(pub &'a mut Vec<(String, String)>);

impl Injector for HeaderCarrier<'_> {
    fn set(&mut self, key: &str, value: String) {
        match self.0.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(key)) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key.to_string(), value)),
        }
    }
}

impl Extractor for HeaderCarrier<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        header_value(&*self.0, key)
    }

    fn keys(&self) -> Vec<&str> {
        self.0.iter().map(|(k, _)| k.as_str()).collect()
    }
}

/// Read-only carrier over a borrowed header list.
pub struct HeaderSlice<'a>(pub &'a [(String, String)]);

impl Extractor for HeaderSlice<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        header_value(self.0, key)
    }

    fn keys(&self) -> Vec<&str> {
        self.0.iter().map(|(k, _)| k.as_str()).collect()
    }
}

fn header_value<'a>(headers: &'a [(String, String)], key: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
}

/// Carrier over an inbound `axum` header map.
pub struct HeaderMapCarrier<'a>(pub &'a HeaderMap);

impl Extractor for HeaderMapCarrier<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}
