//! Scoped spans that always end.
//!
//! A span is started as a child of whatever span is active in the current
//! OpenTelemetry [`Context`] and ended exactly once when its scope closes,
//! whether the scope exits normally, returns early or unwinds. Spans closed
//! by a panic are marked with an error status.

use opentelemetry::trace::{
    FutureExt, SpanContext, SpanId, Status, TraceContextExt, TraceId, Tracer as _,
};
use opentelemetry::{Context, ContextGuard};
use opentelemetry_sdk::trace::Tracer;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::attributes::Attributes;

/// Identity and lifecycle state of a span, usable after its scope is gone.
#[derive(Debug, Clone)]
pub struct SpanHandle {
    span_context: SpanContext,
    ended: Arc<AtomicBool>,
}

impl SpanHandle {
    #[must_use]
    pub fn span_context(&self) -> &SpanContext {
        &self.span_context
    }

    #[must_use]
    pub fn trace_id(&self) -> TraceId {
        self.span_context.trace_id()
    }

    #[must_use]
    pub fn span_id(&self) -> SpanId {
        self.span_context.span_id()
    }

    /// True once the span has been ended and queued for export.
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }
}

/// Ends the span carried by `cx` on first call or on drop.
struct SpanEnd {
    cx: Context,
    ended: Arc<AtomicBool>,
}

impl SpanEnd {
    fn new(cx: Context) -> Self {
        Self {
            cx,
            ended: Arc::new(AtomicBool::new(false)),
        }
    }

    fn handle(&self) -> SpanHandle {
        SpanHandle {
            span_context: self.cx.span().span_context().clone(),
            ended: Arc::clone(&self.ended),
        }
    }

    /// Ends the span once. A span closed while its thread unwinds gets an
    /// error status.
    fn end(&self) {
        if !self.ended.swap(true, Ordering::AcqRel) {
            let span = self.cx.span();
            if std::thread::panicking() {
                span.set_status(Status::error("panicked"));
            }
            span.end();
        }
    }
}

impl Drop for SpanEnd {
    fn drop(&mut self) {
        self.end();
    }
}

/// An active span, current on this thread until dropped.
///
/// Holds a thread-local context guard, so it must not be kept across an
/// `.await`; use [`Observability::in_span_async`](crate::Observability::in_span_async)
/// for async work.
#[must_use = "the span ends as soon as the scope is dropped"]
pub struct SpanScope {
    end: SpanEnd,
    guard: Option<ContextGuard>,
}

impl SpanScope {
    pub(crate) fn enter(cx: Context) -> Self {
        let guard = cx.clone().attach();
        Self {
            end: SpanEnd::new(cx),
            guard: Some(guard),
        }
    }

    #[must_use]
    pub fn handle(&self) -> SpanHandle {
        self.end.handle()
    }

    /// Context carrying this span, for handing to other threads or tasks.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.end.cx
    }

    /// End the span now instead of at drop.
    pub fn end(self) {
        drop(self);
    }
}

impl Drop for SpanScope {
    fn drop(&mut self) {
        self.end.end();
        // Restore the parent context only after the span is closed.
        self.guard.take();
    }
}

/// Start a span as a child of the current context and return the new context.
pub(crate) fn start_span(tracer: &Tracer, name: String, attributes: &Attributes) -> Context {
    let parent = Context::current();
    let span = tracer
        .span_builder(name)
        .with_attributes(attributes.to_key_values())
        .start_with_context(tracer, &parent);
    parent.with_span(span)
}

/// Drive `f`'s future with `cx` attached on every poll, ending the span when
/// the future completes or is dropped.
pub(crate) async fn run_in_span<F, Fut>(cx: Context, f: F) -> Fut::Output
where
    F: FnOnce(SpanHandle) -> Fut,
    Fut: Future,
{
    let end = SpanEnd::new(cx.clone());
    let fut = f(end.handle());
    let output = fut.with_context(cx).await;
    end.end();
    output
}
