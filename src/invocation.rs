//! Instrumented agent invocations.
//!
//! [`AgentRun`] applies the standard call pattern around one model call:
//!
//! 1. open a span named after the driver, tagged with its attributes
//! 2. annotate `{prefix}_start` with the prompt
//! 3. time the call
//! 4. on failure annotate `{prefix}_error` with `error.type` / `error.message`
//!    and mark the span status as error
//! 5. record exactly one [`RunRecord`]
//! 6. annotate `{prefix}_complete` with the latency
//! 7. return the output, or the original error value untouched

use opentelemetry::trace::{get_active_span, Status};
use std::fmt;
use std::future::Future;

use crate::attributes::Attributes;
use crate::client::Observability;
use crate::run::RunRecord;
use crate::timer::{timed, timed_async, Timed};

/// Output of a model call plus the tokens it consumed, when known.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion<T> {
    pub output: T,
    pub tokens: Option<u64>,
}

impl<T> Completion<T> {
    pub fn new(output: T) -> Self {
        Self {
            output,
            tokens: None,
        }
    }

    #[must_use]
    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.tokens = Some(tokens);
        self
    }
}

/// `error.type` / `error.message` pair describing a failed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDescriptor {
    pub error_type: String,
    pub message: String,
}

impl ErrorDescriptor {
    /// Describe `err` by its type name (last path segment) and `Display` text.
    pub fn of<E: fmt::Display>(err: &E) -> Self {
        Self {
            error_type: short_type_name::<E>(),
            message: err.to_string(),
        }
    }

    #[must_use]
    pub fn to_attributes(&self) -> Attributes {
        Attributes::new()
            .with("error.type", self.error_type.clone())
            .with("error.message", self.message.clone())
    }
}

fn short_type_name<E>() -> String {
    let full = std::any::type_name::<E>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// One instrumented invocation of an agent.
#[derive(Debug, Clone)]
pub struct AgentRun<'a> {
    obs: &'a Observability,
    span_name: String,
    event_prefix: String,
    attributes: Attributes,
}

impl<'a> AgentRun<'a> {
    /// # Arguments
    ///
    /// * `obs` - Client to report through
    /// * `span_name` - Span wrapping the whole invocation, e.g. `crew.run`
    /// * `event_prefix` - Prefix for lifecycle events, e.g. `crew`
    pub fn new(
        obs: &'a Observability,
        span_name: impl Into<String>,
        event_prefix: impl Into<String>,
    ) -> Self {
        Self {
            obs,
            span_name: span_name.into(),
            event_prefix: event_prefix.into(),
            attributes: Attributes::new(),
        }
    }

    /// Tag the span and run record, e.g. with `framework` or `model`.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key, value);
        self
    }

    /// Run a blocking model call.
    pub fn run<T, E, F>(self, prompt: &str, call: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<Completion<T>, E>,
        E: fmt::Display,
    {
        let span_attributes = self.span_attributes(prompt);
        self.obs.in_span(self.span_name.clone(), &span_attributes, |_| {
            self.annotate_start(prompt);
            let outcome = timed(call);
            self.settle(&span_attributes, outcome)
        })
    }

    /// Run an async model call.
    pub async fn run_async<T, E, F, Fut>(self, prompt: &str, call: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Completion<T>, E>>,
        E: fmt::Display,
    {
        let span_attributes = self.span_attributes(prompt);
        self.obs
            .in_span_async(self.span_name.clone(), &span_attributes, |_| async {
                self.annotate_start(prompt);
                let outcome = timed_async(call()).await;
                self.settle(&span_attributes, outcome)
            })
            .await
    }

    fn span_attributes(&self, prompt: &str) -> Attributes {
        let mut attributes = self.attributes.clone();
        attributes.insert("input.prompt", prompt);
        attributes
    }

    fn event(&self, stage: &str) -> String {
        format!("{}_{stage}", self.event_prefix)
    }

    fn annotate_start(&self, prompt: &str) {
        self.obs
            .annotate(&self.event("start"), &Attributes::new().with("prompt", prompt));
    }

    fn settle<T, E: fmt::Display>(
        &self,
        span_attributes: &Attributes,
        outcome: Timed<Result<Completion<T>, E>>,
    ) -> Result<T, E> {
        let (result, elapsed_ms) = outcome.into_parts();
        let mut run_attributes = span_attributes.clone();

        let (result, tokens) = match result {
            Ok(completion) => (Ok(completion.output), completion.tokens),
            Err(err) => {
                let descriptor = ErrorDescriptor::of(&err);
                let error_attributes = descriptor.to_attributes();
                run_attributes.merge(&error_attributes);
                self.obs.annotate(&self.event("error"), &error_attributes);
                get_active_span(|span| span.set_status(Status::error(descriptor.message.clone())));
                (Err(err), None)
            }
        };

        self.obs.record_run(&RunRecord::new(
            elapsed_ms,
            tokens,
            result.is_ok(),
            run_attributes,
        ));
        self.obs.annotate(
            &self.event("complete"),
            &Attributes::new().with("latency_ms", elapsed_ms),
        );

        result
    }
}
