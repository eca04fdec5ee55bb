//! Per-invocation run summary.

use serde::{Deserialize, Serialize};

use crate::attributes::Attributes;

/// Summary of one agent invocation, logged (and metered) once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// End-to-end latency in milliseconds.
    pub latency_ms: f64,
    /// Tokens consumed, when the call site could determine usage.
    pub tokens: Option<u64>,
    pub success: bool,
    #[serde(default)]
    pub attributes: Attributes,
}

impl RunRecord {
    /// Negative, NaN and infinite latencies are recorded as 0.
    pub fn new(latency_ms: f64, tokens: Option<u64>, success: bool, attributes: Attributes) -> Self {
        let latency_ms = if latency_ms.is_finite() && latency_ms > 0.0 {
            latency_ms
        } else {
            0.0
        };
        Self {
            latency_ms,
            tokens,
            success,
            attributes,
        }
    }

    /// Attributes with `success` merged in; used to tag log lines and metrics.
    #[must_use]
    pub fn merged_attributes(&self) -> Attributes {
        let mut attributes = self.attributes.clone();
        attributes.insert("success", self.success);
        attributes
    }
}
