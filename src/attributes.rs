//! Attribute maps shared by spans, events, log lines and metrics.

use opentelemetry::logs::AnyValue;
use opentelemetry::{KeyValue, Value as OtelValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Ordered `key -> value` attributes.
///
/// Values are JSON values so call sites can pass strings, numbers and flags
/// without caring about the OpenTelemetry value model. Strings, booleans,
/// integers and floats map onto native OTel values; anything else is exported
/// as its JSON text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, Value>);

impl Attributes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or overwrite a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Copy every entry of `other` into `self`; `other` wins on conflicts.
    pub fn merge(&mut self, other: &Attributes) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Convert into OpenTelemetry key-values for spans, events and metrics.
    #[must_use]
    pub fn to_key_values(&self) -> Vec<KeyValue> {
        self.0
            .iter()
            .map(|(key, value)| KeyValue::new(key.clone(), otel_value(value)))
            .collect()
    }

    /// Convert into log record attributes.
    pub(crate) fn to_log_attributes(&self) -> Vec<(String, AnyValue)> {
        self.0
            .iter()
            .map(|(key, value)| (key.clone(), any_value(value)))
            .collect()
    }
}

impl<K, V> FromIterator<(K, V)> for Attributes
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Attributes
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

/// Renders `key=value` pairs separated by spaces; strings are not quoted.
impl fmt::Display for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match value {
                Value::String(s) => write!(f, "{key}={s}")?,
                other => write!(f, "{key}={other}")?,
            }
        }
        Ok(())
    }
}

fn otel_value(value: &Value) -> OtelValue {
    match value {
        Value::String(s) => OtelValue::from(s.clone()),
        Value::Bool(b) => OtelValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => OtelValue::I64(i),
            None => OtelValue::F64(n.as_f64().unwrap_or_default()),
        },
        other => OtelValue::from(other.to_string()),
    }
}

fn any_value(value: &Value) -> AnyValue {
    match value {
        Value::String(s) => AnyValue::from(s.clone()),
        Value::Bool(b) => AnyValue::Boolean(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => AnyValue::Int(i),
            None => AnyValue::Double(n.as_f64().unwrap_or_default()),
        },
        other => AnyValue::from(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_overwrites() {
        let mut attrs = Attributes::from([("framework", "CrewAI"), ("model", "gpt-4o-mini")]);
        attrs.merge(&Attributes::new().with("model", "gemini-2.0-flash").with("success", true));

        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs.get("model"), Some(&json!("gemini-2.0-flash")));
        assert_eq!(attrs.get("success"), Some(&json!(true)));
    }

    #[test]
    fn test_display_is_sorted_key_value() {
        let attrs = Attributes::new()
            .with("framework", "X")
            .with("attempt", 2)
            .with("success", false);
        assert_eq!(attrs.to_string(), "attempt=2 framework=X success=false");
    }

    #[test]
    fn test_to_key_values_maps_native_types() {
        let attrs = Attributes::new()
            .with("s", "text")
            .with("b", true)
            .with("i", 42)
            .with("f", 1.5)
            .with("list", json!([1, 2]));

        let kvs = attrs.to_key_values();
        let find = |name: &str| {
            kvs.iter()
                .find(|kv| kv.key.as_str() == name)
                .map(|kv| kv.value.clone())
                .unwrap()
        };

        assert_eq!(find("s"), OtelValue::from("text"));
        assert_eq!(find("b"), OtelValue::Bool(true));
        assert_eq!(find("i"), OtelValue::I64(42));
        assert_eq!(find("f"), OtelValue::F64(1.5));
        assert_eq!(find("list"), OtelValue::from("[1,2]"));
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let attrs = Attributes::new().with("framework", "X");
        assert_eq!(
            serde_json::to_value(&attrs).unwrap(),
            json!({ "framework": "X" })
        );
    }
}
