//! Service identity attached to every exported signal.

use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;
use uuid::Uuid;

use crate::config::UNKNOWN_SERVICE;

/// `service.name` and `service.instance.id` for this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceIdentity {
    service_name: String,
    instance_id: String,
}

impl ServiceIdentity {
    /// Create an identity, generating a UUIDv4 instance id when none is given.
    ///
    /// A blank service name is replaced by `unknown_service`.
    pub fn new(service_name: &str, instance_id: Option<String>) -> Self {
        let service_name = service_name.trim();
        let service_name = if service_name.is_empty() {
            tracing::warn!("Empty service name, reporting as {UNKNOWN_SERVICE}");
            UNKNOWN_SERVICE
        } else {
            service_name
        };

        let instance_id = instance_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Self {
            service_name: service_name.to_string(),
            instance_id,
        }
    }

    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    #[must_use]
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// OpenTelemetry resource carrying this identity.
    #[must_use]
    pub fn resource(&self) -> Resource {
        Resource::new(vec![
            KeyValue::new("service.name", self.service_name.clone()),
            KeyValue::new("service.instance.id", self.instance_id.clone()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::Key;

    #[test]
    fn test_explicit_instance_id_is_kept() {
        let identity = ServiceIdentity::new("google-adk-agent", Some("pod-1".into()));
        assert_eq!(identity.service_name(), "google-adk-agent");
        assert_eq!(identity.instance_id(), "pod-1");
    }

    #[test]
    fn test_generated_instance_ids_differ() {
        let a = ServiceIdentity::new("svc", None);
        let b = ServiceIdentity::new("svc", None);
        assert_ne!(a.instance_id(), b.instance_id());
        assert!(Uuid::parse_str(a.instance_id()).is_ok());
    }

    #[test]
    fn test_blank_values_fall_back() {
        let identity = ServiceIdentity::new("  ", Some(String::new()));
        assert_eq!(identity.service_name(), UNKNOWN_SERVICE);
        assert!(Uuid::parse_str(identity.instance_id()).is_ok());
    }

    #[test]
    fn test_resource_attributes() {
        let identity = ServiceIdentity::new("svc", Some("i-1".into()));
        let resource = identity.resource();
        assert_eq!(
            resource.get(Key::new("service.name")).map(|v| v.to_string()),
            Some("svc".to_string())
        );
        assert_eq!(
            resource
                .get(Key::new("service.instance.id"))
                .map(|v| v.to_string()),
            Some("i-1".to_string())
        );
    }
}
