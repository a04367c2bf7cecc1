use crate::value::AttributeValue;

pub const SERVICE_NAME: &str = "service.name";
pub const DEPLOYMENT_ENVIRONMENT: &str = "deployment.environment";

/// Static identity of the emitting process, attached to every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resource {
    attributes: Vec<(String, AttributeValue)>,
    schema_url: Option<String>,
}

impl Resource {
    pub fn new(service_name: impl Into<String>, environment: impl Into<String>) -> Self {
        Resource::default()
            .with(SERVICE_NAME, service_name.into())
            .with(DEPLOYMENT_ENVIRONMENT, environment.into())
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
        self
    }

    pub fn with_schema_url(mut self, url: impl Into<String>) -> Self {
        self.schema_url = Some(url.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn service_name(&self) -> Option<&str> {
        self.get(SERVICE_NAME).and_then(AttributeValue::as_str)
    }

    pub fn attributes(&self) -> &[(String, AttributeValue)] {
        &self.attributes
    }

    pub fn schema_url(&self) -> Option<&str> {
        self.schema_url.as_deref()
    }

    /// `{"attributes": {...}, "schema_url": "..."}` as written into
    /// machine-mode documents.
    pub(crate) fn to_json(&self) -> serde_json::Value {
        let attributes: serde_json::Map<String, serde_json::Value> = self
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::to_value(v).unwrap_or(serde_json::Value::Null)))
            .collect();
        serde_json::json!({
            "attributes": attributes,
            "schema_url": self.schema_url.clone().unwrap_or_default(),
        })
    }
}
