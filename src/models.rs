use derive_more::From;
use serde::{Deserialize, Serialize};

/// A single feature as served by the FeatureBoard `all` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureDefinition {
    /// Unique feature key.
    #[serde(rename = "featureKey")]
    pub key: String,
    /// Value served when no audience override matches.
    pub default_value: Value,
    /// Per-audience overrides. Order is significant: the first matching entry wins.
    #[serde(rename = "audienceExceptions", default)]
    pub audience_overrides: Vec<AudienceOverride>,
}

impl FeatureDefinition {
    /// Create a definition without audience overrides.
    pub fn new(key: impl Into<String>, default_value: impl Into<Value>) -> FeatureDefinition {
        FeatureDefinition {
            key: key.into(),
            default_value: default_value.into(),
            audience_overrides: Vec::new(),
        }
    }

    /// Append an audience override, keeping list order.
    pub fn with_override(
        mut self,
        audience_key: impl Into<String>,
        value: impl Into<Value>,
    ) -> FeatureDefinition {
        self.audience_overrides.push(AudienceOverride {
            audience_key: audience_key.into(),
            value: value.into(),
        });
        self
    }
}

/// Value served to members of a specific audience.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudienceOverride {
    pub audience_key: String,
    pub value: Value,
}

/// Raw scalar as it appears on the wire.
///
/// `Value` is untagged, so the type the application expects is only known at evaluation time,
/// when it gets coerced by [`FeatureValue`](crate::FeatureValue).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, From)]
#[serde(untagged)]
pub enum Value {
    Boolean(bool),
    Number(f64),
    String(String),
    Null,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}
