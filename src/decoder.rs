use crate::{models::FeatureDefinition, Result};

/// Decodes a response body into an ordered list of feature definitions.
///
/// An empty list is a valid result meaning "zero features", not an error.
pub trait Decoder: Send + Sync {
    fn decode(&self, body: &[u8]) -> Result<Vec<FeatureDefinition>>;
}

impl<D: Decoder + ?Sized> Decoder for std::sync::Arc<D> {
    fn decode(&self, body: &[u8]) -> Result<Vec<FeatureDefinition>> {
        (**self).decode(body)
    }
}

/// Decodes the JSON array served by the `all` endpoint.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonDecoder;

impl Decoder for JsonDecoder {
    fn decode(&self, body: &[u8]) -> Result<Vec<FeatureDefinition>> {
        Ok(serde_json::from_slice(body)?)
    }
}
