//! Parameter codec - typed views over a step's schema-less parameters.
//!
//! Handlers declare a `Deserialize` struct for what they accept and decode
//! at their boundary; the engine itself never inspects parameters.

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::handler::HandlerError;
use crate::domain::JsonMap;

pub fn decode_params<T: DeserializeOwned>(params: JsonMap) -> Result<T, HandlerError> {
    serde_json::from_value(serde_json::Value::Object(params))
        .map_err(|e| HandlerError::InvalidParameters(e.to_string()))
}

/// Serialize a handler's typed output back into a result map.
pub fn encode_output<T: Serialize>(output: &T) -> Result<JsonMap, HandlerError> {
    match serde_json::to_value(output) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => {
            let mut map = JsonMap::new();
            map.insert("value".to_string(), other);
            Ok(map)
        }
        Err(e) => Err(HandlerError::Failed(format!("encode output: {e}"))),
    }
}
