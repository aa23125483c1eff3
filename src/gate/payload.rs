//! Payload decoding: UTF-8, then JSON, then "must be an object".

use serde_json::{Map, Value};

use crate::gate::denial::Denial;

/// A decoded event: always a JSON object.
pub type DecodedEvent = Map<String, Value>;

pub fn decode(body: &[u8]) -> Result<DecodedEvent, Denial> {
    // Stateless validation, nothing is shared between requests.
    let text = std::str::from_utf8(body).map_err(|_| Denial::InvalidUtf8)?;
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(event)) => Ok(event),
        Ok(_) => Err(Denial::NotAnObject),
        Err(e) => Err(Denial::InvalidJson(e.to_string())),
    }
}
