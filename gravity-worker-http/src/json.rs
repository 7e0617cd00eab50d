//! JSON encoding of job payloads, the only encoding the HTTP API speaks.

use gravity_worker::core::error::GravityError;
use gravity_worker::core::payload::Payload;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::value::RawValue;

/// Serialize `value` into a payload the service accepts.
pub fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<Payload, GravityError> {
    serde_json::to_vec(value)
        .map(Payload::from)
        .map_err(GravityError::encode)
}

pub trait PayloadJsonExt {
    /// Deserialize the payload as JSON.
    fn decode_json<T: DeserializeOwned>(&self) -> Result<T, GravityError>;
}

impl PayloadJsonExt for Payload {
    fn decode_json<T: DeserializeOwned>(&self) -> Result<T, GravityError> {
        serde_json::from_slice(self.as_bytes()).map_err(GravityError::decode)
    }
}

/// Borrow a payload as a raw JSON value so it can be embedded in a request as is.
pub(crate) fn raw_json(payload: &Payload) -> Result<&RawValue, GravityError> {
    serde_json::from_slice(payload.as_bytes()).map_err(GravityError::encode)
}
