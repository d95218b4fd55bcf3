//! Payload encoding seam.
//!
//! The default codec is plain JSON. It provides no integrity or
//! confidentiality; signing or encryption belongs in a custom codec.

use crate::cache::SessionMap;
use crate::error::Result;

/// Converts session state to and from its persisted text form.
pub trait SessionCodec: Send + Sync {
    /// Encode the session map.
    fn encode(&self, data: &SessionMap) -> Result<String>;

    /// Decode a persisted payload.
    fn decode(&self, payload: &str) -> Result<SessionMap>;
}

/// JSON codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl SessionCodec for JsonCodec {
    fn encode(&self, data: &SessionMap) -> Result<String> {
        Ok(serde_json::to_string(data)?)
    }

    fn decode(&self, payload: &str) -> Result<SessionMap> {
        Ok(serde_json::from_str(payload)?)
    }
}
