//! ---
//! rfn_section: "02-payload-pipeline"
//! rfn_subsection: "module"
//! rfn_type: "source"
//! rfn_scope: "code"
//! rfn_description: "Wire data model and payload codecs."
//! rfn_version: "v0.0.0-prealpha"
//! rfn_owner: "tbd"
//! ---
//! Conversion between the base64 wire payload and handler-facing values.
//!
//! Headers are never inspected here. Decoding skips CR/LF line breaks and
//! tolerates non-zero trailing bits; encoding always emits canonical padded
//! standard base64.

use std::any::Any;
use std::borrow::Cow;

use base64::alphabet;
use base64::engine::{GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::errors::{MessageError, Result};

const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// Payload produced by a handler.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadValue {
    /// Raw bytes, forwarded as-is.
    Bytes(Vec<u8>),
    /// Structured value, rendered as JSON text before forwarding.
    Structured(JsonValue),
}

impl PayloadValue {
    /// Capture any serializable value as a structured payload.
    pub fn structured<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(PayloadValue::Structured)
            .map_err(MessageError::Encode)
    }

    /// Convert a handler's returned payload. `Vec<u8>` passes through as raw
    /// bytes; any other value is captured as structured JSON.
    pub fn from_output<T: Serialize + 'static>(value: T) -> Result<Self> {
        let any: &dyn Any = &value;
        match any.downcast_ref::<Vec<u8>>() {
            Some(bytes) => Ok(PayloadValue::Bytes(bytes.clone())),
            None => Self::structured(&value),
        }
    }

    /// Render the payload as the bytes that go on the wire.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            PayloadValue::Bytes(bytes) => Ok(bytes),
            PayloadValue::Structured(value) => {
                serde_json::to_vec(&value).map_err(MessageError::Encode)
            }
        }
    }
}

impl From<Vec<u8>> for PayloadValue {
    fn from(bytes: Vec<u8>) -> Self {
        PayloadValue::Bytes(bytes)
    }
}

/// Decode a base64 wire payload into raw bytes.
pub fn decode_payload(wire: &str) -> Result<Vec<u8>> {
    let wire = if wire.contains(['\r', '\n']) {
        Cow::Owned(wire.replace(['\r', '\n'], ""))
    } else {
        Cow::Borrowed(wire)
    };
    Ok(BASE64.decode(wire.as_bytes())?)
}

/// Encode a handler payload into its base64 wire form.
pub fn encode_payload(value: PayloadValue) -> Result<String> {
    let bytes = value.into_bytes()?;
    Ok(BASE64.encode(bytes))
}
