//! ---
//! rfn_section: "02-payload-pipeline"
//! rfn_subsection: "module"
//! rfn_type: "source"
//! rfn_scope: "code"
//! rfn_description: "Wire data model and payload codecs."
//! rfn_version: "v0.0.0-prealpha"
//! rfn_owner: "tbd"
//! ---
use thiserror::Error;

/// Shared result type for per-message pipeline steps.
pub type Result<T> = std::result::Result<T, MessageError>;

/// Non-fatal failure of a single message. The batch always continues.
#[derive(Debug, Error)]
pub enum MessageError {
    /// The wire payload was not valid base64.
    #[error("couldn't decode message: {0}")]
    Decode(#[from] base64::DecodeError),
    /// The decoded bytes did not fit the declared schema.
    #[error("couldn't bind payload to schema {schema}: {source}")]
    Bind {
        /// Rust type name of the schema.
        schema: &'static str,
        /// Deserialization failure.
        #[source]
        source: serde_json::Error,
    },
    /// The user handler reported a failure. Rendered verbatim with its context chain.
    #[error("{0:#}")]
    Handler(anyhow::Error),
    /// The handler's output could not be serialized.
    #[error("couldn't encode transformed payload: {0}")]
    Encode(#[source] serde_json::Error),
}

impl MessageError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            MessageError::Decode(_) => "decode",
            MessageError::Bind { .. } => "bind",
            MessageError::Handler(_) => "handler",
            MessageError::Encode(_) => "encode",
        }
    }
}
