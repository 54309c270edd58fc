//! ---
//! rfn_section: "03-function-pipeline"
//! rfn_subsection: "module"
//! rfn_type: "source"
//! rfn_scope: "code"
//! rfn_description: "Handler contract, option resolution, and batch dispatch."
//! rfn_version: "v0.0.0-prealpha"
//! rfn_owner: "tbd"
//! ---
//! The single extension point of a function.
//!
//! A handler receives the payload, the message headers, and the batch inputs
//! and decides the message's fate:
//!
//! * `Err(..)` fails the message. The original message is echoed back in the
//!   failure list with the error text.
//! * [`HandlerOutput::filtered`] drops the message silently.
//! * [`HandlerOutput::transformed`] forwards the new payload and headers.
//!
//! An output carrying only one of payload or headers is treated as an
//! incomplete transformation and dropped like a filtered message.

use r_fn_msg::{Headers, Inputs};

/// What a handler produced for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerOutput<P> {
    /// Replacement payload.
    pub payload: Option<P>,
    /// Replacement headers.
    pub headers: Option<Headers>,
}

impl<P> HandlerOutput<P> {
    /// Forward the message with a new payload and headers.
    pub fn transformed(payload: P, headers: Headers) -> Self {
        Self {
            payload: Some(payload),
            headers: Some(headers),
        }
    }

    /// Drop the message without reporting an error.
    pub fn filtered() -> Self {
        Self {
            payload: None,
            headers: None,
        }
    }

    /// Both parts present, ready to forward.
    pub fn into_complete(self) -> Option<(P, Headers)> {
        match (self.payload, self.headers) {
            (Some(payload), Some(headers)) => Some((payload, headers)),
            _ => None,
        }
    }

    /// Convert the payload, keeping the headers as they are.
    pub fn try_map_payload<Q, E>(
        self,
        f: impl FnOnce(P) -> Result<Q, E>,
    ) -> Result<HandlerOutput<Q>, E> {
        Ok(HandlerOutput {
            payload: self.payload.map(f).transpose()?,
            headers: self.headers,
        })
    }
}

/// Handler operating on raw payload bytes.
pub trait EventHandler: Send + Sync {
    /// Transform one message.
    fn handle(
        &self,
        payload: Vec<u8>,
        headers: &Headers,
        inputs: &Inputs,
    ) -> anyhow::Result<HandlerOutput<Vec<u8>>>;
}

impl<F> EventHandler for F
where
    F: Fn(Vec<u8>, &Headers, &Inputs) -> anyhow::Result<HandlerOutput<Vec<u8>>> + Send + Sync,
{
    fn handle(
        &self,
        payload: Vec<u8>,
        headers: &Headers,
        inputs: &Inputs,
    ) -> anyhow::Result<HandlerOutput<Vec<u8>>> {
        self(payload, headers, inputs)
    }
}

/// Handler operating on a payload bound into the schema type `T`.
///
/// A returned `Vec<u8>` payload is forwarded as raw bytes. Any other `O` is
/// serialized as JSON before forwarding.
pub trait SchemaHandler<T, O>: Send + Sync {
    /// Transform one bound record.
    fn handle(&self, record: T, headers: &Headers, inputs: &Inputs)
        -> anyhow::Result<HandlerOutput<O>>;
}

impl<T, O, F> SchemaHandler<T, O> for F
where
    F: Fn(T, &Headers, &Inputs) -> anyhow::Result<HandlerOutput<O>> + Send + Sync,
{
    fn handle(
        &self,
        record: T,
        headers: &Headers,
        inputs: &Inputs,
    ) -> anyhow::Result<HandlerOutput<O>> {
        self(record, headers, inputs)
    }
}
